//! Data models for portal entities.
//!
//! - `Event`: club events and their approval workflow status
//! - `Registration`, `FileMeta`: applications submitted through event forms
//! - `RegistrationFormSchema`: the per-event form definition
//! - `User`, `Department`: executive team members and their departments

pub mod event;
pub mod registration;
pub mod user;

pub use event::{
    CreateEventRequest, Event, EventListResponse, EventStatus, GetEventsParams, UpdateEventRequest,
};
pub use registration::{
    extract_email, extract_name, field_label, FileMeta, FormField, GetRegistrationsParams,
    Registration, RegistrationDetailResponse, RegistrationFormSchema, RegistrationListResponse,
    RegistrationPagination, RegistrationStatus, RegistrationStatusUpdate,
    RegistrationStatusUpdateResponse, RegistrationWithFiles, ReviewDecision, StatusCounts,
};
pub use user::{
    DeleteUserResponse, Department, DepartmentListResponse, EmailNotificationPreference,
    GetDepartmentsParams, GetUsersParams, InviteUserRequest, InviteUserResponse,
    NotificationPreferences, UpdateUserRequest, User, UserListResponse, UserRole, YearsResponse,
};

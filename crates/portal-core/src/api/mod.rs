//! REST client for the portal backend.
//!
//! `ApiClient` attaches the current session's bearer token to every call
//! and converts non-2xx answers into `ApiError`. Resource endpoints are
//! grouped by area:
//!
//! - `auth`: sign-in, password recovery, onboarding, invites
//! - `events`: event CRUD
//! - `registrations`: review table, status decisions, CSV export
//! - `users`: team members and departments

mod auth;
pub mod client;
pub mod error;
mod events;
mod registrations;
mod users;

pub use auth::{validate_new_password, MIN_PASSWORD_LENGTH};
pub use client::{Acknowledgement, ApiClient, RequestOptions, UnauthorizedPolicy};
pub use error::{ApiError, UNEXPECTED_ERROR_MESSAGE};

//! Cached portal operations.
//!
//! `Portal` pairs the API client with the request cache: reads go through
//! `QueryCache::fetch_query` under the keys in [`keys`], and each mutation
//! invalidates, updates or removes the entries it affects. While a `Portal`
//! is alive it holds an `AuthSync` activation, so session changes keep the
//! cache consistent.

pub mod keys;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use futures::future::try_join_all;
use tracing::{debug, error, info};

use crate::api::{ApiClient, ApiError, UnauthorizedPolicy};
use crate::auth::SessionData;
use crate::cache::{QueryCache, QueryOptions, RetryPolicy};
use crate::models::{
    CreateEventRequest, DepartmentListResponse, Event, GetDepartmentsParams, GetEventsParams,
    GetRegistrationsParams, GetUsersParams, InviteUserRequest, InviteUserResponse,
    RegistrationDetailResponse, RegistrationListResponse, RegistrationStatus,
    RegistrationStatusUpdateResponse, RegistrationWithFiles, ReviewDecision, StatusCounts,
    UpdateEventRequest, UpdateUserRequest, User, UserListResponse, YearsResponse,
};
use crate::sync::{AuthSync, AuthSyncGuard};

/// The signed-in user's profile stays fresh for a minute
const CURRENT_USER_STALE_SECS: i64 = 60;

const ONBOARDING_SIGN_IN_FAILED: &str =
    "Account created but failed to sign in. Please try signing in manually.";

/// File name used for a CSV export
pub fn export_file_name(event_id: &str, status: Option<RegistrationStatus>) -> String {
    match status {
        Some(status) => format!("registrations-{}-{}.csv", event_id, status.as_str()),
        None => format!("registrations-{}.csv", event_id),
    }
}

pub struct Portal {
    api: ApiClient,
    cache: Arc<QueryCache>,
    _sync: AuthSyncGuard,
}

impl Portal {
    /// Build a portal over a shared cache, registering as an auth sync consumer
    pub fn new(api: ApiClient, cache: Arc<QueryCache>, sync: &AuthSync) -> Self {
        Self {
            api,
            cache,
            _sync: sync.activate(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn session(&self) -> Option<SessionData> {
        self.api.session().session()
    }

    /// Cache options for list and detail reads.
    ///
    /// A client that already refreshed and replayed a 401 has nothing left
    /// to try, so the cache must not run that cycle again.
    fn read_options(&self) -> QueryOptions {
        let mut options = self.cache.default_options();
        if self.api.unauthorized_policy() == UnauthorizedPolicy::RefreshAndRetry {
            options.retry = options.retry.except_auth();
        }
        options
    }

    fn current_user_options(&self) -> QueryOptions {
        QueryOptions {
            stale_time: Duration::seconds(CURRENT_USER_STALE_SECS),
            retry: RetryPolicy::TransientExceptAuth { max_retries: 1 },
        }
    }

    // ===== Session =====

    /// Sign in with email and password, install the session and return the profile
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let grant = self.api.sign_in(email, password).await?;
        self.api.session().set_session(grant).await?;
        self.current_user().await
    }

    /// End the session and drop every cached response
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.api.session().sign_out().await?;
        self.cache.clear();
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(&keys::auth_user(), self.current_user_options(), move || {
                api.current_user()
            })
            .await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), ApiError> {
        self.api
            .change_password(current_password, new_password, confirmation)
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Finish an invite, then replace the invite session with a regular one
    pub async fn complete_onboarding(
        &self,
        password: &str,
        confirmation: &str,
        preferred_name: Option<&str>,
    ) -> Result<User, ApiError> {
        let email = match self.session().and_then(|s| s.email().map(str::to_string)) {
            Some(email) => email,
            None => self.current_user().await?.email,
        };

        self.api
            .complete_onboarding(password, confirmation, preferred_name)
            .await?;
        self.sign_out().await?;

        self.sign_in(&email, password).await.map_err(|e| {
            error!(error = %e, "Sign-in after onboarding failed");
            ApiError::Session(ONBOARDING_SIGN_IN_FAILED.to_string())
        })
    }

    // ===== Events =====

    pub async fn events(&self, params: &GetEventsParams) -> Result<Vec<Event>, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(&keys::events_list(params), self.read_options(), move || {
                api.fetch_events(params)
            })
            .await
    }

    pub async fn event(&self, event_id: &str) -> Result<Event, ApiError> {
        if event_id.is_empty() {
            return Err(ApiError::Validation("Event ID is required".to_string()));
        }
        let api = &self.api;
        self.cache
            .fetch_query(&keys::event_detail(event_id), self.read_options(), move || {
                api.fetch_event(event_id)
            })
            .await
    }

    pub async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ApiError> {
        let event = self.api.create_event(request).await?;
        info!(event_id = %event.id, "Event created");
        self.cache.invalidate_queries(&keys::events_all());
        Ok(event)
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        update: &UpdateEventRequest,
    ) -> Result<Event, ApiError> {
        let event = self.api.update_event(event_id, update).await?;
        self.cache.invalidate_queries(&keys::events_all());
        self.cache.set_query_data(&keys::event_detail(&event.id), &event);
        Ok(event)
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        self.api.delete_event(event_id).await?;
        info!(event_id, "Event deleted");
        self.cache.invalidate_queries(&keys::events_all());
        self.cache.remove_queries(&keys::event_detail(event_id));
        Ok(())
    }

    // ===== Registrations =====

    pub async fn registrations(
        &self,
        params: &GetRegistrationsParams,
    ) -> Result<RegistrationListResponse, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(
                &keys::registrations_list(params),
                self.read_options(),
                move || api.fetch_registrations(params),
            )
            .await
    }

    pub async fn registration(
        &self,
        registration_id: &str,
    ) -> Result<RegistrationDetailResponse, ApiError> {
        if registration_id.is_empty() {
            return Err(ApiError::Validation("Registration ID is required".to_string()));
        }
        let api = &self.api;
        self.cache
            .fetch_query(
                &keys::registration_detail(registration_id),
                self.read_options(),
                move || api.fetch_registration(registration_id),
            )
            .await
    }

    /// Per-status totals, read from the pagination of four single-row queries
    pub async fn registration_counts(&self, event_id: &str) -> Result<StatusCounts, ApiError> {
        let params: Vec<GetRegistrationsParams> = RegistrationStatus::ALL
            .iter()
            .map(|status| GetRegistrationsParams {
                status: Some(*status),
                limit: Some(1),
                ..GetRegistrationsParams::for_event(event_id)
            })
            .collect();

        let pages = try_join_all(params.iter().map(|p| self.registrations(p))).await?;

        let mut counts = StatusCounts::default();
        for (status, page) in RegistrationStatus::ALL.iter().zip(pages) {
            counts.set(*status, page.pagination.total);
        }
        Ok(counts)
    }

    /// Accept or reject an applicant
    pub async fn review_registration(
        &self,
        registration_id: &str,
        decision: ReviewDecision,
    ) -> Result<RegistrationStatusUpdateResponse, ApiError> {
        let response = self
            .api
            .update_registration_status(registration_id, decision)
            .await?;
        let event_id = response.registration.event_id.clone();
        info!(registration_id, %event_id, status = %response.registration.status, "Registration reviewed");

        self.cache
            .invalidate_matching(&keys::registrations_lists(), |key| {
                keys::list_event_id(key) == Some(event_id.as_str())
            });

        // The status endpoint omits files; keep the ones already cached
        let detail_key = keys::registration_detail(registration_id);
        let files = self
            .cache
            .get_query_data::<RegistrationDetailResponse>(&detail_key)
            .map(|cached| cached.data.registration.files)
            .unwrap_or_default();
        self.cache.set_query_data(
            &detail_key,
            &RegistrationDetailResponse {
                registration: RegistrationWithFiles {
                    registration: response.registration.clone(),
                    files,
                },
            },
        );

        Ok(response)
    }

    /// Download the CSV export into `dir`, returning the written path
    pub async fn export_registrations(
        &self,
        event_id: &str,
        status: Option<RegistrationStatus>,
        dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let csv = self.api.export_registrations(event_id, status).await?;
        let path = dir.join(export_file_name(event_id, status));
        if let Err(e) = tokio::fs::write(&path, csv.as_bytes()).await {
            error!(path = %path.display(), error = %e, "Failed to write export");
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = csv.len(), "Export written");
        Ok(path)
    }

    // ===== Users and departments =====

    pub async fn users(&self, params: &GetUsersParams) -> Result<UserListResponse, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(&keys::users_list(params), self.read_options(), move || {
                api.fetch_users(params)
            })
            .await
    }

    pub async fn user(&self, user_id: &str) -> Result<User, ApiError> {
        if user_id.is_empty() {
            return Err(ApiError::Validation("User ID is required".to_string()));
        }
        let api = &self.api;
        self.cache
            .fetch_query(&keys::user_detail(user_id), self.read_options(), move || {
                api.fetch_user(user_id)
            })
            .await
    }

    pub async fn invite_user(&self, invite: &InviteUserRequest) -> Result<InviteUserResponse, ApiError> {
        let response = self.api.invite_user(invite).await?;
        info!(email = %response.email, "Invite sent");
        self.cache.invalidate_queries(&keys::users_all());
        Ok(response)
    }

    pub async fn update_user(&self, user_id: &str, update: &UpdateUserRequest) -> Result<User, ApiError> {
        let user = self.api.update_user(user_id, update).await?;
        self.cache.invalidate_queries(&keys::users_all());
        self.cache.set_query_data(&keys::user_detail(&user.id), &user);

        let is_self = self
            .session()
            .and_then(|s| s.user)
            .is_some_and(|u| u.id == user.user_id);
        if is_self {
            self.api.session().notify_user_updated();
        }
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        self.api.delete_user(user_id).await?;
        info!(user_id, "Member removed");
        self.cache.invalidate_queries(&keys::users_all());
        self.cache.remove_queries(&keys::user_detail(user_id));
        Ok(())
    }

    pub async fn departments(
        &self,
        params: &GetDepartmentsParams,
    ) -> Result<DepartmentListResponse, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(
                &keys::departments_list(params),
                self.read_options(),
                move || api.fetch_departments(params),
            )
            .await
    }

    pub async fn department_years(&self) -> Result<YearsResponse, ApiError> {
        let api = &self.api;
        self.cache
            .fetch_query(&keys::department_years(), self.read_options(), move || {
                api.fetch_department_years()
            })
            .await
    }
}

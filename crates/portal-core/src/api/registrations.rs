use reqwest::header::{HeaderValue, ACCEPT};
use urlencoding::encode;

use super::client::{ApiClient, RequestOptions};
use super::ApiError;
use crate::models::{
    GetRegistrationsParams, RegistrationDetailResponse, RegistrationListResponse,
    RegistrationStatus, RegistrationStatusUpdate, RegistrationStatusUpdateResponse, ReviewDecision,
};

impl ApiClient {
    pub async fn fetch_registrations(
        &self,
        params: &GetRegistrationsParams,
    ) -> Result<RegistrationListResponse, ApiError> {
        let options = RequestOptions::get()
            .query_opt("status", params.status.map(|s| s.as_str()))
            .query_opt("page", params.page)
            .query_opt("limit", params.limit)
            .query_opt(
                "search",
                params.search.as_deref().filter(|s| !s.trim().is_empty()),
            );
        self.get_with(&format!("/events/{}/registrations", encode(&params.event_id)), options)
            .await
    }

    pub async fn fetch_registration(
        &self,
        registration_id: &str,
    ) -> Result<RegistrationDetailResponse, ApiError> {
        self.get(&format!("/registrations/{}", encode(registration_id))).await
    }

    pub async fn update_registration_status(
        &self,
        registration_id: &str,
        decision: ReviewDecision,
    ) -> Result<RegistrationStatusUpdateResponse, ApiError> {
        self.patch(
            &format!("/registrations/{}/status", encode(registration_id)),
            &RegistrationStatusUpdate { status: decision },
        )
        .await
    }

    /// CSV export of an event's registrations, optionally for one status
    pub async fn export_registrations(
        &self,
        event_id: &str,
        status: Option<RegistrationStatus>,
    ) -> Result<String, ApiError> {
        let options = RequestOptions::get()
            .query_opt("status", status.map(|s| s.as_str()))
            .header(ACCEPT, HeaderValue::from_static("text/csv"));
        self.fetch_text(&format!("/events/{}/registrations/export", encode(event_id)), options)
            .await
    }
}

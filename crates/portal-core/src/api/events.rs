use urlencoding::encode;

use super::client::{Acknowledgement, ApiClient, RequestOptions};
use super::ApiError;
use crate::models::{CreateEventRequest, Event, EventListResponse, GetEventsParams, UpdateEventRequest};

impl ApiClient {
    pub async fn fetch_events(&self, params: &GetEventsParams) -> Result<Vec<Event>, ApiError> {
        let options = RequestOptions::get().query_opt("status", params.status.map(|s| s.as_str()));
        let response: EventListResponse = self.get_with("/events", options).await?;
        Ok(response.events)
    }

    pub async fn fetch_event(&self, event_id: &str) -> Result<Event, ApiError> {
        self.get(&format!("/events/{}", encode(event_id))).await
    }

    pub async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ApiError> {
        if request.title.trim().is_empty() {
            return Err(ApiError::Validation("Event title is required".to_string()));
        }
        self.post("/events", request).await
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        update: &UpdateEventRequest,
    ) -> Result<Event, ApiError> {
        if update.is_empty() {
            return Err(ApiError::Validation("Nothing to update".to_string()));
        }
        self.patch(&format!("/events/{}", encode(event_id)), update).await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        self.delete::<Acknowledgement>(&format!("/events/{}", encode(event_id)))
            .await?;
        Ok(())
    }
}

//! Cache key factories, one hierarchy per resource.
//!
//! Lists live under `[resource, "list", params]` and single records under
//! `[resource, "detail", id]`, so invalidating `[resource]` reaches both.

use serde_json::Value;

use crate::cache::QueryKey;
use crate::models::{GetDepartmentsParams, GetEventsParams, GetRegistrationsParams, GetUsersParams};

pub fn auth_user() -> QueryKey {
    QueryKey::root("auth").child("user")
}

pub fn events_all() -> QueryKey {
    QueryKey::root("events")
}

pub fn events_lists() -> QueryKey {
    events_all().child("list")
}

pub fn events_list(params: &GetEventsParams) -> QueryKey {
    events_lists().child(params)
}

pub fn event_detail(event_id: &str) -> QueryKey {
    events_all().child("detail").child(event_id)
}

pub fn registrations_all() -> QueryKey {
    QueryKey::root("registrations")
}

pub fn registrations_lists() -> QueryKey {
    registrations_all().child("list")
}

pub fn registrations_list(params: &GetRegistrationsParams) -> QueryKey {
    registrations_lists().child(params)
}

pub fn registration_detail(registration_id: &str) -> QueryKey {
    registrations_all().child("detail").child(registration_id)
}

/// Event a registration list key was built for
pub fn list_event_id(key: &QueryKey) -> Option<&str> {
    key.parts()
        .get(2)
        .and_then(|params| params.get("eventId"))
        .and_then(Value::as_str)
}

pub fn users_all() -> QueryKey {
    QueryKey::root("users")
}

pub fn users_list(params: &GetUsersParams) -> QueryKey {
    users_all().child("list").child(params)
}

pub fn user_detail(user_id: &str) -> QueryKey {
    users_all().child("detail").child(user_id)
}

pub fn departments_all() -> QueryKey {
    QueryKey::root("departments")
}

pub fn departments_list(params: &GetDepartmentsParams) -> QueryKey {
    departments_all().child("list").child(params)
}

pub fn department_years() -> QueryKey {
    departments_all().child("years")
}

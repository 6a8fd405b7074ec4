use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::format::{format_field_name, format_file_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Submitted,
    Accepted,
    Rejected,
    Confirmed,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 4] = [
        RegistrationStatus::Submitted,
        RegistrationStatus::Accepted,
        RegistrationStatus::Rejected,
        RegistrationStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Submitted => "submitted",
            RegistrationStatus::Accepted => "accepted",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Submitted => write!(f, "Submitted"),
            RegistrationStatus::Accepted => write!(f, "Accepted"),
            RegistrationStatus::Rejected => write!(f, "Rejected"),
            RegistrationStatus::Confirmed => write!(f, "Confirmed"),
        }
    }
}

impl std::str::FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown registration status: {}", s))
    }
}

/// Uploaded file attached to a registration (resumes, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub registration_id: Option<String>,
    pub event_id: String,
    pub field_name: String,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub upload_session_id: String,
    pub uploaded_at: String,
    pub scheduled_deletion_date: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub deleted_at: Option<String>,
}

impl FileMeta {
    pub fn size_display(&self) -> String {
        format_file_size(self.file_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub form_data: Map<String, Value>,
    pub status: RegistrationStatus,
    pub submitted_at: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub rsvp_token: Option<String>,
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub checked_in: bool,
    pub checked_in_at: Option<String>,
    pub checked_in_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Registration {
    pub fn applicant_name(&self) -> String {
        extract_name(&self.form_data)
    }

    pub fn applicant_email(&self) -> String {
        extract_email(&self.form_data)
    }

    /// Whether the applicant can still be accepted or rejected
    pub fn is_reviewable(&self) -> bool {
        self.status == RegistrationStatus::Submitted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWithFiles {
    #[serde(flatten)]
    pub registration: Registration,
    #[serde(default)]
    pub files: Vec<FileMeta>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl RegistrationPagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationListResponse {
    pub registrations: Vec<Registration>,
    pub pagination: RegistrationPagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDetailResponse {
    pub registration: RegistrationWithFiles,
}

/// Review outcome an executive may set; confirmation is the applicant's step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Accepted,
    Rejected,
}

impl From<ReviewDecision> for RegistrationStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Accepted => RegistrationStatus::Accepted,
            ReviewDecision::Rejected => RegistrationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegistrationStatusUpdate {
    pub status: ReviewDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatusUpdateResponse {
    pub success: bool,
    pub registration: Registration,
    /// Only present when the applicant was accepted
    #[serde(default)]
    pub rsvp_link: Option<String>,
}

/// Filters for the registration review table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRegistrationsParams {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl GetRegistrationsParams {
    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub confirmed: u64,
}

impl StatusCounts {
    pub fn get(&self, status: RegistrationStatus) -> u64 {
        match status {
            RegistrationStatus::Submitted => self.submitted,
            RegistrationStatus::Accepted => self.accepted,
            RegistrationStatus::Rejected => self.rejected,
            RegistrationStatus::Confirmed => self.confirmed,
        }
    }

    pub fn set(&mut self, status: RegistrationStatus, count: u64) {
        match status {
            RegistrationStatus::Submitted => self.submitted = count,
            RegistrationStatus::Accepted => self.accepted = count,
            RegistrationStatus::Rejected => self.rejected = count,
            RegistrationStatus::Confirmed => self.confirmed = count,
        }
    }

    pub fn total(&self) -> u64 {
        self.submitted + self.accepted + self.rejected + self.confirmed
    }
}

/// One field of an event's registration form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: Option<Map<String, Value>>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Registration form schema stored on the event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFormSchema {
    #[serde(default)]
    pub auto_accept: Option<bool>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl RegistrationFormSchema {
    /// Parse the loosely-typed schema carried on an event
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Label for a form field, falling back to a title-cased field id
pub fn field_label(schema: Option<&RegistrationFormSchema>, field_id: &str) -> String {
    schema
        .and_then(|s| s.fields.iter().find(|f| f.id == field_id))
        .map(|f| f.label.as_str())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format_field_name(field_id))
}

fn string_field<'a>(form_data: &'a Map<String, Value>, key: &str) -> &'a str {
    form_data.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Applicant name from form data.
///
/// Tries `fullName`, then `firstName lastName`, then the legacy snake_case
/// keys, and finally gives "Unknown".
pub fn extract_name(form_data: &Map<String, Value>) -> String {
    let full = string_field(form_data, "fullName");
    if !full.is_empty() {
        return full.to_string();
    }

    let combined = format!(
        "{} {}",
        string_field(form_data, "firstName"),
        string_field(form_data, "lastName")
    );
    if !combined.trim().is_empty() {
        return combined.trim().to_string();
    }

    let legacy_full = string_field(form_data, "full_name");
    if !legacy_full.is_empty() {
        return legacy_full.to_string();
    }

    let legacy = format!(
        "{} {}",
        string_field(form_data, "first_name"),
        string_field(form_data, "last_name")
    );
    match legacy.trim() {
        "" => "Unknown".to_string(),
        name => name.to_string(),
    }
}

pub fn extract_email(form_data: &Map<String, Value>) -> String {
    string_field(form_data, "email").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_extract_name_patterns() {
        assert_eq!(extract_name(&form(json!({"fullName": "Ada Lovelace"}))), "Ada Lovelace");
        assert_eq!(extract_name(&form(json!({"firstName": "Ada", "lastName": "L"}))), "Ada L");
        assert_eq!(extract_name(&form(json!({"firstName": "Ada"}))), "Ada");
        assert_eq!(extract_name(&form(json!({"full_name": "Grace Hopper"}))), "Grace Hopper");
        assert_eq!(extract_name(&form(json!({"first_name": "Grace", "last_name": "H"}))), "Grace H");
        assert_eq!(extract_name(&form(json!({"fullName": 42}))), "Unknown");
        assert_eq!(extract_name(&Map::new()), "Unknown");
    }

    #[test]
    fn test_extract_email() {
        assert_eq!(extract_email(&form(json!({"email": "a@b.ca"}))), "a@b.ca");
        assert_eq!(extract_email(&form(json!({"email": null}))), "");
    }

    #[test]
    fn test_field_label_fallback() {
        let schema: RegistrationFormSchema = serde_json::from_value(json!({
            "autoAccept": false,
            "fields": [
                {"id": "program", "label": "Program of Study", "type": "text", "required": true},
                {"id": "year", "label": "", "type": "select", "required": false, "options": ["1", "2"]}
            ]
        }))
        .unwrap();

        assert_eq!(field_label(Some(&schema), "program"), "Program of Study");
        assert_eq!(field_label(Some(&schema), "year"), "Year");
        assert_eq!(field_label(Some(&schema), "linkedinUrl"), "Linkedin Url");
        assert_eq!(field_label(None, "full_name"), "Full Name");
        assert_eq!(schema.fields[1].options.as_deref().map(|o| o.len()), Some(2));
    }

    #[test]
    fn test_status_display_and_parse() {
        assert_eq!(RegistrationStatus::Confirmed.to_string(), "Confirmed");
        assert_eq!("ACCEPTED".parse::<RegistrationStatus>(), Ok(RegistrationStatus::Accepted));
        assert!("pending".parse::<RegistrationStatus>().is_err());
    }

    #[test]
    fn test_parse_detail_with_files() {
        let json = json!({
            "registration": {
                "id": "r-1",
                "eventId": "e-1",
                "formData": {"fullName": "Ada Lovelace", "email": "ada@mail.utoronto.ca"},
                "status": "submitted",
                "submittedAt": "2025-01-10T12:00:00Z",
                "reviewedBy": null,
                "reviewedAt": null,
                "rsvpToken": null,
                "confirmedAt": null,
                "checkedIn": false,
                "checkedInAt": null,
                "checkedInBy": null,
                "createdAt": "2025-01-10T12:00:00Z",
                "updatedAt": "2025-01-10T12:00:00Z",
                "files": [{
                    "id": "f-1",
                    "registrationId": "r-1",
                    "eventId": "e-1",
                    "fieldName": "resume",
                    "fileUrl": "https://files.example.org/r.pdf",
                    "fileName": "resume.pdf",
                    "fileSize": 2048,
                    "mimeType": "application/pdf",
                    "uploadSessionId": "s-1",
                    "uploadedAt": "2025-01-10T11:59:00Z",
                    "scheduledDeletionDate": null,
                    "deleted": false,
                    "deletedAt": null
                }]
            }
        });

        let detail: RegistrationDetailResponse = serde_json::from_value(json).unwrap();
        let reg = &detail.registration;
        assert_eq!(reg.registration.applicant_name(), "Ada Lovelace");
        assert!(reg.registration.is_reviewable());
        assert_eq!(reg.files[0].size_display(), "2.0 KB");
    }

    #[test]
    fn test_pagination_neighbours() {
        let first = RegistrationPagination { total: 45, page: 1, limit: 20, total_pages: 3 };
        assert!(first.has_next());
        assert!(!first.has_prev());

        let last = RegistrationPagination { page: 3, ..first };
        assert!(!last.has_next());
        assert!(last.has_prev());

        let empty = RegistrationPagination::default();
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.set(RegistrationStatus::Submitted, 4);
        counts.set(RegistrationStatus::Confirmed, 2);
        assert_eq!(counts.get(RegistrationStatus::Submitted), 4);
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_params_serialize_for_cache_key() {
        let params = GetRegistrationsParams {
            status: Some(RegistrationStatus::Accepted),
            limit: Some(1),
            ..GetRegistrationsParams::for_event("e-1")
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"eventId": "e-1", "status": "accepted", "limit": 1})
        );
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    CoPresident,
    Vp,
    Director,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::CoPresident => "co_president",
            UserRole::Vp => "vp",
            UserRole::Director => "director",
        }
    }

    /// Co-presidents and VPs manage the team; directors do not
    pub fn can_manage_team(&self) -> bool {
        matches!(self, UserRole::CoPresident | UserRole::Vp)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::CoPresident => write!(f, "Co-President"),
            UserRole::Vp => write!(f, "VP"),
            UserRole::Director => write!(f, "Director"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "co_president" => Ok(UserRole::CoPresident),
            "vp" => Ok(UserRole::Vp),
            "director" => Ok(UserRole::Director),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailNotificationPreference {
    #[default]
    All,
    UrgentOnly,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub announcements: EmailNotificationPreference,
    pub rsvp_changes: bool,
    pub new_application_submitted: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            announcements: EmailNotificationPreference::All,
            rsvp_changes: true,
            new_application_submitted: true,
        }
    }
}

/// Executive team member, as returned by `/auth/me` and `/users`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub display_role: String,
    pub department_id: Option<String>,
    pub preferred_name: Option<String>,
    pub photo_url: Option<String>,
    pub invited_by: Option<String>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    pub linkedin_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Preferred name if set, otherwise first name, followed by last name
    pub fn display_name(&self) -> String {
        let first = self
            .preferred_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.first_name);
        format!("{} {}", first, self.last_name).trim().to_string()
    }

    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .next()
            .into_iter()
            .chain(self.last_name.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub total: u64,
    pub users: Vec<User>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Body for `POST /auth/invite`; the endpoint takes snake_case names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub display_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteUserResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
}

/// Body for `PATCH /users/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub success: bool,
    pub message: String,
    pub deleted_user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUsersParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentListResponse {
    pub year: Option<i32>,
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearsResponse {
    pub years: Vec<i32>,
    pub current_year: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDepartmentsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
}

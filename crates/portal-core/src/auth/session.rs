use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Access token lifetime assumed when the token grant omits one.
/// The identity provider issues one-hour tokens by default.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The authenticated identity state held by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES) >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.email.as_deref())
    }
}

/// Token pair returned by the backend sign-in endpoint or the identity
/// provider's refresh endpoint.
///
/// The backend answers in camelCase while the identity provider uses
/// snake_case, so both spellings are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
    /// Unix timestamp in seconds
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
            expires_at: None,
            user: None,
        }
    }

    /// Convert the grant into session data, resolving the expiry instant.
    /// An absolute `expires_at` wins over a relative `expires_in`.
    pub fn into_session(self, previous_user: Option<SessionUser>) -> SessionData {
        let now = Utc::now();
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| {
                now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
            });

        SessionData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.or(previous_user),
        }
    }
}

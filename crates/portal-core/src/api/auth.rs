//! Account endpoints: sign-in, password recovery, onboarding and invites.

use reqwest::{Method, Response};
use serde::Serialize;
use tracing::{debug, info};

use super::client::{Acknowledgement, ApiClient, RequestOptions};
use super::ApiError;
use crate::auth::TokenGrant;
use crate::models::{InviteUserRequest, InviteUserResponse, User};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again in an hour.";
const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    reset_token: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteOnboardingRequest<'a> {
    password: &'a str,
    preferred_name: Option<&'a str>,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Check a new password and its confirmation before sending them anywhere
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirmation {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Recovery endpoints answer 429 when rate limited and otherwise give no detail
async fn recovery_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    debug!(%status, body = %ApiError::body_excerpt(&body), "Password recovery request failed");
    let message = if status.as_u16() == 429 {
        RATE_LIMITED_MESSAGE
    } else {
        GENERIC_FAILURE_MESSAGE
    };
    ApiError::Api {
        status: status.as_u16(),
        message: message.to_string(),
    }
}

impl ApiClient {
    /// Exchange credentials for a token pair. No bearer token is sent.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let options = RequestOptions::new(Method::POST).json(&SignInRequest { email, password })?;
        let response = self.send_public("/auth/sign-in", &options).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = ApiError::detail_message(&body)
                .unwrap_or_else(|| INVALID_CREDENTIALS_MESSAGE.to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let grant: Option<TokenGrant> = Self::parse_json(response).await?;
        let grant = grant
            .ok_or_else(|| ApiError::InvalidResponse("Sign-in returned no tokens".to_string()))?;
        info!(email, "Credentials accepted");
        Ok(grant)
    }

    /// Ask the backend to mail a reset link. Succeeds whether or not the
    /// address exists.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let options =
            RequestOptions::new(Method::POST).json(&ForgotPasswordRequest { email })?;
        let response = self.send_public("/auth/forgot-password", &options).await?;
        if !response.status().is_success() {
            return Err(recovery_error(response).await);
        }
        Ok(())
    }

    /// Set a new password using the token from a reset link
    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), ApiError> {
        validate_new_password(password, confirmation)?;
        let options = RequestOptions::new(Method::POST).json(&ResetPasswordRequest {
            reset_token,
            password,
        })?;
        let response = self.send_public("/auth/reset-password", &options).await?;
        if !response.status().is_success() {
            return Err(recovery_error(response).await);
        }
        Ok(())
    }

    /// Finish an invite: set the password and create the member record.
    /// Must be called with the invite session active.
    pub async fn complete_onboarding(
        &self,
        password: &str,
        confirmation: &str,
        preferred_name: Option<&str>,
    ) -> Result<(), ApiError> {
        validate_new_password(password, confirmation)?;
        let preferred_name = preferred_name.map(str::trim).filter(|n| !n.is_empty());
        let options = RequestOptions::new(Method::POST).json(&CompleteOnboardingRequest {
            password,
            preferred_name,
        })?;
        self.fetch::<Acknowledgement>("/auth/complete-onboarding", options)
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), ApiError> {
        if new_password != confirmation {
            return Err(ApiError::Validation("Passwords do not match".to_string()));
        }
        let options = RequestOptions::new(Method::POST).json(&ChangePasswordRequest {
            current_password,
            new_password,
        })?;
        self.fetch::<Acknowledgement>("/auth/change-password", options)
            .await?;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn invite_user(&self, invite: &InviteUserRequest) -> Result<InviteUserResponse, ApiError> {
        self.post("/auth/invite", invite).await
    }
}

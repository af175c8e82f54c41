/// Authentication session: stored token, logged-in flag and cached profile

use crate::api::{ApiClient, ApiError, LoginRequest};
use crate::settings::keys;
use crate::storage::{self, KeyValueStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login failed: {0}")]
    Rejected(String),

    #[error("Error occurred during login")]
    Api(#[from] ApiError),
}

/// Profile fields as last reported by the server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub credits: Option<i64>,
}

impl UserProfile {
    /// Up to two initials for the avatar, "U" without a name
    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "User" } else { &self.name }
    }

    pub fn out_of_credits(&self) -> bool {
        matches!(self.credits, Some(credits) if credits <= 0)
    }

    pub async fn load(store: &dyn KeyValueStore) -> Option<UserProfile> {
        storage::get_value(store, keys::USER, None).await
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub token: String,
    pub is_logged_in: bool,
}

impl Session {
    pub async fn load(store: &dyn KeyValueStore) -> Session {
        Session {
            token: storage::get_value(store, keys::USER_TOKEN, String::new()).await,
            is_logged_in: storage::get_value(store, keys::IS_LOGGED_IN, false).await,
        }
    }

    /// The token, if the session may start a workflow
    pub fn authorized_token(&self) -> Option<&str> {
        if self.is_logged_in && !self.token.is_empty() {
            Some(&self.token)
        } else {
            None
        }
    }
}

/// Check the stored token against the server and update the logged-in flag.
/// Any failure leaves the session logged out.
pub async fn validate_session(store: &dyn KeyValueStore, api: &ApiClient) -> bool {
    let token: String = storage::get_value(store, keys::USER_TOKEN, String::new()).await;
    if token.is_empty() {
        storage::set_value(store, keys::IS_LOGGED_IN, &false).await;
        return false;
    }

    let authenticated = match api.auth_check(&token).await {
        Ok(authenticated) => authenticated,
        Err(e) => {
            log::error!("Error validating user: {}", e);
            false
        }
    };

    storage::set_value(store, keys::IS_LOGGED_IN, &authenticated).await;
    authenticated
}

/// Client-side checks before the login request is sent
pub fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() {
        return Err("Email is required");
    }
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err("Please enter a valid email address");
    }
    if password.is_empty() {
        return Err("Password is required");
    }
    Ok(())
}

/// Log in and persist the token, flag and any profile fields returned
pub async fn login(
    store: &dyn KeyValueStore,
    api: &ApiClient,
    email: &str,
    password: &str,
) -> Result<UserProfile, SessionError> {
    let request = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
        remember: false,
    };
    let response = api.login(&request).await?;

    let user = match response.user {
        Some(user) if response.results && !user.token.is_empty() => user,
        _ => {
            let message = response.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(SessionError::Rejected(message));
        }
    };

    let mut profile = user.profile();
    if profile.email.is_empty() {
        profile.email = request.email;
    }

    storage::set_value(store, keys::USER_TOKEN, &user.token).await;
    storage::set_value(store, keys::IS_LOGGED_IN, &true).await;
    storage::set_value(store, keys::USER, &profile).await;
    log::info!("Logged in as {}", profile.email);

    Ok(profile)
}

pub async fn logout(store: &dyn KeyValueStore) {
    storage::set_value(store, keys::USER_TOKEN, "").await;
    storage::set_value(store, keys::IS_LOGGED_IN, &false).await;
}

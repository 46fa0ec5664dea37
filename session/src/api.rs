//! Backend REST client: auth endpoints, the profile fetcher, and the
//! authenticated farmer-data helpers.
//!
//! DESIGN
//! ======
//! Transport (`reqwest`) is kept apart from body interpretation: every
//! endpoint funnels through `send` to get `(status, body)` and then through a
//! pure `parse_*` function. The session state machine only depends on the
//! `AuthApi` trait so tests can substitute a scripted backend.
//!
//! ERROR HANDLING
//! ==============
//! Register/login failures become `SessionError::Credential` carrying the
//! backend's `error` string (or a generic fallback) because the caller shows
//! them verbatim on the form. Everything else keeps the status code.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::SessionError;
use crate::types::{
    Activity, AuthBody, FarmerProfile, LoginData, LoginResponse, NewActivity, ProfileUpdate, RegisterData,
    RegisterResponse, User, WireUser,
};

const REGISTER_FALLBACK: &str = "Registration failed";
const LOGIN_FALLBACK: &str = "Login failed";
const PROFILE_FALLBACK: &str = "Failed to fetch profile";

// =============================================================================
// TRAIT
// =============================================================================

/// The backend operations the session state machine needs.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/register`.
    async fn register(&self, data: &RegisterData) -> Result<RegisterResponse, SessionError>;

    /// `POST /auth/login`.
    async fn login(&self, data: &LoginData) -> Result<LoginResponse, SessionError>;

    /// `GET /profile` with a bearer token: the authoritative user record.
    async fn fetch_profile(&self, token: &str) -> Result<User, SessionError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http: reqwest::Client,
    config: ApiConfig,
}

impl HttpAuthApi {
    /// Build a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: ApiConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| SessionError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), SessionError> {
        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;
        Ok((status, body))
    }

    fn authed(&self, method: reqwest::Method, path: &str, token: &str) -> Result<reqwest::RequestBuilder, SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }
        Ok(self.http.request(method, self.config.endpoint(path)).bearer_auth(token))
    }

    /// `GET /profile` returning every stored farm detail.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a malformed body.
    pub async fn fetch_farmer_profile(&self, token: &str) -> Result<FarmerProfile, SessionError> {
        let request = self.authed(reqwest::Method::GET, "/profile", token)?;
        let (status, body) = self.send(request).await?;
        parse_json_response(status, &body, PROFILE_FALLBACK)
    }

    /// `PUT /profile` with the changed fields; returns the updated profile.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a malformed body.
    pub async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<FarmerProfile, SessionError> {
        let request = self.authed(reqwest::Method::PUT, "/profile", token)?.json(update);
        let (status, body) = self.send(request).await?;
        parse_json_response(status, &body, "Failed to update profile")
    }

    /// `GET /activities` for the signed-in farmer.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a malformed body.
    pub async fn list_activities(&self, token: &str) -> Result<Vec<Activity>, SessionError> {
        let request = self.authed(reqwest::Method::GET, "/activities", token)?;
        let (status, body) = self.send(request).await?;
        parse_json_response(status, &body, "Failed to fetch activities")
    }

    /// `POST /activities`; returns the stored activity.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a malformed body.
    pub async fn create_activity(&self, token: &str, activity: &NewActivity) -> Result<Activity, SessionError> {
        let request = self.authed(reqwest::Method::POST, "/activities", token)?.json(activity);
        let (status, body) = self.send(request).await?;
        parse_json_response(status, &body, "Failed to create activity")
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn register(&self, data: &RegisterData) -> Result<RegisterResponse, SessionError> {
        let request = self.http.post(self.config.endpoint("/auth/register")).json(data);
        let (status, body) = self.send(request).await?;
        debug!(status, "register response");
        parse_register_response(status, &body)
    }

    async fn login(&self, data: &LoginData) -> Result<LoginResponse, SessionError> {
        let request = self.http.post(self.config.endpoint("/auth/login")).json(data);
        let (status, body) = self.send(request).await?;
        debug!(status, "login response");
        parse_login_response(status, &body)
    }

    async fn fetch_profile(&self, token: &str) -> Result<User, SessionError> {
        let request = self.authed(reqwest::Method::GET, "/profile", token)?;
        let (status, body) = self.send(request).await?;
        debug!(status, "profile response");
        parse_profile_response(status, &body)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// The backend's `error` field, if the body is JSON and carries one.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_auth_body(status: u16, body: &str, fallback: &str) -> Result<AuthBody, SessionError> {
    if !is_success(status) {
        let message = error_message(body).unwrap_or_else(|| fallback.to_owned());
        return Err(SessionError::Credential(message));
    }
    serde_json::from_str(body).map_err(|e| SessionError::Parse(e.to_string()))
}

pub(crate) fn parse_register_response(status: u16, body: &str) -> Result<RegisterResponse, SessionError> {
    let body = parse_auth_body(status, body, REGISTER_FALLBACK)?;
    Ok(RegisterResponse {
        message: body.message.unwrap_or_default(),
        user: body.user.and_then(WireUser::into_user),
    })
}

pub(crate) fn parse_login_response(status: u16, body: &str) -> Result<LoginResponse, SessionError> {
    let body = parse_auth_body(status, body, LOGIN_FALLBACK)?;
    let token = body
        .token
        .filter(|t| !t.is_empty())
        .or(body.auth_token.filter(|t| !t.is_empty()));
    Ok(LoginResponse {
        message: body.message.unwrap_or_default(),
        token,
        user: body.user.and_then(WireUser::into_user),
    })
}

pub(crate) fn parse_profile_response(status: u16, body: &str) -> Result<User, SessionError> {
    if !is_success(status) {
        let message = error_message(body).unwrap_or_else(|| PROFILE_FALLBACK.to_owned());
        return Err(SessionError::Status { status, message });
    }
    let wire: WireUser = serde_json::from_str(body).map_err(|e| SessionError::Parse(e.to_string()))?;
    wire.into_user()
        .ok_or_else(|| SessionError::Parse("profile is missing id, name or email".to_owned()))
}

pub(crate) fn parse_json_response<T: DeserializeOwned>(status: u16, body: &str, fallback: &str) -> Result<T, SessionError> {
    if !is_success(status) {
        let message = error_message(body).unwrap_or_else(|| fallback.to_owned());
        return Err(SessionError::Status { status, message });
    }
    serde_json::from_str(body).map_err(|e| SessionError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

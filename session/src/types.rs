//! Wire and domain types shared by the session core and the REST helpers.
//!
//! DESIGN
//! ======
//! The backend is a document store that names identifiers `_id`; the client
//! normalizes everything to `id` at the boundary so cached records and
//! in-memory state share one shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// USER
// =============================================================================

/// The signed-in farmer as cached in storage and held in session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    /// True when `id`, `name` and `email` are all non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.email.is_empty()
    }
}

/// Loosely-typed user body as sent by the backend or found in storage.
///
/// Every field is optional so structurally incomplete records can be detected
/// instead of failing deserialization outright.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireUser {
    #[serde(rename = "_id", default)]
    underscore_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

impl WireUser {
    /// Normalize into a [`User`], returning `None` when a required field is
    /// missing or empty.
    pub(crate) fn into_user(self) -> Option<User> {
        let id = [self.underscore_id, self.id]
            .into_iter()
            .flatten()
            .find_map(|raw| id_to_string(&raw))?;
        let user = User {
            id,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone.filter(|p| !p.is_empty()),
        };
        user.is_complete().then_some(user)
    }
}

fn id_to_string(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a cached `user` storage value. `None` for corrupt JSON or an
/// incomplete record.
pub(crate) fn parse_cached_user(raw: &str) -> Option<User> {
    serde_json::from_str::<WireUser>(raw).ok()?.into_user()
}

// =============================================================================
// AUTH REQUESTS / RESPONSES
// =============================================================================

/// Credentials for `POST /auth/login`. Exactly one of `email`/`phone` is
/// normally set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

impl LoginData {
    #[must_use]
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: Some(email.into()), phone: None, password: password.into() }
    }

    #[must_use]
    pub fn with_phone(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: None, phone: Some(phone.into()), password: password.into() }
    }
}

/// Account details for `POST /auth/register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

impl RegisterData {
    /// Credentials used for the automatic login after a successful registration.
    #[must_use]
    pub fn login_data(&self) -> LoginData {
        LoginData::with_email(self.email.clone(), self.password.clone())
    }
}

/// Normalized login response. `token` is taken from `token` or `authToken`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    pub message: String,
    pub token: Option<String>,
    pub user: Option<User>,
}

/// Normalized registration response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterResponse {
    pub message: String,
    pub user: Option<User>,
}

/// Raw body shared by the register and login endpoints, success or failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) token: Option<String>,
    #[serde(default)]
    pub(crate) auth_token: Option<String>,
    #[serde(default)]
    pub(crate) user: Option<WireUser>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

// =============================================================================
// FARMER PROFILE
// =============================================================================

/// Full farmer profile returned by `GET /profile` / `PUT /profile`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfile {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub land_size: Option<String>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub soil_type: Option<String>,
    #[serde(default)]
    pub irrigation: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Editable profile fields for `PUT /profile`. Unset fields are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub land_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irrigation: Option<String>,
}

impl ProfileUpdate {
    /// True when no field would be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// ACTIVITIES
// =============================================================================

/// A logged farm activity (sowing, irrigation, fertilizer, pest check, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body for `POST /activities`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub location: String,
    pub description: String,
    pub quantity: String,
    pub notes: String,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

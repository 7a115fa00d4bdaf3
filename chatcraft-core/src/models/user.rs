use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatcraftError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub preferences: Option<Value>,
    pub profile_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row for `GET /users`.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            company: u.company.clone(),
            role: u.role.clone(),
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    /// Generated when `None`.
    pub id: Option<String>,
    pub email: String,
    pub hashed_password: String,
}

/// Sparse profile update.
///
/// Outer `None` means the key was absent and the column is left alone;
/// `Some(None)` means the caller sent `null` and the column is cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDetails {
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub role: Option<Option<String>>,
    pub preferences: Option<Option<Value>>,
    pub profile_data: Option<Option<String>>,
}

impl UserDetails {
    /// Pick the recognised profile keys out of a free-form JSON object.
    /// Unknown keys are ignored.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ChatcraftError> {
        Ok(Self {
            first_name: text_field(map, "first_name")?,
            last_name: text_field(map, "last_name")?,
            company: text_field(map, "company")?,
            role: text_field(map, "role")?,
            preferences: map
                .get("preferences")
                .map(|v| if v.is_null() { None } else { Some(v.clone()) }),
            profile_data: text_field(map, "profile_data")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.company.is_none()
            && self.role.is_none()
            && self.preferences.is_none()
            && self.profile_data.is_none()
    }

    /// Overwrite the fields present in `self` on `user`.
    pub fn apply_to(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.company {
            user.company = v.clone();
        }
        if let Some(v) = &self.role {
            user.role = v.clone();
        }
        if let Some(v) = &self.preferences {
            user.preferences = v.clone();
        }
        if let Some(v) = &self.profile_data {
            user.profile_data = v.clone();
        }
        user.updated_at = now;
    }
}

fn text_field(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Option<String>>, ChatcraftError> {
    match map.get(field) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(ChatcraftError::InvalidField {
            field,
            expected: "string or null",
        }),
    }
}

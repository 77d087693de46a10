use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::macros::format_description;

use crate::users::repo_types::User;

pub const PROFILE_PAYLOAD_TYPE: &str = "user_profile";

/// Profile data carried inside a QR code. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date_of_birth: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub avatar_url: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub kind: String,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("QR payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("QR code does not contain a user profile")]
    WrongType,
    #[error("QR profile is missing {0}")]
    MissingField(&'static str),
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl ProfilePayload {
    pub fn from_user(user: &User) -> Self {
        let date_of_birth = user
            .date_of_birth
            .and_then(|d| d.format(format_description!("[year]-[month]-[day]")).ok())
            .unwrap_or_default();
        Self {
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone().unwrap_or_default(),
            bio: user.bio.clone().unwrap_or_default(),
            location: user.location.clone().unwrap_or_default(),
            date_of_birth,
            avatar_url: user.avatar_url.clone().unwrap_or_default(),
            kind: PROFILE_PAYLOAD_TYPE.to_string(),
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse scanned text. Unknown keys are ignored.
    pub fn decode(text: &str) -> Result<Self, PayloadError> {
        let payload: ProfilePayload = serde_json::from_str(text.trim())?;
        if payload.kind != PROFILE_PAYLOAD_TYPE {
            return Err(PayloadError::WrongType);
        }
        if payload.full_name.trim().is_empty() {
            return Err(PayloadError::MissingField("fullName"));
        }
        if payload.email.trim().is_empty() {
            return Err(PayloadError::MissingField("email"));
        }
        Ok(payload)
    }
}

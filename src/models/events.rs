//! Decoded domain events, one type per topic.
//!
//! Field names below are the canonical (folded) forms produced by
//! [`decode_payload`](super::payload::decode_payload).

use super::payload::{
    decode_payload, lenient_timestamp, optional_string_or_number, string_or_number, token_list,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Why a payload could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// A topic-specific event decoded from a raw broker payload
pub trait DomainEvent: DeserializeOwned + Sized {
    /// Name used in log output
    const EVENT_NAME: &'static str;

    /// Checks beyond what deserialization enforces
    fn validate(&self) -> Result<(), DecodeError> {
        Ok(())
    }

    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: Self =
            decode_payload(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }
}

/// Device platform reported at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Web,
    Other(String),
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "android" => Platform::Android,
            "ios" => Platform::Ios,
            "web" => Platform::Web,
            _ => Platform::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
            Platform::Web => write!(f, "web"),
            Platform::Other(other) => write!(f, "{other}"),
        }
    }
}

/// `user.registered`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRegisteredEvent {
    #[serde(rename = "userid", deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(rename = "devicetoken", default)]
    pub device_token: Option<String>,
    /// Some producers send a list even for a single device
    #[serde(rename = "devicetokens", default, deserialize_with = "token_list")]
    pub device_tokens: Vec<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(rename = "registeredat", default, deserialize_with = "lenient_timestamp")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl UserRegisteredEvent {
    pub fn platform(&self) -> Option<Platform> {
        self.platform.as_deref().and_then(|p| p.parse().ok())
    }

    /// All non-blank tokens, singular field first, duplicates removed
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::with_capacity(1 + self.device_tokens.len());
        let candidates = self.device_token.iter().chain(self.device_tokens.iter());
        for token in candidates {
            let token = token.trim();
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        tokens
    }
}

impl DomainEvent for UserRegisteredEvent {
    const EVENT_NAME: &'static str = "UserRegistered";

    fn validate(&self) -> Result<(), DecodeError> {
        if self.user_id.trim().is_empty() {
            return Err(DecodeError::MissingField("userId"));
        }
        Ok(())
    }
}

/// `user.deregistered`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserDeregisteredEvent {
    #[serde(rename = "userid", deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(rename = "devicetokens", default, deserialize_with = "token_list")]
    pub device_tokens: Vec<String>,
    #[serde(rename = "deregisteredat", default, deserialize_with = "lenient_timestamp")]
    pub deregistered_at: Option<DateTime<Utc>>,
}

impl DomainEvent for UserDeregisteredEvent {
    const EVENT_NAME: &'static str = "UserDeregistered";

    fn validate(&self) -> Result<(), DecodeError> {
        if self.user_id.trim().is_empty() {
            return Err(DecodeError::MissingField("userId"));
        }
        Ok(())
    }
}

/// `audio.analyze.completed`
///
/// Two producer shapes are in circulation: `{fileName, status,
/// transcriptionData, processedAt}` and `{userId, audioId, analysisResult,
/// completedAt}`. Both decode into this type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioAnalysisCompletedEvent {
    #[serde(rename = "userid", default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
    #[serde(rename = "filename", default)]
    pub file_name: Option<String>,
    #[serde(rename = "audioid", default, deserialize_with = "optional_string_or_number")]
    pub audio_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "analysisresult", default)]
    pub analysis_result: Option<String>,
    #[serde(rename = "transcriptiondata", default)]
    pub transcription_data: Option<String>,
    #[serde(rename = "devicetokens", default, deserialize_with = "token_list")]
    pub device_tokens: Vec<String>,
    #[serde(rename = "completedat", default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "processedat", default, deserialize_with = "lenient_timestamp")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl AudioAnalysisCompletedEvent {
    pub const STATUS_SUCCESS: &'static str = "success";

    /// What the notification talks about: file name, else audio id, else user id
    pub fn subject(&self) -> Option<&str> {
        [&self.file_name, &self.audio_id, &self.user_id]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Explicit status, else `success` when a result is attached, else `unknown`
    pub fn status(&self) -> &str {
        match self.status.as_deref().map(str::trim) {
            Some(status) if !status.is_empty() => status,
            _ if self.analysis_result.is_some() || self.transcription_data.is_some() => {
                Self::STATUS_SUCCESS
            }
            _ => "unknown",
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().eq_ignore_ascii_case(Self::STATUS_SUCCESS)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.processed_at)
    }
}

impl DomainEvent for AudioAnalysisCompletedEvent {
    const EVENT_NAME: &'static str = "AudioAnalysisCompleted";

    fn validate(&self) -> Result<(), DecodeError> {
        if self.subject().is_none() {
            return Err(DecodeError::MissingField("fileName|audioId|userId"));
        }
        Ok(())
    }
}

//! JSON bodies exchanged with the remote service.

use crate::domain::order::{OrderRef, Requirements, Submission};
use crate::error::{EngineError, Result};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Body of an `auth` or `sign` call.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub end_user_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_visible_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_non_visible_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<RequirementPayload>,
}

#[derive(Debug, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequirementPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_reader: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificate_policies: Vec<String>,
    #[serde(rename = "issuerCn", skip_serializing_if = "Vec::is_empty")]
    pub issuer_cn: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub token_start_required: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub allow_fingerprint: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

impl RequirementPayload {
    fn from_requirements(requirements: &Requirements) -> Option<Self> {
        let payload = Self {
            card_reader: non_empty(requirements.card_reader.as_ref()),
            certificate_policies: requirements.certificate_policies.clone(),
            issuer_cn: requirements.issuer_cn.clone(),
            token_start_required: requirements.token_start_required,
            allow_fingerprint: requirements.allow_fingerprint,
        };
        (payload != Self::default()).then_some(payload)
    }
}

impl StartRequest {
    pub fn from_submission(submission: &Submission) -> Self {
        let requirements = submission.requirements.as_ref();
        Self {
            end_user_ip: submission.end_user_ip.clone(),
            personal_number: requirements.and_then(|r| non_empty(r.personal_number.as_ref())),
            user_visible_data: non_empty(submission.user_visible_data.as_ref()),
            user_non_visible_data: requirements
                .and_then(|r| non_empty(r.user_non_visible_data.as_ref())),
            requirement: requirements.and_then(RequirementPayload::from_requirements),
        }
    }
}

/// Body of `collect` and `cancel` calls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRefRequest<'a> {
    pub order_ref: &'a OrderRef,
}

fn secret_string<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub order_ref: OrderRef,
    #[serde(default)]
    pub auto_start_token: String,
    #[serde(default)]
    pub qr_start_token: String,
    #[serde(default = "empty_secret", deserialize_with = "secret_string")]
    pub qr_start_secret: SecretString,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectStatus {
    Pending,
    Failed,
    Complete,
    Unknown(String),
}

impl From<String> for CollectStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "failed" => Self::Failed,
            "complete" => Self::Complete,
            _ => Self::Unknown(value),
        }
    }
}

impl<'de> Deserialize<'de> for CollectStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    #[serde(default)]
    pub order_ref: Option<OrderRef>,
    pub status: CollectStatus,
    #[serde(default)]
    pub hint_code: String,
    #[serde(default)]
    pub completion_data: Option<CompletionData>,
}

/// The record returned once an order completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub cert: CertValidity,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub ocsp_response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub personal_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default)]
    pub ip_address: String,
}

/// Validity window of the user's certificate, as epoch milliseconds in string form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertValidity {
    #[serde(default)]
    pub not_before: String,
    #[serde(default)]
    pub not_after: String,
}

/// Error body of every non-2xx answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_code: String,
    #[serde(default)]
    pub details: String,
}

/// Turns a non-2xx response body into the error it describes.
pub fn remote_error(body: &[u8]) -> EngineError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => EngineError::RemoteError {
            code: envelope.error_code,
            details: envelope.details,
        },
        Err(e) => EngineError::ProtocolError(format!("could not decode error response: {e}")),
    }
}

fn protocol_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::ProtocolError(format!("failed to decode server response: {e}"))
}

/// Decodes a 2xx response body.
///
/// Only a JSON object is accepted: derived deserializers would otherwise also
/// take a sequence and fill the fields by position.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let object: Map<String, Value> = serde_json::from_slice(body).map_err(protocol_error)?;
    serde_json::from_value(Value::Object(object)).map_err(protocol_error)
}

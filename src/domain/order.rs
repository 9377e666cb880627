use crate::domain::ports::PairingSinkHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-visible identifier of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh, opaque identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Service-assigned reference, known only once `start` has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderRef(String);

impl OrderRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Authentication,
    Signature,
}

/// Optional constraints attached to an order at submission.
///
/// `personal_number` and `user_non_visible_data` travel at the top level of
/// the start request; the rest is sent as the `requirement` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// 12 digits, `YYYYMMDDNNNN`.
    pub personal_number: Option<String>,
    /// Already encoded by the caller.
    pub user_non_visible_data: Option<String>,
    /// `class1` or `class2`.
    pub card_reader: Option<String>,
    pub certificate_policies: Vec<String>,
    pub issuer_cn: Vec<String>,
    pub token_start_required: bool,
    pub allow_fingerprint: bool,
}

/// Everything a caller hands to [`SessionEngine::submit`].
///
/// [`SessionEngine::submit`]: crate::application::engine::SessionEngine::submit
#[derive(Clone)]
pub struct Submission {
    pub end_user_ip: String,
    pub order_id: Option<OrderId>,
    /// The text to be signed. Its presence turns the order into a signature.
    pub user_visible_data: Option<String>,
    pub requirements: Option<Requirements>,
    pub pairing_sink: Option<PairingSinkHandle>,
}

impl Submission {
    pub fn new(end_user_ip: impl Into<String>) -> Self {
        Self {
            end_user_ip: end_user_ip.into(),
            order_id: None,
            user_visible_data: None,
            requirements: None,
            pairing_sink: None,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<OrderId>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_visible_data(mut self, text: impl Into<String>) -> Self {
        self.user_visible_data = Some(text.into());
        self
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_pairing_sink(mut self, sink: PairingSinkHandle) -> Self {
        self.pairing_sink = Some(sink);
        self
    }

    pub fn kind(&self) -> OrderKind {
        let non_visible = self
            .requirements
            .as_ref()
            .and_then(|r| r.user_non_visible_data.as_deref())
            .is_some_and(|data| !data.is_empty());
        let visible = self
            .user_visible_data
            .as_deref()
            .is_some_and(|data| !data.is_empty());
        if visible || non_visible {
            OrderKind::Signature
        } else {
            OrderKind::Authentication
        }
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("end_user_ip", &self.end_user_ip)
            .field("order_id", &self.order_id)
            .field("kind", &self.kind())
            .field("requirements", &self.requirements)
            .field("pairing", &self.pairing_sink.is_some())
            .finish()
    }
}

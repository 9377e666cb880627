use thiserror::Error;

/// Reasons a submission is refused before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
    #[error("parameter userVisibleData data too long")]
    VisibleDataTooLong,
    #[error("parameter personalNumber malformed")]
    PersonalNumberMalformed,
    #[error("parameter personalNumber must be 12 digits long")]
    PersonalNumberLength,
    #[error("parameter userNonVisibleData data too long")]
    NonVisibleDataTooLong,
    #[error("parameter cardReader set to invalid value")]
    InvalidCardReader,
    #[error("order id {0} is already in use")]
    OrderIdInUse(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
    /// The remote service could not be reached.
    #[error("transport error: {0}")]
    TransportError(String),
    /// Non-2xx answer carrying the service's error envelope.
    #[error("{code}: {details}")]
    RemoteError { code: String, details: String },
    /// A response body that does not match the protocol.
    #[error("{0}")]
    ProtocolError(String),
    #[error("no session with provided ID")]
    NotFoundError,
    #[error("pairing code error: {0}")]
    PairingError(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

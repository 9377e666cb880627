//! Input checks run before an order is handed to a worker.
//!
//! Everything here is pure: the first failing rule is returned and nothing is
//! logged or sent.

use crate::domain::order::{Requirements, Submission};
use crate::error::ValidationError;
use std::net::IpAddr;

/// Maximum length of the text to be signed, in characters.
pub const MAX_VISIBLE_DATA_LEN: usize = 40_000;
/// Maximum length of the (encoded) non-visible data, in characters.
pub const MAX_NON_VISIBLE_DATA_LEN: usize = 200_000;
pub const PERSONAL_NUMBER_LEN: usize = 12;
pub const CARD_READER_CLASSES: [&str; 2] = ["class1", "class2"];

/// Validates a whole submission: address, text to be signed, then requirements.
pub fn validate_submission(submission: &Submission) -> Result<(), ValidationError> {
    validate_end_user_ip(&submission.end_user_ip)?;
    if let Some(text) = submission.user_visible_data.as_deref() {
        validate_visible_data(text)?;
    }
    if let Some(requirements) = submission.requirements.as_ref() {
        validate_requirements(requirements)?;
    }
    Ok(())
}

pub fn validate_end_user_ip(address: &str) -> Result<(), ValidationError> {
    address
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidAddress(address.to_string()))
}

pub fn validate_visible_data(text: &str) -> Result<(), ValidationError> {
    if text.chars().count() > MAX_VISIBLE_DATA_LEN {
        return Err(ValidationError::VisibleDataTooLong);
    }
    Ok(())
}

pub fn validate_requirements(requirements: &Requirements) -> Result<(), ValidationError> {
    if let Some(number) = requirements.personal_number.as_deref()
        && !number.is_empty()
    {
        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::PersonalNumberMalformed);
        }
        if number.len() != PERSONAL_NUMBER_LEN {
            return Err(ValidationError::PersonalNumberLength);
        }
    }

    if let Some(data) = requirements.user_non_visible_data.as_deref()
        && data.chars().count() > MAX_NON_VISIBLE_DATA_LEN
    {
        return Err(ValidationError::NonVisibleDataTooLong);
    }

    if let Some(class) = requirements.card_reader.as_deref()
        && !class.is_empty()
        && !CARD_READER_CLASSES.contains(&class)
    {
        return Err(ValidationError::InvalidCardReader);
    }

    // certificate_policies and issuer_cn are passed through unchecked; pairing
    // them with card_reader consistently is up to the caller.
    Ok(())
}

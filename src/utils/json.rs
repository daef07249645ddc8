use serde_json::Value;

use crate::error::{AppError, AppResult};

pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// Reads an optional text column from a PATCH body.
///
/// `None` leaves the column untouched, `Some(None)` clears it. Blank strings
/// clear the column as well.
pub fn optional_text_change(body: &Value, field: &str) -> AppResult<Option<Option<String>>> {
    let class = classify_nullable(body.get(field))
        .map_err(|err| AppError::bad_request(format!("{field}: {err}")))?;
    Ok(match class {
        NullableValue::Omitted => None,
        NullableValue::Null => Some(None),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Some(None)
            } else {
                Some(Some(trimmed.to_string()))
            }
        }
    })
}

/// Reads a required text column from a PATCH body. Null and blank values are rejected.
pub fn required_text_change(body: &Value, field: &str) -> AppResult<Option<String>> {
    let class = classify_nullable(body.get(field))
        .map_err(|err| AppError::bad_request(format!("{field}: {err}")))?;
    match class {
        NullableValue::Omitted => Ok(None),
        NullableValue::Null => Err(AppError::bad_request(format!("{field} cannot be null"))),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(AppError::bad_request(format!("{field} must not be empty")))
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
    }
}

/// Rejects fields that may never be changed once set.
pub fn reject_immutable(body: &Value, fields: &[&str]) -> AppResult<()> {
    match fields.iter().find(|field| body.get(**field).is_some()) {
        Some(field) => Err(AppError::bad_request(format!("{field} cannot be changed"))),
        None => Ok(()),
    }
}

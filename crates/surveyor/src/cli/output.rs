//! JSON output for CLI commands.
//!
//! Success payloads and error payloads both go to stdout so a caller can parse
//! one stream; the exit status tells them apart.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use surveyor_db::DbError;
use surveyor_protocol::{ErrorBody, ErrorCode};

pub fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => eprintln!("Failed to render output: {}", err),
    }
}

/// Error payload for any command failure. Core errors keep their code;
/// anything else is reported as an internal error.
pub fn error_body(err: &anyhow::Error) -> ErrorBody {
    match err.downcast_ref::<DbError>() {
        Some(db_err) => db_err.to_body(),
        None => ErrorBody::new(ErrorCode::InternalError, format!("{:#}", err)),
    }
}

pub fn print_error(err: &anyhow::Error) {
    let body = error_body(err);
    match serde_json::to_value(&body) {
        Ok(value) => print_json(&value),
        Err(_) => eprintln!("{}: {}", body.code.as_str(), body.message),
    }
}

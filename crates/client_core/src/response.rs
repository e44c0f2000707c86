//! Maps raw transport responses onto typed results or [`SessionError`]s.

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::{error_message_from_body, status_only_message};

use crate::{
    error::SessionError,
    transport::{Payload, TransportResponse},
};

/// A successful response: the typed view plus the body it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub typed: T,
    pub body: Value,
}

pub fn decode_response<T: DeserializeOwned>(
    response: TransportResponse,
) -> Result<Decoded<T>, SessionError> {
    let status = response.status;
    if !response.is_success() {
        let message = match &response.payload {
            Payload::Json(body) => error_message_from_body(body),
            Payload::Malformed { .. } => status_only_message(status),
        };
        return Err(SessionError::Application { status, message });
    }

    let body = match response.payload {
        Payload::Json(body @ Value::Object(_)) => body,
        Payload::Json(other) => {
            return Err(SessionError::Decode {
                reason: format!("expected a json object, got {other}"),
            })
        }
        Payload::Malformed { reason } => return Err(SessionError::Decode { reason }),
    };

    let typed = serde_json::from_value(body.clone()).map_err(|e| SessionError::Decode {
        reason: e.to_string(),
    })?;
    Ok(Decoded { typed, body })
}

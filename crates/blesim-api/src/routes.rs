// ── Control-plane handlers ──
//
// Each route maps onto one controller operation. Request bodies are read
// raw so an empty body can stand in for `{}` and malformed JSON is
// reported as a 400 with the parser's message.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use tracing::debug;

use blesim_core::{AdapterController, CoreError, DeviceConfig};

use crate::error::ApiError;

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(body)?)
}

pub(crate) async fn health(State(controller): State<AdapterController>) -> impl IntoResponse {
    Json(controller.health())
}

pub(crate) async fn get_state(State(controller): State<AdapterController>) -> impl IntoResponse {
    Json(controller.state())
}

pub(crate) async fn put_state(
    State(controller): State<AdapterController>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let Value::Object(partial) = parse_body(&body)? else {
        return Err(ApiError::BadRequest(
            "state payload must be a JSON object".into(),
        ));
    };
    debug!(payload = %serde_json::Value::Object(partial.clone()), "state update requested");
    controller.set_state(partial);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn post_event(
    State(controller): State<AdapterController>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let event = parse_body(&body)?;
    controller.on_event(event);
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn get_config(State(controller): State<AdapterController>) -> impl IntoResponse {
    Json(controller.config())
}

pub(crate) async fn put_config(
    State(controller): State<AdapterController>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let raw = parse_body(&body)?;
    debug!(payload = %raw, "config update requested");
    let config = DeviceConfig::from_value(raw).map_err(CoreError::from)?;
    controller.set_config(config).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn not_found(uri: Uri) -> StatusCode {
    debug!(path = %uri.path(), "no route");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_reads_as_empty_object() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        let err = parse_body(b"not-json").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn scalar_bodies_parse() {
        assert_eq!(parse_body(b"42").unwrap(), json!(42));
    }
}

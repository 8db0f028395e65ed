use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode, header};
use serde_json::json;
use tracing::error;

use crate::GateBody;

/// Wrap a full in-memory body in the server's response body type.
pub fn full<T: Into<Bytes>>(chunk: T) -> GateBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Delivers a JSON error response with the specified error code, message, and status.
///
/// Falls back to a bare status response if the builder rejects the parts,
/// so callers on the request path never have to handle a failure here.
pub fn deliver_error_json(error_code: &str, message: &str, status: StatusCode) -> Response<GateBody> {
    error!(
        "Delivering error JSON: {} - {} ({})",
        status.as_u16(),
        error_code,
        message
    );

    let error_json = json!({
        "status": "error",
        "code": error_code,
        "message": message
    });

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(error_json.to_string()))
        .unwrap_or_else(|e| {
            error!("Failed to build error JSON response: {}", e);
            let mut fallback = Response::new(GateBody::default());
            *fallback.status_mut() = status;
            fallback
        })
}

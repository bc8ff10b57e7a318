//! Lenient JSON body parsing for the ingestion endpoint.

use ironrelay_core::error::AppError;

/// Parse a raw request body as JSON. An empty body is treated as `{}`.
pub fn parse_json_body(body: &[u8]) -> Result<serde_json::Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(body).map_err(|_| AppError::validation("Invalid JSON"))
}

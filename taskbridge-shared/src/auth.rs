//! Credential helpers shared by the server boundary and the CLI.
//!
//! Credential *issuance and verification* belong to the external auth
//! collaborator; this module only resolves the identity a token carries. Both
//! the server middleware and the client session manager read the `sub` claim
//! from the JWT payload segment, mirroring each other so the channel address
//! and the resolved sender identity always agree.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

/// Extracts the username (`sub` claim) from a JWT-shaped token.
///
/// Returns `None` when the token is not three dot-separated segments, the
/// payload is not base64url JSON, or the claim is absent or empty.
#[must_use]
pub fn username_from_token(token: &str) -> Option<String> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    segments.next()?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;

    claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|sub| !sub.is_empty())
        .map(ToString::to_string)
}

/// Builds an unsigned token carrying `sub` for local development and tests.
///
/// The server does not verify signatures (that is the auth service's job at
/// the boundary), so an unsigned token is enough to drive a dev deployment.
#[must_use]
pub fn unsigned_token(username: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": username }).to_string().as_bytes());
    format!("{header}.{payload}.")
}

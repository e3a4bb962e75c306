//! Credential resolution at the HTTP boundary.
//!
//! Token issuance and signature verification belong to the external auth
//! collaborator; this middleware only resolves the identity the token
//! carries and refuses requests where it cannot. Everything downstream of it
//! may rely on `RequestContext::username` being present.

use axum::{
    body::Body,
    extract::Request,
    http::{self, header},
    middleware::Next,
    response::Response,
};
use http::StatusCode;
use tracing::{debug, instrument};

use crate::middleware::request_context::RequestContext;

/// Middleware guarding the chat surface: resolves the caller's username from
/// the presented credential or rejects with 401 before anything is persisted.
#[instrument(skip(req, next))]
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token =
        bearer_token(req.headers()).or_else(|| token_query_param(req.uri().query()));
    let token = token.ok_or(StatusCode::UNAUTHORIZED)?;

    let username =
        shared::auth::username_from_token(&token).ok_or(StatusCode::UNAUTHORIZED)?;

    debug!(username, path = %req.uri().path(), "resolved credential");

    if let Some(context) = req.extensions_mut().get_mut::<RequestContext>() {
        context.username = Some(username);
    } else {
        req.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            username: Some(username),
        });
    }

    Ok(next.run(req).await)
}

fn bearer_token(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Browser `EventSource` clients cannot set request headers, so the stream
/// endpoint also accepts the credential as a `token` query parameter.
fn token_query_param(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .map(ToString::to_string)
        .filter(|token| !token.is_empty())
}

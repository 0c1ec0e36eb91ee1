use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use cn_core::ANONYMOUS_ACTOR;

/// Caller identity lifted off the request. The cookie/session machinery that
/// would normally produce this lives outside the core — handlers only see
/// the resolved identity.
#[derive(Clone, Debug)]
pub struct RequestIdentity {
    pub actor_id: String,
}

impl RequestIdentity {
    pub fn is_anonymous(&self) -> bool {
        self.actor_id == ANONYMOUS_ACTOR
    }
}

/// Attach a [`RequestIdentity`] extension from the `x-user-id` header,
/// defaulting to the anonymous sentinel.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let actor_id = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_ACTOR)
        .to_string();

    request
        .extensions_mut()
        .insert(RequestIdentity { actor_id });
    next.run(request).await
}

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use music_machine_core::SessionId;
use tracing::warn;

use crate::http_server::AppError;

pub const SESSION_COOKIE: &str = "session_id";

/// Build the cookie signing key from the configured secret.
///
/// Without a secret a random key is generated, so sessions do not survive a
/// restart (neither do the sequences they point at).
pub fn session_key(secret: Option<&str>) -> anyhow::Result<Key> {
    match secret {
        Some(secret) => Key::try_from(secret.as_bytes())
            .map_err(|_| anyhow!("secret key must be at least 64 bytes long")),
        None => {
            warn!("No secret key configured, signing session cookies with a random key");
            Ok(Key::generate())
        }
    }
}

pub fn session_from_jar(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .map(SessionId::new)
}

/// Returns the caller's session, adding a fresh session cookie to `jar` if it had none.
pub fn ensure_session(jar: SignedCookieJar) -> (SignedCookieJar, SessionId, bool) {
    if let Some(session_id) = session_from_jar(&jar) {
        return (jar, session_id, false);
    }

    let session_id = SessionId::generate();
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session_id, true)
}

/// Extractor for endpoints that only work inside a session.
pub struct CurrentSession(pub SessionId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = match SignedCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        session_from_jar(&jar)
            .map(CurrentSession)
            .ok_or(AppError::MissingSession)
    }
}

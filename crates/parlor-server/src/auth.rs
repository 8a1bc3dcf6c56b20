//! Bearer-token resolution.
//!
//! Tokens are issued elsewhere; this server only maps a presented token to
//! the [`Principal`] it stands for.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use parlor_shared::Principal;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::error::ServerError;

/// Known tokens and the principals they authenticate.
#[derive(Default)]
pub struct PrincipalDirectory {
    entries: Vec<(String, Principal)>,
}

impl PrincipalDirectory {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Principal)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Load a JSON object of `token -> principal`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let map: HashMap<String, Principal> = serde_json::from_str(&raw)?;
        Ok(Self::from_entries(map))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare against every entry in constant time per entry so response
    /// timing does not reveal which prefix matched.
    pub fn resolve(&self, token: &str) -> Option<&Principal> {
        let presented = token.as_bytes();
        let mut found = None;
        for (known, principal) in &self.entries {
            let known = known.as_bytes();
            if known.len() == presented.len() && known.ct_eq(presented).unwrap_u8() == 1 {
                found = Some(principal);
            }
        }
        found
    }

    /// Resolve from an `Authorization: Bearer` header, falling back to a
    /// token passed out of band (the socket handshake query string).
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        fallback: Option<&str>,
    ) -> Result<Principal, ServerError> {
        let token = bearer_token(headers)
            .or(fallback)
            .filter(|t| !t.is_empty())
            .ok_or(ServerError::Unauthorized)?;

        self.resolve(token).cloned().ok_or_else(|| {
            tracing::debug!("Rejected unknown bearer token");
            ServerError::Unauthorized
        })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Extractor for routes that require an authenticated caller.
pub struct AuthPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .principals
            .authenticate(&parts.headers, None)
            .map(AuthPrincipal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use parlor_shared::UserId;

    fn directory() -> (PrincipalDirectory, Principal) {
        let principal = Principal::new(UserId::new());
        let dir = PrincipalDirectory::from_entries([("secret-token".to_string(), principal.clone())]);
        (dir, principal)
    }

    #[test]
    fn test_resolves_exact_token_only() {
        let (dir, principal) = directory();
        assert_eq!(dir.resolve("secret-token"), Some(&principal));
        assert_eq!(dir.resolve("secret-toke"), None);
        assert_eq!(dir.resolve("secret-tokens"), None);
    }

    #[test]
    fn test_header_wins_over_fallback() {
        let (dir, principal) = directory();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer secret-token"),
        );
        assert_eq!(dir.authenticate(&headers, Some("wrong")).unwrap(), principal);
    }

    #[test]
    fn test_query_fallback_and_missing_token() {
        let (dir, principal) = directory();
        let headers = HeaderMap::new();
        assert_eq!(
            dir.authenticate(&headers, Some("secret-token")).unwrap(),
            principal
        );
        assert!(matches!(
            dir.authenticate(&headers, None),
            Err(ServerError::Unauthorized)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("principals.json");
        let id = UserId::new();
        std::fs::write(
            &path,
            format!(r#"{{"tok": {{"id": "{id}", "permissions": ["chat.manage"]}}}}"#),
        )
        .unwrap();

        let directory = PrincipalDirectory::load(&path).unwrap();
        assert_eq!(directory.len(), 1);
        let principal = directory.resolve("tok").unwrap();
        assert_eq!(principal.id, id);
        assert!(principal.has_permission("chat.manage"));
    }
}

//! Identity-provider seam and best-effort display enrichment.
//!
//! Token verification and user lookup are collaborator concerns. The core
//! only needs a verified uid and, cosmetically, a display name; every lookup
//! is timeout-guarded and degrades to a shortened uid.

use futures::future::BoxFuture;
use tokio::time::timeout;
use tracing::warn;

use crate::state::SharedState;

/// A caller whose bearer credential has been verified.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Stable user identifier.
    pub uid: String,
}

/// Profile data returned by the identity provider.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Stable user identifier.
    pub uid: String,
    /// Preferred display name, when the user set one.
    pub display_name: Option<String>,
    /// Account email, used as a display fallback.
    pub email: Option<String>,
}

/// External identity/auth collaborator.
///
/// Both calls are treated as potentially slow or failing; `None` means the
/// credential or user could not be resolved.
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer credential and return the caller it belongs to.
    fn verify_token(&self, token: &str) -> BoxFuture<'static, Option<AuthUser>>;
    /// Look up profile data for a uid.
    fn lookup_user(&self, uid: &str) -> BoxFuture<'static, Option<UserProfile>>;
}

/// Development identity provider: the bearer token IS the uid.
///
/// Stands in for a real verifier in local runs and tests; no profile data.
pub struct PassthroughIdentity;

impl IdentityProvider for PassthroughIdentity {
    fn verify_token(&self, token: &str) -> BoxFuture<'static, Option<AuthUser>> {
        let token = token.trim().to_owned();
        Box::pin(async move {
            if token.is_empty() {
                None
            } else {
                Some(AuthUser { uid: token })
            }
        })
    }

    fn lookup_user(&self, _uid: &str) -> BoxFuture<'static, Option<UserProfile>> {
        Box::pin(async { None })
    }
}

/// Resolve a bearer credential to a verified caller.
///
/// With no provider installed (tests, bare local runs) the token itself is
/// taken as the uid, matching [`PassthroughIdentity`].
pub async fn authenticate(
    state: &SharedState,
    token: &str,
) -> Result<AuthUser, crate::error::ServiceError> {
    use crate::error::ServiceError;

    let token = token.trim();
    if token.is_empty() {
        return Err(ServiceError::Unauthorized("missing bearer token".into()));
    }

    match state.identity().await {
        Some(provider) => provider
            .verify_token(token)
            .await
            .ok_or_else(|| ServiceError::Unauthorized("invalid bearer token".into())),
        None => Ok(AuthUser {
            uid: token.to_owned(),
        }),
    }
}

/// Shortened uid used wherever a display name cannot be resolved.
pub fn short_uid(uid: &str) -> String {
    if uid.len() <= 8 {
        uid.to_owned()
    } else {
        let prefix: String = uid.chars().take(8).collect();
        format!("{prefix}...")
    }
}

/// Resolve a display string for a uid, falling back to [`short_uid`].
///
/// The lookup runs under the configured enrichment timeout so a slow
/// identity provider can never stall a listing response.
pub async fn display_name(state: &SharedState, uid: &str) -> String {
    let fallback = short_uid(uid);

    let Some(provider) = state.identity().await else {
        return fallback;
    };

    let lookup = provider.lookup_user(uid);
    match timeout(state.config().enrichment_timeout, lookup).await {
        Ok(Some(profile)) => profile
            .display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                profile
                    .email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_owned)
            })
            .unwrap_or(fallback),
        Ok(None) => fallback,
        Err(_) => {
            warn!(uid, "display-name lookup timed out");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uid_truncates_long_identifiers() {
        assert_eq!(short_uid("abcdefghijkl"), "abcdefgh...");
        assert_eq!(short_uid("abc"), "abc");
        assert_eq!(short_uid("abcdefgh"), "abcdefgh");
    }

    #[tokio::test]
    async fn passthrough_accepts_non_empty_tokens() {
        let provider = PassthroughIdentity;
        let user = provider.verify_token("uid-alice").await.unwrap();
        assert_eq!(user.uid, "uid-alice");
        assert!(provider.verify_token("   ").await.is_none());
    }
}

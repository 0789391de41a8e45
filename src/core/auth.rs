//! Authentication for the entity API
//!
//! Handlers never read credentials themselves: they ask an [`AuthVerifier`]
//! for an [`AuthContext`] and take the organization from it.

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::{AuthConfig, TokenGrant};
use crate::core::error::{HeraError, HeraResult};

/// Header carrying the organization in development mode
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    /// Authenticated user
    User {
        user_id: Uuid,
        organization_id: Uuid,
        roles: Vec<String>,
    },

    /// Trusted caller identified by a header instead of a token
    Service {
        service_name: String,
        organization_id: Uuid,
    },

    /// No credentials
    Anonymous,
}

impl AuthContext {
    /// Get the organization from the context if available
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User {
                organization_id, ..
            } => Some(*organization_id),
            AuthContext::Service {
                organization_id, ..
            } => Some(*organization_id),
            AuthContext::Anonymous => None,
        }
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    /// The organization, or 401 for anonymous callers
    pub fn require_organization(&self) -> HeraResult<Uuid> {
        self.organization_id().ok_or_else(|| {
            HeraError::Unauthorized("a bearer token or organization is required".to_string())
        })
    }
}

/// Verifies request credentials
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Extract the auth context from request headers
    ///
    /// Missing credentials yield `Anonymous`; credentials that are present
    /// but invalid are an error.
    async fn verify(&self, headers: &HeaderMap) -> HeraResult<AuthContext>;
}

/// Verifier backed by a fixed token table from configuration
pub struct StaticTokenVerifier {
    tokens: HashMap<String, TokenGrant>,
    allow_org_header: bool,
}

impl StaticTokenVerifier {
    pub fn new(grants: impl IntoIterator<Item = TokenGrant>, allow_org_header: bool) -> Self {
        Self {
            tokens: grants
                .into_iter()
                .map(|grant| (grant.token.clone(), grant))
                .collect(),
            allow_org_header,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.iter().cloned(), config.allow_org_header)
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, headers: &HeaderMap) -> HeraResult<AuthContext> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .ok_or_else(|| HeraError::Unauthorized("malformed Authorization header".into()))?;

            let grant = self
                .tokens
                .get(token)
                .ok_or_else(|| HeraError::Unauthorized("invalid or expired token".into()))?;

            return Ok(AuthContext::User {
                user_id: grant.user_id,
                organization_id: grant.organization_id,
                roles: grant.roles.clone(),
            });
        }

        if self.allow_org_header {
            if let Some(value) = headers.get(ORGANIZATION_HEADER) {
                let raw = value.to_str().unwrap_or_default();
                let organization_id = Uuid::parse_str(raw).map_err(|_| {
                    HeraError::Unauthorized(format!("invalid organization header: {}", raw))
                })?;
                return Ok(AuthContext::Service {
                    service_name: "org-header".to_string(),
                    organization_id,
                });
            }
        }

        Ok(AuthContext::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn grant(org: Uuid) -> TokenGrant {
        TokenGrant {
            token: "secret-token".to_string(),
            user_id: Uuid::new_v4(),
            organization_id: org,
            roles: vec!["admin".to_string()],
        }
    }

    #[tokio::test]
    async fn test_valid_bearer_token() {
        let org = Uuid::new_v4();
        let verifier = StaticTokenVerifier::new([grant(org)], false);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));

        let ctx = verifier.verify(&headers).await.unwrap();
        assert_eq!(ctx.organization_id(), Some(org));
        assert!(ctx.user_id().is_some());
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let verifier = StaticTokenVerifier::new([grant(Uuid::new_v4())], false);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer nope"));

        let err = verifier.verify(&headers).await.unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_org_header_only_when_allowed() {
        let org = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            ORGANIZATION_HEADER,
            HeaderValue::from_str(&org.to_string()).unwrap(),
        );

        let strict = StaticTokenVerifier::new(Vec::new(), false);
        let ctx = strict.verify(&headers).await.unwrap();
        assert_eq!(ctx, AuthContext::Anonymous);
        assert!(ctx.require_organization().is_err());

        let lenient = StaticTokenVerifier::new(Vec::new(), true);
        let ctx = lenient.verify(&headers).await.unwrap();
        assert_eq!(ctx.require_organization().unwrap(), org);
    }
}

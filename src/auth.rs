//! Caller identities.
//!
//! An identity is produced outside this crate (a token issued by whatever
//! signs users in). Here a token is either carried by a CLI caller or looked
//! up in the server's token table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An authenticated owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Identity used by CLI commands, plus the token sent to the callable endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl IdentityConfig {
    /// Apply `RECEIPT_TOKEN`, `RECEIPT_USER_ID` and `RECEIPT_USER_EMAIL`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("RECEIPT_TOKEN") {
            self.token = Some(val);
        }
        if let Ok(val) = std::env::var("RECEIPT_USER_ID") {
            self.user_id = Some(val);
        }
        if let Ok(val) = std::env::var("RECEIPT_USER_EMAIL") {
            self.email = Some(val);
        }
        self
    }

    /// The configured identity, if a user id is set.
    pub fn identity(&self) -> Option<Identity> {
        self.user_id
            .as_ref()
            .map(|id| Identity::new(id.clone(), self.email.clone().unwrap_or_default()))
    }
}

/// Server-side mapping from bearer tokens to identities.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Identity>,
}

impl TokenRegistry {
    pub fn new(tokens: HashMap<String, Identity>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn resolve(&self, token: &str) -> Option<&Identity> {
        self.tokens.get(token)
    }

    /// Resolve an `Authorization` header value of the form `Bearer <token>`.
    pub fn resolve_bearer(&self, header: &str) -> Option<&Identity> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        self.resolve(token)
    }
}

//! The authenticated session: bearer token plus the claims read from it.
//!
//! A `Session` only exists while its token decodes. It is built explicitly
//! from a fresh login or from what the host persisted, and it ends when the
//! owning `App` drops it.

use serde::{Deserialize, Serialize};

use crate::token::{decode_claims, Claims};

/// Distinguishes successive sessions so late replies can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// What the host keeps in durable storage between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    token: String,
    username: String,
    claims: Claims,
}

impl Session {
    /// Returns `None` when the token carries no readable claims.
    ///
    /// The display name prefers `username` (what the user typed at login) and
    /// falls back to the token's own `username` claim.
    pub fn establish(id: SessionId, token: String, username: Option<String>) -> Option<Self> {
        let claims = decode_claims(&token)?;
        let username = username
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| claims.username.clone());
        Some(Self {
            id,
            token,
            username,
            claims,
        })
    }

    pub fn restore(id: SessionId, persisted: PersistedSession) -> Option<Self> {
        Self::establish(id, persisted.token, persisted.username)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            token: self.token.clone(),
            username: Some(self.username.clone()).filter(|name| !name.is_empty()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    /// An unsigned token whose payload carries `exp` and `username`.
    pub fn token(exp: i64, username: &str) -> String {
        let payload = serde_json::json!({ "exp": exp, "username": username });
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }
}

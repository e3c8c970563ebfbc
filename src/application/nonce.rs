//! Short-lived, action-bound tokens proving a request came from a rendered page.

use std::{sync::Arc, time::Duration};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

/// Action the player widget's tokens are bound to.
pub const SYNTHESIS_NONCE_ACTION: &str = "melo_tts_nonce";

/// Action the admin settings form's tokens are bound to.
pub const SETTINGS_NONCE_ACTION: &str = "melo_tts_options";

const TOKEN_HEX_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    #[error("missing security token")]
    Missing,
    #[error("invalid or expired security token")]
    Invalid,
}

/// Which half of the validity window a verified token was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    Current,
    Previous,
}

/// Issues and verifies tokens derived from a server secret, the action name and a
/// time tick. A token stays valid for between one half and one full `lifetime`.
#[derive(Clone)]
pub struct NonceService {
    secret: Arc<[u8]>,
    half_life_secs: i64,
}

impl NonceService {
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        let half_life_secs = i64::try_from(lifetime.as_secs() / 2)
            .unwrap_or(i64::MAX)
            .max(1);
        Self {
            secret: Arc::from(secret.as_ref()),
            half_life_secs,
        }
    }

    pub fn issue(&self, action: &str) -> String {
        self.issue_at(action, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, action: &str, now: OffsetDateTime) -> String {
        self.token_for(action, self.tick(now))
    }

    pub fn verify(&self, action: &str, token: &str) -> Result<NonceAge, NonceError> {
        self.verify_at(action, token, OffsetDateTime::now_utc())
    }

    pub fn verify_at(
        &self,
        action: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<NonceAge, NonceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(NonceError::Missing);
        }

        let tick = self.tick(now);
        if matches_token(token, &self.token_for(action, tick)) {
            return Ok(NonceAge::Current);
        }
        if matches_token(token, &self.token_for(action, tick - 1)) {
            return Ok(NonceAge::Previous);
        }
        Err(NonceError::Invalid)
    }

    fn tick(&self, now: OffsetDateTime) -> i64 {
        now.unix_timestamp().div_euclid(self.half_life_secs) + 1
    }

    fn token_for(&self, action: &str, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret[..]);
        hasher.update(b"|");
        hasher.update(tick.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        let mut token = hex::encode(hasher.finalize());
        token.truncate(TOKEN_HEX_LEN);
        token
    }
}

fn matches_token(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

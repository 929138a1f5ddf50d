use chrono::{DateTime, Duration, Utc};

use crate::auth::refresh_token::{hash_token, random_token};

const RESET_TOKEN_LENGTH: usize = 48;

/// Out-of-band password reset token. The plaintext is emailed to the user;
/// only `token_hash()` is stored.
#[derive(Clone, Debug)]
pub struct ResetToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            token: random_token(RESET_TOKEN_LENGTH),
            expires_at: Utc::now() + Duration::seconds(expiry_seconds),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_hash(&self) -> String {
        hash_token(&self.token)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Link the user follows to pick a new password
    pub fn reset_link(&self, base_url: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            base_url.trim_end_matches('/'),
            self.token
        )
    }
}

use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Claim set carried inside an access token.
///
/// `sub` holds the user identifier, `role` is carried for future use and
/// never consulted for access control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Role of the subject at issuance time
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims for a subject with automatic expiration.
    ///
    /// # Arguments
    /// * `subject` - Unique user identifier
    /// * `role` - Role to carry in the token
    /// * `ttl_hours` - Hours until the token expires
    ///
    /// # Returns
    /// Claims with sub, role, iat, and exp set
    pub fn for_subject(subject: impl ToString, role: impl Into<String>, ttl_hours: i64) -> Self {
        let now = Utc::now();
        let expiration = now + Duration::hours(ttl_hours);

        Self {
            sub: subject.to_string(),
            role: role.into(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }
}

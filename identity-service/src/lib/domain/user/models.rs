use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::user::errors::DisplayNameError;
use crate::user::errors::EmailError;
use crate::user::errors::PasswordPolicyError;
use crate::user::errors::UserIdError;

/// User aggregate entity.
///
/// Represents a registered account. The password is only ever held as an
/// Argon2 hash; a set `deleted_at` marks the record as soft-deleted and
/// excludes it from all active lookups.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub name: DisplayName,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Role assigned at registration. Carried in tokens and responses but
    /// not consulted for access control.
    pub const DEFAULT_ROLE: &'static str = "user";

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Arguments
    /// * `s` - UUID string to parse
    ///
    /// # Returns
    /// Parsed UserId
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Arguments
    /// * `email` - Raw email string
    ///
    /// # Returns
    /// Validated EmailAddress value object
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display name value type
///
/// Ensures the name is non-blank and within length bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    const MAX_LENGTH: usize = 100;

    /// Create a new valid display name.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Arguments
    /// * `name` - Raw display name string
    ///
    /// # Returns
    /// Validated DisplayName value object
    ///
    /// # Errors
    /// * `Empty` - Name is empty or whitespace-only
    /// * `TooLong` - Name longer than 100 characters
    pub fn new(name: String) -> Result<Self, DisplayNameError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DisplayNameError::Empty);
        }
        if name.len() > Self::MAX_LENGTH {
            return Err(DisplayNameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: name.len(),
            });
        }
        Ok(Self(name))
    }

    /// Get name as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plaintext password submitted at registration.
///
/// Exists only for the duration of the call; never persisted, and its
/// Debug output is redacted so it cannot reach a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 6;

    /// Create a password after checking the minimum policy.
    ///
    /// # Arguments
    /// * `password` - Raw plaintext password
    ///
    /// # Returns
    /// Validated Password value object
    ///
    /// # Errors
    /// * `TooShort` - Password shorter than 6 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        if password.len() < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: password.len(),
            });
        }
        Ok(Self(password))
    }

    /// Get the plaintext for hashing or verification.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Command to register a new user with domain types
#[derive(Debug)]
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub name: DisplayName,
    pub password: Password,
}

impl RegisterCommand {
    /// Construct a new register command.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `name` - Validated display name
    /// * `password` - Policy-checked plaintext password (hashed by the service)
    ///
    /// # Returns
    /// RegisterCommand with validated fields
    pub fn new(email: EmailAddress, name: DisplayName, password: Password) -> Self {
        Self {
            email,
            name,
            password,
        }
    }
}

/// User and freshly issued access token, returned by register and login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Identity resolved from a verified access token.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: UserId,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_trims_and_rejects_blank() {
        let name = DisplayName::new("  Ann  ".to_string()).unwrap();
        assert_eq!(name.as_str(), "Ann");

        assert!(matches!(
            DisplayName::new("   ".to_string()),
            Err(DisplayNameError::Empty)
        ));
    }

    #[test]
    fn test_password_minimum_length() {
        assert!(Password::new("secret1".to_string()).is_ok());
        assert!(matches!(
            Password::new("12345".to_string()),
            Err(PasswordPolicyError::TooShort { min: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("super_secret".to_string()).unwrap();
        let debug = format!("{:?}", password);
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn test_user_id_round_trip() {
        let id = UserId::new();
        let parsed = UserId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(UserId::from_string("not-a-uuid").is_err());
    }
}

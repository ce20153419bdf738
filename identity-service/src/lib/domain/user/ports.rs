use async_trait::async_trait;

use crate::domain::user::models::AuthSession;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::TokenIdentity;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::AuthError;

/// Port for the authentication core.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Register a new user and issue an access token.
    ///
    /// # Arguments
    /// * `command` - Validated command containing email, name, and password
    ///
    /// # Returns
    /// Created user plus a freshly issued token
    ///
    /// # Errors
    /// * `EmailTaken` - An active user already holds the email
    /// * `Hashing` - Password hashing failed
    /// * `TokenSigning` - Token issuance failed
    /// * `DatabaseError` - Storage operation failed
    async fn register(&self, command: RegisterCommand) -> Result<AuthSession, AuthError>;

    /// Verify credentials and issue an access token.
    ///
    /// Unknown email, soft-deleted account, and wrong password all fail
    /// with the same error so responses cannot distinguish them.
    ///
    /// # Arguments
    /// * `email` - Submitted login email
    /// * `password` - Submitted plaintext password
    ///
    /// # Returns
    /// Matching user plus a freshly issued token
    ///
    /// # Errors
    /// * `InvalidCredentials` - No active user with matching credentials
    /// * `TokenSigning` - Token issuance failed
    /// * `DatabaseError` - Storage operation failed
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Resolve the identity carried by a bearer token.
    ///
    /// # Arguments
    /// * `token` - Raw token string from the Authorization header
    ///
    /// # Returns
    /// Identity encoded in the token's claims
    ///
    /// # Errors
    /// * `Unauthenticated` - Token is malformed, tampered with, or expired
    async fn authenticate(&self, token: &str) -> Result<TokenIdentity, AuthError>;

    /// Retrieve an active user by unique identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// User entity
    ///
    /// # Errors
    /// * `NotFound` - No active user with this id
    /// * `DatabaseError` - Storage operation failed
    async fn get_user(&self, id: &UserId) -> Result<User, AuthError>;
}

/// Persistence operations for the user directory.
///
/// Implementations must exclude soft-deleted rows from every find.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Arguments
    /// * `user` - User entity to create
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `EmailTaken` - Unique constraint on active emails was violated
    /// * `DatabaseError` - Storage operation failed
    async fn create(&self, user: User) -> Result<User, AuthError>;

    /// Retrieve an active user by email address.
    ///
    /// # Arguments
    /// * `email` - Email address string
    ///
    /// # Returns
    /// Optional user entity (None if not found or soft-deleted)
    ///
    /// # Errors
    /// * `DatabaseError` - Storage operation failed
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Retrieve an active user by identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// Optional user entity (None if not found or soft-deleted)
    ///
    /// # Errors
    /// * `DatabaseError` - Storage operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;
}

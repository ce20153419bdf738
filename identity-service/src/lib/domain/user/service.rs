use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use chrono::Utc;

use crate::domain::user::models::AuthSession;
use crate::domain::user::models::RegisterCommand;
use crate::domain::user::models::TokenIdentity;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::AuthError;
use crate::user::ports::AuthServicePort;
use crate::user::ports::UserRepository;

/// Authentication core.
///
/// Orchestrates the credential hasher, token issuer, and user directory
/// for register, login, and request authentication. Stateless per call;
/// the signing secret and token lifetime live in the shared Authenticator.
pub struct AuthService<R>
where
    R: UserRepository,
{
    repository: Arc<R>,
    authenticator: Arc<Authenticator>,
}

impl<R> AuthService<R>
where
    R: UserRepository,
{
    /// Create a new authentication service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User directory implementation
    /// * `authenticator` - Password hashing and token issuance coordinator
    ///
    /// # Returns
    /// Configured service instance
    pub fn new(repository: Arc<R>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }
}

#[async_trait]
impl<R> AuthServicePort for AuthService<R>
where
    R: UserRepository,
{
    async fn register(&self, command: RegisterCommand) -> Result<AuthSession, AuthError> {
        // Early check for the common case; the unique index on active
        // emails remains the authority.
        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self
            .authenticator
            .hash_password(command.password.as_str())
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user = User {
            id: UserId::new(),
            email: command.email,
            name: command.name,
            password_hash,
            role: User::DEFAULT_ROLE.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };

        // Concurrent registrations with the same email race here; the
        // loser gets EmailTaken from the repository.
        let user = self.repository.create(user).await?;

        let token = self
            .authenticator
            .issue_token(&user.id.to_string(), &user.role)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;

        tracing::info!(user_id = %user.id, "user registered");

        Ok(AuthSession { user, token })
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        // Absent and soft-deleted users are indistinguishable from a wrong
        // password in the returned error.
        let user = match self.repository.find_by_email(email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("login rejected: no active user for email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let result = self
            .authenticator
            .authenticate(password, &user.password_hash, &user.id.to_string(), &user.role)
            .map_err(|e| match e {
                AuthenticationError::InvalidCredentials => {
                    tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
                    AuthError::InvalidCredentials
                }
                AuthenticationError::JwtError(err) => AuthError::TokenSigning(err.to_string()),
            })?;

        Ok(AuthSession {
            user,
            token: result.access_token,
        })
    }

    async fn authenticate(&self, token: &str) -> Result<TokenIdentity, AuthError> {
        let claims = self.authenticator.validate_token(token).map_err(|e| {
            tracing::warn!("token validation failed: {}", e);
            AuthError::Unauthenticated
        })?;

        let user_id = UserId::from_string(&claims.sub).map_err(|e| {
            tracing::warn!("token subject is not a valid user id: {}", e);
            AuthError::Unauthenticated
        })?;

        Ok(TokenIdentity {
            user_id,
            role: claims.role,
        })
    }

    async fn get_user(&self, id: &UserId) -> Result<User, AuthError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;

    use super::*;
    use crate::domain::user::models::DisplayName;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::Password;

    const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, AuthError>;
            async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError>;
        }
    }

    fn test_authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(TEST_SECRET, 24))
    }

    fn test_user(authenticator: &Authenticator, password: &str) -> User {
        User {
            id: UserId::new(),
            email: EmailAddress::new("ann@example.com".to_string()).unwrap(),
            name: DisplayName::new("Ann".to_string()).unwrap(),
            password_hash: authenticator.hash_password(password).unwrap(),
            role: User::DEFAULT_ROLE.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn register_command() -> RegisterCommand {
        RegisterCommand {
            email: EmailAddress::new("ann@example.com".to_string()).unwrap(),
            name: DisplayName::new("Ann".to_string()).unwrap(),
            password: Password::new("secret1".to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_find_by_email()
            .withf(|email| email == "ann@example.com")
            .times(1)
            .returning(|_| Ok(None));

        repository
            .expect_create()
            .withf(|user| {
                user.email.as_str() == "ann@example.com"
                    && user.role == User::DEFAULT_ROLE
                    && user.deleted_at.is_none()
                    && user.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|user| Ok(user));

        let authenticator = test_authenticator();
        let service = AuthService::new(Arc::new(repository), Arc::clone(&authenticator));

        let session = service.register(register_command()).await.unwrap();

        assert_eq!(session.user.email.as_str(), "ann@example.com");
        assert!(!session.token.is_empty());

        // Token subject carries the new user's id
        let claims = authenticator.validate_token(&session.token).unwrap();
        assert_eq!(claims.sub, session.user.id.to_string());
        assert_eq!(claims.role, User::DEFAULT_ROLE);
    }

    #[tokio::test]
    async fn test_register_email_taken() {
        let mut repository = MockTestUserRepository::new();

        let authenticator = test_authenticator();
        let existing = test_user(&authenticator, "secret1");
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        repository.expect_create().times(0);

        let service = AuthService::new(Arc::new(repository), authenticator);

        let result = service.register(register_command()).await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_register_loses_uniqueness_race() {
        let mut repository = MockTestUserRepository::new();

        // The pre-check sees no user, but a concurrent registration wins
        // the write and the unique index rejects ours.
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        repository
            .expect_create()
            .times(1)
            .returning(|_| Err(AuthError::EmailTaken));

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.register(register_command()).await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut repository = MockTestUserRepository::new();

        let authenticator = test_authenticator();
        let user = test_user(&authenticator, "secret1");
        let user_id = user.id;

        repository
            .expect_find_by_email()
            .withf(|email| email == "ann@example.com")
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = AuthService::new(Arc::new(repository), Arc::clone(&authenticator));

        let session = service.login("ann@example.com", "secret1").await.unwrap();

        assert_eq!(session.user.id, user_id);
        let claims = authenticator.validate_token(&session.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut repository = MockTestUserRepository::new();

        let authenticator = test_authenticator();
        let user = test_user(&authenticator, "secret1");

        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = AuthService::new(Arc::new(repository), authenticator);

        let result = service.login("ann@example.com", "wrongpw").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_same_error_as_wrong_password() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.login("nobody@example.com", "secret1").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_valid_token() {
        let repository = MockTestUserRepository::new();
        let authenticator = test_authenticator();

        let user_id = UserId::new();
        let token = authenticator
            .issue_token(&user_id.to_string(), "user")
            .unwrap();

        let service = AuthService::new(Arc::new(repository), authenticator);

        let identity = service.authenticate(&token).await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, "user");
    }

    #[tokio::test]
    async fn test_authenticate_tampered_token() {
        let repository = MockTestUserRepository::new();

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.authenticate("not.a.token").await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token() {
        let repository = MockTestUserRepository::new();

        // Same secret, but every issued token is already lapsed
        let expired_issuer = Authenticator::new(TEST_SECRET, -1);
        let token = expired_issuer
            .issue_token(&UserId::new().to_string(), "user")
            .unwrap();

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.authenticate(&token).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_authenticate_foreign_secret_token() {
        let repository = MockTestUserRepository::new();

        let foreign = Authenticator::new(b"other-secret-key-also-32-bytes-long!!", 24);
        let token = foreign
            .issue_token(&UserId::new().to_string(), "user")
            .unwrap();

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.authenticate(&token).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_get_user_success() {
        let mut repository = MockTestUserRepository::new();

        let authenticator = test_authenticator();
        let user = test_user(&authenticator, "secret1");
        let user_id = user.id;

        repository
            .expect_find_by_id()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = AuthService::new(Arc::new(repository), authenticator);

        let found = service.get_user(&user_id).await.unwrap();
        assert_eq!(found.id, user_id);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(repository), test_authenticator());

        let result = service.get_user(&UserId::new()).await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }
}

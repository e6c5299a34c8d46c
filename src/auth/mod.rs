//! User registration, login and password changes.
//!
//! Passwords are stored as Argon2id PHC strings
//! (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`). The plain password never
//! reaches storage.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{User, UserRegistration};
use crate::storage::{CatalogStorage, StorageError};

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User with login '{0}' already exists")]
    LoginTaken(String),

    #[error("Unknown login '{0}'")]
    UnknownLogin(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Unknown user {0}")]
    UnknownUser(Uuid),

    /// A stored hash could not be parsed
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// Hashing parameters were rejected or hashing failed
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Password change payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_id: Uuid,
    pub new_password: String,
}

/// Argon2id password hasher.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with explicit Argon2 costs.
    ///
    /// # Arguments
    /// * `memory_kib` - Memory cost in KiB (at least 8)
    /// * `iterations` - Time cost (at least 1)
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if Argon2 rejects the parameters
    pub fn with_cost(memory_kib: u32, iterations: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if Argon2 fails
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Check a password against a PHC hash string.
    ///
    /// The costs encoded in the hash are used, so hashes made with other
    /// settings still verify.
    ///
    /// # Errors
    /// Returns `AuthError::MalformedHash` if `encoded` is not a valid hash
    pub fn verify(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed =
            PasswordHash::new(encoded).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::MalformedHash(e.to_string())),
        }
    }
}

/// User account operations on top of catalog storage.
pub struct AuthService<S>
where
    S: CatalogStorage + ?Sized,
{
    storage: Arc<S>,
    hasher: PasswordHasher,
}

impl<S> AuthService<S>
where
    S: CatalogStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, hasher: PasswordHasher) -> Self {
        Self { storage, hasher }
    }

    /// Register a new user.
    ///
    /// # Errors
    /// Returns `AuthError::LoginTaken` if the login is already registered
    pub async fn register_user(&self, registration: &UserRegistration) -> AuthResult<User> {
        if self
            .storage
            .get_user_by_login(&registration.login)
            .await?
            .is_some()
        {
            return Err(AuthError::LoginTaken(registration.login.clone()));
        }

        let user = User {
            id: Uuid::new_v4(),
            login: registration.login.clone(),
            password_hash: self.hasher.hash(&registration.password)?,
            email: registration.email.clone(),
            author_id: registration.author_id,
        };

        let user = match self.storage.insert_user(&user).await {
            Ok(user) => user,
            Err(StorageError::DuplicateEntry(_)) => {
                return Err(AuthError::LoginTaken(registration.login.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        info!("Registered user {}", user.login);
        Ok(user)
    }

    /// Look up a user by login.
    pub async fn get_user(&self, login: &str) -> AuthResult<User> {
        self.storage
            .get_user_by_login(login)
            .await?
            .ok_or_else(|| AuthError::UnknownLogin(login.to_string()))
    }

    /// Check credentials and return the user on success.
    ///
    /// # Errors
    /// Returns `AuthError::UnknownLogin` or `AuthError::InvalidPassword`
    pub async fn login(&self, request: &LoginRequest) -> AuthResult<User> {
        let user = self.get_user(&request.login).await?;
        if !self.hasher.verify(&request.password, &user.password_hash)? {
            debug!("Rejected password for {}", request.login);
            return Err(AuthError::InvalidPassword);
        }
        Ok(user)
    }

    /// Replace a user's password.
    ///
    /// # Errors
    /// Returns `AuthError::UnknownUser` if no user has the given ID
    pub async fn change_password(&self, request: &ChangePasswordRequest) -> AuthResult<User> {
        if self.storage.get_user_by_id(request.user_id).await?.is_none() {
            return Err(AuthError::UnknownUser(request.user_id));
        }

        let hash = self.hasher.hash(&request.new_password)?;
        match self.storage.update_password_hash(request.user_id, &hash).await {
            Ok(user) => {
                info!("Changed password for {}", user.login);
                Ok(user)
            }
            Err(StorageError::NotFound(_)) => Err(AuthError::UnknownUser(request.user_id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStorage;

    fn service() -> AuthService<SqliteStorage> {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        AuthService::new(storage, hasher())
    }

    fn registration(login: &str, password: &str) -> UserRegistration {
        UserRegistration {
            login: login.to_string(),
            email: format!("{}@example.org", login),
            password: password.to_string(),
            author_id: None,
        }
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_cost(8, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pw").unwrap(), hasher.hash("pw").unwrap());
    }

    #[test]
    fn test_verify_uses_stored_cost() {
        let hash = PasswordHasher::with_cost(16, 2).unwrap().hash("pw").unwrap();
        assert!(hash.contains("m=16,t=2"));
        assert!(hasher().verify("pw", &hash).unwrap());
    }

    #[test]
    fn test_invalid_cost_is_rejected() {
        assert!(matches!(
            PasswordHasher::with_cost(1, 1),
            Err(AuthError::Hashing(_))
        ));
    }

    #[test]
    fn test_verify_malformed_hash() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify("pw", "plaintext"),
            Err(AuthError::MalformedHash(_))
        ));
        assert!(matches!(
            hasher.verify("pw", "sha256$1$00$ff"),
            Err(AuthError::MalformedHash(_))
        ));
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let auth = service();
        let user = auth.register_user(&registration("ada", "secret")).await.unwrap();
        assert_ne!(user.password_hash, "secret");

        let logged_in = auth
            .login(&LoginRequest {
                login: "ada".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_register_rejects_taken_login() {
        let auth = service();
        auth.register_user(&registration("ada", "a")).await.unwrap();
        let result = auth.register_user(&registration("ada", "b")).await;
        assert!(matches!(result, Err(AuthError::LoginTaken(login)) if login == "ada"));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let auth = service();
        auth.register_user(&registration("ada", "secret")).await.unwrap();

        let unknown = auth
            .login(&LoginRequest {
                login: "bob".to_string(),
                password: "secret".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::UnknownLogin(_))));

        let wrong = auth
            .login(&LoginRequest {
                login: "ada".to_string(),
                password: "guess".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidPassword)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = service();
        let user = auth.register_user(&registration("ada", "old")).await.unwrap();

        auth.change_password(&ChangePasswordRequest {
            user_id: user.id,
            new_password: "new".to_string(),
        })
        .await
        .unwrap();

        let old = auth
            .login(&LoginRequest {
                login: "ada".to_string(),
                password: "old".to_string(),
            })
            .await;
        assert!(matches!(old, Err(AuthError::InvalidPassword)));
        assert!(auth
            .login(&LoginRequest {
                login: "ada".to_string(),
                password: "new".to_string(),
            })
            .await
            .is_ok());

        let missing = auth
            .change_password(&ChangePasswordRequest {
                user_id: Uuid::new_v4(),
                new_password: "x".to_string(),
            })
            .await;
        assert!(matches!(missing, Err(AuthError::UnknownUser(_))));
    }
}

use std::sync::Arc;

use tracing::{info, instrument};

use facturo_auth::{NewUser, PasswordHasher, User, UserChanges, validate_email, validate_user_name};
use facturo_core::{Clock, DomainError, Entity, UserId};

use crate::store::UserStore;

use super::{ServiceError, ServiceResult};

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Registration, credential checks and profile updates.
///
/// Password hashing runs on tokio's blocking pool.
pub struct UserService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email), err)]
    pub async fn register(&self, input: NewUser) -> ServiceResult<User> {
        validate_user_name(&input.name)?;
        validate_email(&input.email)?;
        self.ensure_email_free(&input.email).await?;

        let password_hash = self.hash(input.password).await?;
        let user = User::register(input.name, input.email, password_hash, self.clock.now())?;
        self.users.insert_user(&user).await?;

        info!(user_id = %user.id(), "user registered");
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    #[instrument(skip(self, email, password), err)]
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = user.password_hash().to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("password verification task failed: {e}")))??;

        if !matches {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.users
            .get_user(id)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    #[instrument(skip(self, changes), err)]
    pub async fn update_user(&self, id: UserId, changes: UserChanges) -> ServiceResult<User> {
        let mut user = self.get_user(id).await?;

        if let Some(email) = &changes.email {
            if email != user.email() {
                self.ensure_email_free(email).await?;
            }
        }

        let now = self.clock.now();
        user.apply(&changes, now)?;
        if let Some(password) = changes.password {
            let hash = self.hash(password).await?;
            user.set_password_hash(hash, now);
        }
        self.users.update_user(&user).await?;

        info!(user_id = %id, "user updated");
        Ok(user)
    }

    async fn ensure_email_free(&self, email: &str) -> ServiceResult<()> {
        if self.users.find_user_by_email(email).await?.is_some() {
            return Err(DomainError::conflict("a user with this email already exists").into());
        }
        Ok(())
    }

    async fn hash(&self, password: String) -> ServiceResult<String> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))??;
        Ok(hash)
    }
}

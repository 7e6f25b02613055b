//! User accounts.
//!
//! A user owns invoices and authenticates with email + password. The stored
//! password hash never leaves this type through serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use facturo_core::{DomainError, DomainResult, Entity, UserId};

const MIN_NAME_LEN: usize = 3;

pub fn validate_user_name(name: &str) -> DomainResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Same email rule as the HTTP validation layer (`validator`'s HTML5 check).
pub fn validate_email(email: &str) -> DomainResult<()> {
    if !email.validate_email() {
        return Err(DomainError::validation("email must be a valid email address"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    #[serde(skip_serializing)]
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Registration input. `password` is plain text and must be hashed before a
/// [`User`] is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// The public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn register(
        name: String,
        email: String,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut errors = Vec::new();
        if let Err(DomainError::Validation(mut m)) = validate_user_name(&name) {
            errors.append(&mut m);
        }
        if let Err(DomainError::Validation(mut m)) = validate_email(&email) {
            errors.append(&mut m);
        }
        if !errors.is_empty() {
            return Err(DomainError::validation_all(errors));
        }

        Ok(Self {
            id: UserId::new(),
            name,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(
        id: UserId,
        name: String,
        email: String,
        password_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            password_hash,
            created_at,
            updated_at,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Apply name/email changes. The password is handled separately through
    /// [`User::set_password_hash`] since it needs hashing first.
    pub fn apply(&mut self, changes: &UserChanges, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &changes.name {
            validate_user_name(name)?;
        }
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }

        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(email) = &changes.email {
            self.email = email.clone();
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_password_hash(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = now;
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

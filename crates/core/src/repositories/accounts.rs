//! User accounts and credentials.
//!
//! Passwords are stored as PBKDF2-SHA256 hashes in PHC string format with a random 16-byte salt.
//! The iteration count comes from [`crate::CoreConfig::password_rounds`]; hashes record their own
//! parameters, so raising it later does not invalidate existing accounts.

use crate::constants::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::models::{Account, Person, Role};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use secu_types::NonEmptyText;
use secu_uuid::RecordId;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Unvalidated registration request.
#[derive(Clone, Debug, Default)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub roles: Vec<Role>,
    pub person_id: Option<RecordId>,
}

#[derive(Clone, Debug)]
pub struct AccountService {
    store: Arc<RecordStore>,
    password_rounds: u32,
}

impl AccountService {
    pub fn new(store: Arc<RecordStore>, password_rounds: u32) -> Self {
        Self {
            store,
            password_rounds,
        }
    }

    /// Creates an account with an explicit role set.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if the username or password is out of bounds, or no role
    ///   is given
    /// - [`CoreError::NotFound`] if `person_id` names an unknown person
    /// - [`CoreError::Conflict`] if the username is taken (case-insensitive)
    pub fn register(&self, input: RegisterInput) -> CoreResult<Account> {
        let username = NonEmptyText::with_max_len(&input.username, MAX_USERNAME_LEN)
            .map_err(|e| CoreError::field("username", e))?;
        if username.as_str().chars().count() < MIN_USERNAME_LEN {
            return Err(CoreError::InvalidArgument(format!(
                "username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::InvalidArgument(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let roles: BTreeSet<Role> = input.roles.into_iter().collect();
        if roles.is_empty() {
            return Err(CoreError::InvalidArgument(
                "at least one role is required".into(),
            ));
        }
        if let Some(person_id) = &input.person_id {
            if !self.store.exists::<Person>(person_id)? {
                return Err(CoreError::not_found("person", person_id));
            }
        }

        let password_hash = hash_password(&input.password, self.password_rounds)?;
        let account = self.store.create(Account {
            id: RecordId::new(),
            username,
            password_hash,
            roles,
            person_id: input.person_id,
            created_at: Utc::now(),
            version: 0,
        })?;
        tracing::info!(
            "registered account '{}' with roles {:?}",
            account.username,
            account.roles
        );
        Ok(account)
    }

    /// Checks credentials.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidCredentials`] for an unknown user or a wrong password alike.
    pub fn authenticate(&self, username: &str, password: &str) -> CoreResult<Account> {
        let account = self
            .find_by_username(username)?
            .ok_or(CoreError::InvalidCredentials)?;
        if !verify_password(password, &account.password_hash)? {
            tracing::warn!("failed login for '{}'", account.username);
            return Err(CoreError::InvalidCredentials);
        }
        Ok(account)
    }

    /// Case-insensitive lookup.
    pub fn find_by_username(&self, username: &str) -> CoreResult<Option<Account>> {
        self.store
            .find_by_unique_key("username", &username.trim().to_lowercase())
    }

    pub fn count(&self) -> CoreResult<usize> {
        self.store.count::<Account>()
    }

    /// Creates an ADMIN account unless one already exists.
    ///
    /// Returns the new account, or `None` when an administrator was already present.
    pub fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> CoreResult<Option<Account>> {
        if self
            .store
            .find_one_where(|a: &Account| a.has_role(Role::Admin))?
            .is_some()
        {
            return Ok(None);
        }
        let account = self.register(RegisterInput {
            username: username.to_owned(),
            password: password.to_owned(),
            roles: vec![Role::Admin, Role::User],
            person_id: None,
        })?;
        Ok(Some(account))
    }
}

/// PBKDF2-SHA256 hash of `password` in PHC string format.
pub fn hash_password(password: &str, rounds: u32) -> CoreResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    let params = Params {
        rounds,
        output_length: 32,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// `false` on mismatch; an unparsable stored hash is an error.
pub fn verify_password(password: &str, stored: &str) -> CoreResult<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    match Pbkdf2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(pbkdf2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CoreError::PasswordHash(e.to_string())),
    }
}

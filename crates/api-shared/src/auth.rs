//! Stateless bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the username and the account's role set. Nothing is stored
//! server side: a token stays valid until it expires, and changing the secret invalidates every
//! outstanding token at once.
//!
//! The secret and lifetime are passed in explicitly through [`AuthConfig`]; this module never
//! reads the environment itself.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secu_core::models::{Account, Role};
use serde::{Deserialize, Serialize};

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Default token lifetime: one day.
pub const DEFAULT_EXPIRATION_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,
    #[error("invalid token expiration: {0}")]
    InvalidExpiration(String),
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Token signing configuration, validated at construction.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    expiration_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(secret: impl Into<Vec<u8>>, expiration_secs: u64) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::WeakSecret);
        }
        if expiration_secs == 0 {
            return Err(AuthError::InvalidExpiration(
                "must be greater than zero".into(),
            ));
        }
        Ok(Self {
            secret,
            expiration_secs,
        })
    }

    /// Builds the config from raw `JWT_SECRET` / `JWT_EXPIRATION_SECS` values.
    ///
    /// A missing secret is an error; a missing expiration falls back to
    /// [`DEFAULT_EXPIRATION_SECS`].
    pub fn from_env_values(
        secret: Option<String>,
        expiration_secs: Option<String>,
    ) -> Result<Self, AuthError> {
        let secret = secret
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::WeakSecret)?;
        let expiration_secs = match expiration_secs.map(|s| s.trim().to_owned()) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<u64>()
                .map_err(|e| AuthError::InvalidExpiration(format!("'{raw}': {e}")))?,
            _ => DEFAULT_EXPIRATION_SECS,
        };
        Self::new(secret.into_bytes(), expiration_secs)
    }

    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }
}

/// JWT payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }
}

/// Signs a token for `account`, valid for the configured lifetime from now.
pub fn issue_token(cfg: &AuthConfig, account: &Account) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: account.username.to_string(),
        roles: account.roles.iter().copied().collect(),
        iat: now,
        exp: now.saturating_add(i64::try_from(cfg.expiration_secs).unwrap_or(i64::MAX)),
    };
    sign(cfg, &claims)
}

/// Checks signature and expiry, returning the claims.
pub fn verify_token(cfg: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&cfg.secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::InvalidToken(e.to_string()),
    })
}

fn sign(cfg: &AuthConfig, claims: &Claims) -> Result<String, AuthError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(&cfg.secret),
    )
    .map_err(AuthError::Signing)
}

//! Account registration, password login and cookie sessions.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::forms::{FieldErrors, REQUIRED};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::users::{normalize_email, validate_password, validate_username};

const TOKEN_PREFIX: &str = "ys";
const MIN_SECRET_LEN: usize = 32;

pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid submission: {0}")]
    Validation(FieldErrors),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum SessionAuthError {
    #[error("invalid session token")]
    Invalid,
    #[error("expired session")]
    Expired,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    ttl: Duration,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, sessions: Arc<dyn SessionsRepo>, ttl: Duration) -> Self {
        Self {
            users,
            sessions,
            ttl,
        }
    }

    /// Register a new account and sign it in.
    pub async fn signup(&self, form: SignupForm) -> Result<IssuedSession, AccountError> {
        let mut errors = FieldErrors::new();

        let username = match validate_username(&form.username) {
            Ok(username) => Some(username),
            Err(err) => {
                errors.add(err.field(), err.message());
                None
            }
        };
        if let Some(username) = username.as_deref()
            && self.users.find_by_username(username).await?.is_some()
        {
            errors.add("username", USERNAME_TAKEN);
        }

        let email = normalize_email(&form.email).unwrap_or_else(|err| {
            errors.add(err.field(), err.message());
            String::new()
        });

        if form.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if form.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !form.password1.is_empty() && !form.password2.is_empty() {
            if form.password1 != form.password2 {
                errors.add("password2", PASSWORD_MISMATCH);
            } else if let Err(err) = validate_password(&form.password1) {
                errors.add(err.field(), err.message());
            }
        }

        let username = match username {
            Some(username) if errors.is_empty() => username,
            _ => return Err(AccountError::Validation(errors)),
        };

        let password_hash = hash_password_blocking(form.password1).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                email,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    let mut errors = FieldErrors::new();
                    errors.add("username", USERNAME_TAKEN);
                    AccountError::Validation(errors)
                }
                other => AccountError::Repo(other),
            })?;

        info!(target = "yatube::accounts", username = %user.username, "account created");
        self.start_session(&user).await
    }

    /// Check credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let user = match self.users.find_by_username(username.trim()).await? {
            Some(user) if !password.is_empty() => user,
            _ => return Err(invalid_login()),
        };

        let verified =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !verified {
            return Err(invalid_login());
        }

        self.start_session(&user).await
    }

    pub async fn start_session(&self, user: &UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.ttl;

        self.sessions
            .create_session(CreateSessionParams {
                prefix,
                hashed_secret: hash_secret(&secret),
                user_id: user.id,
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            user: user.clone(),
            token,
            expires_at,
        })
    }

    /// Resolve the user behind a session cookie value.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, SessionAuthError> {
        let parsed = parse_token(token).ok_or(SessionAuthError::Invalid)?;
        let record = self
            .sessions
            .find_by_prefix(parsed.prefix)
            .await?
            .ok_or(SessionAuthError::Invalid)?;

        if record.expires_at <= OffsetDateTime::now_utc() {
            return Err(SessionAuthError::Expired);
        }

        let hashed_input = hash_secret(parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionAuthError::Invalid);
        }

        self.users
            .find_by_id(record.user_id)
            .await?
            .ok_or(SessionAuthError::Invalid)
    }

    /// Revoke the session named by `token`. Unknown or malformed tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_session(parsed.prefix).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AccountError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|err| AccountError::Hashing(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AccountError::Hashing(err.to_string())),
    }
}

async fn hash_password_blocking(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| AccountError::Hashing(err.to_string()))?
}

fn invalid_login() -> AccountError {
    let mut errors = FieldErrors::new();
    errors.add_non_field(INVALID_LOGIN);
    AccountError::Validation(errors)
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}

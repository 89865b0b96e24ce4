//! Account sign-up, login and session checks over the `users` collection.
//!
//! Passwords are kept as `hmac-sha256$<rounds>$<salt>$<digest>` strings: the digest is
//! HMAC-SHA256 keyed with a random salt, iterated `rounds` times.

use crate::db::CatalogStore;
use crate::error::StoreError;
use crate::models::{Role, User, UserStatus};
use crate::repository::Repository;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::{info, warn};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "hmac-sha256";
const SALT_LEN: usize = 16;
pub const DEFAULT_ROUNDS: u32 = 10_000;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Sessions expire this long after login.
pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Account no longer exists")]
    UnknownAccount,

    #[error("Malformed password hash")]
    MalformedHash,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

fn keyed(salt: &[u8]) -> AuthResult<HmacSha256> {
    HmacSha256::new_from_slice(salt).map_err(|_| AuthError::MalformedHash)
}

/// Runs all rounds but the last; the caller finishes with `finalize` or `verify_slice`.
fn stretch(salt: &[u8], password: &str, rounds: u32) -> AuthResult<HmacSha256> {
    let mut mac = keyed(salt)?;
    mac.update(password.as_bytes());
    for _ in 1..rounds {
        let digest = mac.finalize().into_bytes();
        mac = keyed(salt)?;
        mac.update(&digest);
    }
    Ok(mac)
}

pub fn hash_password(password: &str) -> AuthResult<String> {
    hash_password_with_rounds(password, DEFAULT_ROUNDS)
}

pub fn hash_password_with_rounds(password: &str, rounds: u32) -> AuthResult<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let digest = stretch(&salt, password, rounds.max(1))?.finalize().into_bytes();
    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        rounds.max(1),
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Constant-time check of `password` against a stored hash.
pub fn verify_password(password: &str, stored: &str) -> AuthResult<bool> {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(rounds), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };

    let rounds: u32 = rounds.parse().map_err(|_| AuthError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| AuthError::MalformedHash)?;
    let digest = hex::decode(digest).map_err(|_| AuthError::MalformedHash)?;

    Ok(stretch(&salt, password, rounds.max(1))?
        .verify_slice(&digest)
        .is_ok())
}

/// Runs a hash or verify on the blocking pool; the rounds would otherwise stall the
/// runtime worker.
async fn off_runtime<T, F>(work: F) -> AuthResult<T>
where
    F: FnOnce() -> AuthResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Store(StoreError::Task(e)))?
}

pub(crate) async fn hash_in_background(password: String, rounds: u32) -> AuthResult<String> {
    off_runtime(move || hash_password_with_rounds(&password, rounds)).await
}

async fn verify_in_background(password: String, stored: String) -> AuthResult<bool> {
    off_runtime(move || verify_password(&password, &stored)).await
}

/// Sign-up form contents.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// A user without credentials, safe to hand to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<u64>,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub account: Account,
    pub login_time: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.account.role == Role::Admin
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.login_time > session_ttl()
    }
}

pub struct Authenticator {
    users: Repository<User>,
    rounds: u32,
}

impl Authenticator {
    pub fn new(store: &CatalogStore) -> Self {
        Self {
            users: store.repository(),
            rounds: DEFAULT_ROUNDS,
        }
    }

    /// Fewer hashing rounds; for tests and constrained devices.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    /// Creates a customer account. The unique email index decides duplicates, so two
    /// racing sign-ups for one address cannot both succeed.
    pub async fn sign_up(&self, form: NewAccount) -> AuthResult<Session> {
        if form.password != form.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        if form.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let mut user = User {
            id: None,
            name: form.name,
            email: form.email,
            password_hash: hash_in_background(form.password, self.rounds).await?,
            role: Role::Customer,
            status: UserStatus::Active,
            created_at: Some(Utc::now()),
        };

        let key = self.users.add(&user).await.map_err(|e| {
            if e.is_constraint_violation() {
                AuthError::EmailTaken
            } else {
                AuthError::Store(e)
            }
        })?;
        user.id = key.as_id();
        info!("Registered account {}", user.email);

        Ok(Session {
            account: user.into(),
            login_time: Utc::now(),
        })
    }

    /// Logs in any active account.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.authenticate(email, password, |user| user.status == UserStatus::Active)
            .await
    }

    /// Logs in an administrator; customers are rejected with the same error as a wrong
    /// password.
    pub async fn admin_login(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.authenticate(email, password, |user| user.role == Role::Admin)
            .await
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        allowed: impl Fn(&User) -> bool,
    ) -> AuthResult<Session> {
        for user in self.users.by_index("email", email).await? {
            if !allowed(&user) {
                continue;
            }
            if verify_in_background(password.to_string(), user.password_hash.clone()).await? {
                return Ok(Session {
                    account: user.into(),
                    login_time: Utc::now(),
                });
            }
        }
        warn!("Failed login for {}", email);
        Err(AuthError::InvalidCredentials)
    }

    /// A session stays valid for 24 hours and only while its account still exists.
    pub async fn validate(&self, session: &Session, now: DateTime<Utc>) -> AuthResult<Account> {
        if session.is_expired(now) {
            return Err(AuthError::SessionExpired);
        }
        self.users
            .by_index("email", session.account.email.as_str())
            .await?
            .into_iter()
            .next()
            .map(Account::from)
            .ok_or(AuthError::UnknownAccount)
    }
}

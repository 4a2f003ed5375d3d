//! Identity provider: sign up, log in, log out, password reset and the
//! persisted session.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthAction, AuthError, AuthErrorCode, ValidationError};
use crate::store::write_json_atomic;
use crate::task::OwnerId;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks run before a log in reaches the provider.
pub fn validate_log_in(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !is_valid_email(email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Log-in checks plus the minimum password length.
pub fn validate_sign_up(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_log_in(email, password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub owner_id: OwnerId,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

pub trait IdentityProvider {
    /// Creates the account and signs it in.
    fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn log_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn log_out(&self) -> Result<(), AuthError>;

    fn reset_password(&self, email: &str) -> Result<(), AuthError>;

    /// The persisted session, if someone is signed in.
    fn current_session(&self) -> Option<Session>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    email: String,
    owner_id: OwnerId,
    password_hash: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    failed_attempts: u32,
    #[serde(default)]
    reset_requested_at: Option<DateTime<Utc>>,
}

/// File-backed provider: `accounts.json` holds argon2 hashes, `session.json`
/// the signed-in user.
pub struct LocalIdentityProvider {
    accounts_path: PathBuf,
    session_path: PathBuf,
    max_login_attempts: u32,
    hasher: Argon2<'static>,
}

impl LocalIdentityProvider {
    pub fn new(dir: &Path, max_login_attempts: u32) -> Self {
        Self {
            accounts_path: dir.join("accounts.json"),
            session_path: dir.join("session.json"),
            max_login_attempts,
            hasher: Argon2::default(),
        }
    }

    /// Swaps the hashing cost, mostly so tests stay fast.
    pub fn with_hash_params(mut self, params: Params) -> Self {
        self.hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        self
    }

    fn load_accounts(&self, action: AuthAction) -> Result<Vec<Account>, AuthError> {
        if !self.accounts_path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.accounts_path).map_err(AuthError::io(action))?;
        serde_json::from_str(&data).map_err(AuthError::serialization(action))
    }

    fn save_accounts(&self, accounts: &[Account], action: AuthAction) -> Result<(), AuthError> {
        let data =
            serde_json::to_string_pretty(accounts).map_err(AuthError::serialization(action))?;
        write_json_atomic(&self.accounts_path, &data).map_err(AuthError::io(action))
    }

    fn start_session(&self, account: &Account, action: AuthAction) -> Result<Session, AuthError> {
        let session = Session {
            owner_id: account.owner_id.clone(),
            email: account.email.clone(),
            signed_in_at: Utc::now(),
        };
        let data =
            serde_json::to_string_pretty(&session).map_err(AuthError::serialization(action))?;
        write_json_atomic(&self.session_path, &data).map_err(AuthError::io(action))?;
        Ok(session)
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(hash_error)?;
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(hash_error)
    }

    fn verify_password(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .hasher
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                warn!(error = %err, "stored password hash is unreadable");
                false
            }
        }
    }
}

fn hash_error(err: argon2::password_hash::Error) -> AuthError {
    AuthError::provider(AuthAction::SignUp, AuthErrorCode::Other(err.to_string()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IdentityProvider for LocalIdentityProvider {
    fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_sign_up(email, password)?;
        let email = normalize_email(email);

        let mut accounts = self.load_accounts(AuthAction::SignUp)?;
        if accounts.iter().any(|a| a.email == email) {
            return Err(AuthError::provider(
                AuthAction::SignUp,
                AuthErrorCode::EmailAlreadyInUse,
            ));
        }

        let account = Account {
            email,
            owner_id: OwnerId::new(Uuid::new_v4().to_string()),
            password_hash: self.hash_password(password)?,
            disabled: false,
            failed_attempts: 0,
            reset_requested_at: None,
        };
        accounts.push(account.clone());
        self.save_accounts(&accounts, AuthAction::SignUp)?;
        info!(email = %account.email, owner = %account.owner_id, "account created");

        self.start_session(&account, AuthAction::SignUp)
    }

    fn log_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_log_in(email, password)?;
        let email = normalize_email(email);
        let fail = |code| AuthError::provider(AuthAction::LogIn, code);

        let mut accounts = self.load_accounts(AuthAction::LogIn)?;
        let Some(account) = accounts.iter_mut().find(|a| a.email == email) else {
            return Err(fail(AuthErrorCode::UserNotFound));
        };
        if account.disabled {
            return Err(fail(AuthErrorCode::UserDisabled));
        }
        if account.failed_attempts >= self.max_login_attempts {
            warn!(email = %email, "login blocked after repeated failures");
            return Err(fail(AuthErrorCode::TooManyRequests));
        }

        if !self.verify_password(password, &account.password_hash) {
            account.failed_attempts += 1;
            warn!(email = %email, attempts = account.failed_attempts, "wrong password");
            self.save_accounts(&accounts, AuthAction::LogIn)?;
            return Err(fail(AuthErrorCode::WrongPassword));
        }

        let account = if account.failed_attempts > 0 {
            account.failed_attempts = 0;
            let account = account.clone();
            self.save_accounts(&accounts, AuthAction::LogIn)?;
            account
        } else {
            account.clone()
        };
        info!(email = %account.email, "logged in");
        self.start_session(&account, AuthAction::LogIn)
    }

    fn log_out(&self) -> Result<(), AuthError> {
        if self.session_path.exists() {
            fs::remove_file(&self.session_path).map_err(AuthError::io(AuthAction::LogOut))?;
        }
        info!("logged out");
        Ok(())
    }

    fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        if !is_valid_email(email.trim()) {
            return Err(ValidationError::InvalidEmail.into());
        }
        let email = normalize_email(email);

        let mut accounts = self.load_accounts(AuthAction::ResetPassword)?;
        let Some(account) = accounts.iter_mut().find(|a| a.email == email) else {
            return Err(AuthError::provider(
                AuthAction::ResetPassword,
                AuthErrorCode::UserNotFound,
            ));
        };
        account.reset_requested_at = Some(Utc::now());
        account.failed_attempts = 0;
        self.save_accounts(&accounts, AuthAction::ResetPassword)?;
        info!(email = %email, "password reset requested");
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        let data = fs::read_to_string(&self.session_path).ok()?;
        match serde_json::from_str(&data) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable session file");
                None
            }
        }
    }
}

//! Error types for the task board.
//!
//! Three families mirror where a failure comes from: input rejected before
//! any backend call ([`ValidationError`]), the identity provider
//! ([`AuthError`]), and the task store ([`StoreError`]). None of them are
//! retried; the user re-initiates the action.

use std::fmt;

/// Input rejected locally, before a store or provider call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a task title")]
    EmptyTitle,

    #[error("Title is too long ({0} characters, max 100)")]
    TitleTooLong(usize),

    #[error("Description is too long ({0} characters, max 500)")]
    DescriptionTooLong(usize),

    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Unknown priority '{0}'")]
    UnknownPriority(String),

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),
}

/// Provider-side failure codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    UserNotFound,
    WrongPassword,
    InvalidEmail,
    UserDisabled,
    TooManyRequests,
    NetworkRequestFailed,
    EmailAlreadyInUse,
    WeakPassword,
    Other(String),
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            AuthErrorCode::UserNotFound => "user-not-found",
            AuthErrorCode::WrongPassword => "wrong-password",
            AuthErrorCode::InvalidEmail => "invalid-email",
            AuthErrorCode::UserDisabled => "user-disabled",
            AuthErrorCode::TooManyRequests => "too-many-requests",
            AuthErrorCode::NetworkRequestFailed => "network-request-failed",
            AuthErrorCode::EmailAlreadyInUse => "email-already-in-use",
            AuthErrorCode::WeakPassword => "weak-password",
            AuthErrorCode::Other(code) => code,
        };
        f.write_str(code)
    }
}

/// Which identity operation failed; selects the message table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    LogIn,
    SignUp,
    LogOut,
    ResetPassword,
}

impl AuthAction {
    fn fallback_message(self) -> &'static str {
        match self {
            AuthAction::LogIn => "An error occurred during login",
            AuthAction::SignUp => "An error occurred during sign up",
            AuthAction::LogOut => "Failed to logout. Please try again.",
            AuthAction::ResetPassword => "Failed to send password reset email",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{action:?} failed: {code}")]
    Provider { action: AuthAction, code: AuthErrorCode },

    #[error("{action:?} failed: identity storage error: {source}")]
    Io {
        action: AuthAction,
        #[source]
        source: std::io::Error,
    },

    #[error("{action:?} failed: identity storage is corrupt: {source}")]
    Serialization {
        action: AuthAction,
        #[source]
        source: serde_json::Error,
    },
}

impl AuthError {
    pub fn provider(action: AuthAction, code: AuthErrorCode) -> Self {
        AuthError::Provider { action, code }
    }

    /// For `map_err`: tags an I/O failure with the operation it broke.
    pub fn io(action: AuthAction) -> impl FnOnce(std::io::Error) -> Self {
        move |source| AuthError::Io { action, source }
    }

    pub fn serialization(action: AuthAction) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| AuthError::Serialization { action, source }
    }

    pub fn action(&self) -> Option<AuthAction> {
        match self {
            AuthError::Validation(_) => None,
            AuthError::Provider { action, .. }
            | AuthError::Io { action, .. }
            | AuthError::Serialization { action, .. } => Some(*action),
        }
    }

    pub fn code(&self) -> Option<&AuthErrorCode> {
        match self {
            AuthError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(err) => err.to_string(),
            AuthError::Provider { action, code } => provider_message(*action, code).to_string(),
            AuthError::Io { action, .. } | AuthError::Serialization { action, .. } => {
                action.fallback_message().to_string()
            }
        }
    }
}

fn provider_message(action: AuthAction, code: &AuthErrorCode) -> &'static str {
    use AuthErrorCode::*;

    if action == AuthAction::LogOut {
        return action.fallback_message();
    }

    // Password reset only distinguishes these two.
    if action == AuthAction::ResetPassword {
        return match code {
            UserNotFound => "No account found with this email address",
            InvalidEmail => "Please enter a valid email address",
            _ => action.fallback_message(),
        };
    }

    match code {
        UserNotFound => "No account found with this email address",
        WrongPassword => "Incorrect password",
        InvalidEmail => "Please enter a valid email address",
        UserDisabled => "This account has been disabled",
        TooManyRequests => "Too many failed attempts. Please try again later",
        NetworkRequestFailed => "Network error. Please check your connection",
        EmailAlreadyInUse => "An account with this email already exists",
        WeakPassword => "Password should be at least 6 characters",
        Other(_) => action.fallback_message(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not authenticated")]
    NotAuthenticated,

    #[error("task {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task storage is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Generic notice for the failed action; the detail goes to the log.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            StoreError::NotAuthenticated => "User not authenticated".to_string(),
            StoreError::Validation(err) => err.to_string(),
            _ => format!("Failed to {action}"),
        }
    }
}

/// Failures that end the `taskers` command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_messages_follow_the_table() {
        let err = AuthError::provider(AuthAction::LogIn, AuthErrorCode::WrongPassword);
        assert_eq!(err.user_message(), "Incorrect password");

        let err = AuthError::provider(AuthAction::LogIn, AuthErrorCode::TooManyRequests);
        assert_eq!(
            err.user_message(),
            "Too many failed attempts. Please try again later"
        );
    }

    #[test]
    fn unmapped_codes_use_the_action_default() {
        let code = AuthErrorCode::Other("internal-error".into());
        assert_eq!(
            AuthError::provider(AuthAction::LogIn, code.clone()).user_message(),
            "An error occurred during login"
        );
        assert_eq!(
            AuthError::provider(AuthAction::SignUp, code).user_message(),
            "An error occurred during sign up"
        );
    }

    #[test]
    fn reset_password_maps_only_two_codes() {
        let err = AuthError::provider(AuthAction::ResetPassword, AuthErrorCode::UserNotFound);
        assert_eq!(err.user_message(), "No account found with this email address");

        let err = AuthError::provider(AuthAction::ResetPassword, AuthErrorCode::TooManyRequests);
        assert_eq!(err.user_message(), "Failed to send password reset email");
    }

    #[test]
    fn validation_errors_surface_verbatim() {
        let err = AuthError::from(ValidationError::InvalidEmail);
        assert_eq!(err.user_message(), "Please enter a valid email address");
    }

    #[test]
    fn storage_failures_keep_their_action() {
        let gone = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            AuthError::io(AuthAction::LogOut)(gone()).user_message(),
            "Failed to logout. Please try again."
        );
        assert_eq!(
            AuthError::io(AuthAction::SignUp)(gone()).user_message(),
            "An error occurred during sign up"
        );
        let corrupt = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = AuthError::serialization(AuthAction::ResetPassword)(corrupt);
        assert_eq!(err.action(), Some(AuthAction::ResetPassword));
        assert_eq!(err.user_message(), "Failed to send password reset email");
    }

    #[test]
    fn log_out_always_uses_its_own_message() {
        let err = AuthError::provider(AuthAction::LogOut, AuthErrorCode::NetworkRequestFailed);
        assert_eq!(err.user_message(), "Failed to logout. Please try again.");
    }

    #[test]
    fn store_errors_are_generic_notices() {
        let err = StoreError::NotFound("abc".into());
        assert_eq!(err.user_message("delete task"), "Failed to delete task");
        assert_eq!(
            StoreError::NotAuthenticated.user_message("save task"),
            "User not authenticated"
        );
    }
}

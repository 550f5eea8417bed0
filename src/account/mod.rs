/// Account management system
///
/// Handles passcode signup/signin, passcode verification and Google
/// account linking.

mod manager;

pub use manager::AccountManager;

use crate::db::account::PublicProfile;
use serde::{Deserialize, Serialize};

/// Which entry path a passcode request comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMode {
    /// Email must not be registered yet; the account is created
    Signup,
    /// Email must already be registered; its passcode is replaced
    Signin,
}

/// Passcode request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRequest {
    pub email: Option<String>,
}

/// Passcode verification body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

/// Profile returned alongside a passcode login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub name: Option<String>,
}

/// Passcode login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: LoginUser,
}

/// Result of a successful passcode verification
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub token: String,
    pub profile: PublicProfile,
}

/// Identity asserted by Google after a successful sign-in
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    /// Stable Google subject id
    pub subject: String,
    pub email: String,
    /// Whether Google has confirmed the holder owns `email`
    pub email_verified: bool,
    pub name: Option<String>,
}

/// Account manager: passcode issuance and verification, Google linking
use crate::{
    account::{ChallengeMode, ExternalIdentity, VerifiedLogin},
    config::ServerConfig,
    db::{self, account::Account, account::PublicProfile},
    error::{NoteError, NoteResult},
    mailer::Notifier,
    session::SessionKeys,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

const ACCOUNT_COLUMNS: &str =
    "id, email, name, google_id, otp, otp_expires_at, created_at, updated_at";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    sessions: SessionKeys,
    notifier: Arc<dyn Notifier>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        sessions: SessionKeys,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            sessions,
            notifier,
        }
    }

    /// Issue a fresh passcode for `email` and mail it.
    ///
    /// Signup creates the account and fails if the email is taken; signin
    /// requires the account and replaces any outstanding passcode. If the
    /// mail cannot be sent the stored passcode is left in place.
    pub async fn issue_challenge(&self, email: &str, mode: ChallengeMode) -> NoteResult<()> {
        let email = normalize_email(email)?;
        let otp = Self::generate_otp();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.otp_ttl_secs);

        match mode {
            ChallengeMode::Signup => {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(NoteError::AlreadyExists("User already exists".to_string()));
                }

                let id = self
                    .create_signup_account(&email, &otp, expires_at, now)
                    .await?;
                tracing::info!("Created account {} via signup passcode", id);
            }
            ChallengeMode::Signin => {
                let account = self.find_by_email(&email).await?.ok_or_else(|| {
                    NoteError::NotFound("User not found, please sign up".to_string())
                })?;

                sqlx::query(
                    "UPDATE account SET otp = ?1, otp_expires_at = ?2, updated_at = ?3 WHERE id = ?4",
                )
                .bind(&otp)
                .bind(expires_at)
                .bind(now)
                .bind(&account.id)
                .execute(&self.db)
                .await?;

                tracing::debug!("Replaced passcode for account {}", account.id);
            }
        }

        self.send_challenge(&email, &otp).await
    }

    /// Check a presented passcode and, on success, consume it and mint a session
    pub async fn verify_challenge(&self, email: &str, code: &str) -> NoteResult<VerifiedLogin> {
        let email = normalize_email(email)?;
        if code.is_empty() {
            return Err(NoteError::Validation("Email and OTP required".to_string()));
        }

        let account = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| NoteError::NotFound("User not found".to_string()))?;

        check_challenge(&account, code, Utc::now())?;

        self.consume_challenge(&account.id, code).await?;

        let ttl = Duration::seconds(self.config.authentication.otp_session_ttl_secs);
        let token = self.sessions.issue(&account.id, None, ttl)?;

        tracing::info!("Account {} signed in with passcode", account.id);

        Ok(VerifiedLogin {
            token,
            profile: PublicProfile::from(&account),
        })
    }

    /// Find the account bound to a Google identity, creating it if needed.
    ///
    /// A known identity is returned as stored, even if the Google profile
    /// changed since. An unknown identity whose email already has an unlinked
    /// account is attached to that account.
    pub async fn link_or_create(&self, identity: &ExternalIdentity) -> NoteResult<Account> {
        if let Some(account) = self.find_by_google_id(&identity.subject).await? {
            return Ok(account);
        }

        let email = normalize_email(&identity.email)
            .map_err(|_| NoteError::Upstream("Google profile has no usable email".to_string()))?;
        let now = Utc::now();

        if let Some(existing) = self.find_by_email(&email).await? {
            return self.attach_google(&existing, identity).await;
        }

        let id = Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT INTO account (id, email, name, google_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&identity.name)
        .bind(&identity.subject)
        .bind(now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {
                tracing::info!("Created account {} via Google sign-in", id);
                self.get_account(&id).await
            }
            // Lost a race with a concurrent callback for the same identity
            Err(e) if db::is_unique_violation(&e) => self
                .find_by_google_id(&identity.subject)
                .await?
                .ok_or_else(|| {
                    NoteError::AlreadyExists("Email is linked to another account".to_string())
                }),
            Err(e) => Err(NoteError::Database(e)),
        }
    }

    /// Bind a Google identity to an existing account with the same email.
    ///
    /// Only a verified Google email may claim an account, and only while
    /// the account has no Google identity yet.
    async fn attach_google(
        &self,
        existing: &Account,
        identity: &ExternalIdentity,
    ) -> NoteResult<Account> {
        let taken = || {
            NoteError::AlreadyExists("Email is linked to another Google account".to_string())
        };

        if existing.google_id.is_some() {
            return Err(taken());
        }

        if !identity.email_verified {
            tracing::warn!(
                "Refusing to link unverified Google email to account {}",
                existing.id
            );
            return Err(NoteError::AlreadyExists(
                "Email is registered and Google has not verified it".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE account SET google_id = ?1, name = COALESCE(name, ?2), updated_at = ?3
             WHERE id = ?4 AND google_id IS NULL",
        )
        .bind(&identity.subject)
        .bind(&identity.name)
        .bind(Utc::now())
        .bind(&existing.id)
        .execute(&self.db)
        .await?;

        let account = self.get_account(&existing.id).await?;

        // The update is a no-op if a concurrent callback linked it first
        if account.google_id.as_deref() != Some(identity.subject.as_str()) {
            return Err(taken());
        }

        tracing::info!("Linked Google identity to existing account {}", existing.id);
        Ok(account)
    }

    /// Link or create the account for a Google identity and mint its session
    pub async fn oauth_login(&self, identity: &ExternalIdentity) -> NoteResult<(Account, String)> {
        let account = self.link_or_create(identity).await?;
        let ttl = Duration::seconds(self.config.authentication.oauth_session_ttl_secs);
        let token = self.sessions.issue(&account.id, Some(account.email.as_str()), ttl)?;

        Ok((account, token))
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> NoteResult<Account> {
        self.find_one("id", id)
            .await?
            .ok_or_else(|| NoteError::NotFound("User not found".to_string()))
    }

    pub(crate) async fn find_by_email(&self, email: &str) -> NoteResult<Option<Account>> {
        self.find_one("email", email).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> NoteResult<Option<Account>> {
        self.find_one("google_id", google_id).await
    }

    async fn find_one(&self, column: &'static str, value: &str) -> NoteResult<Option<Account>> {
        let sql = format!("SELECT {} FROM account WHERE {} = ?1", ACCOUNT_COLUMNS, column);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// Insert a fresh account holding its first passcode
    async fn create_signup_account(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> NoteResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO account (id, email, otp, otp_expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&id)
        .bind(email)
        .bind(otp)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                NoteError::AlreadyExists("User already exists".to_string())
            } else {
                NoteError::Database(e)
            }
        })?;

        Ok(id)
    }

    /// Clear the passcode only if it still equals `code`, so two concurrent
    /// verifications cannot both consume it.
    async fn consume_challenge(&self, account_id: &str, code: &str) -> NoteResult<()> {
        let result = sqlx::query(
            "UPDATE account SET otp = NULL, otp_expires_at = NULL, updated_at = ?1
             WHERE id = ?2 AND otp = ?3",
        )
        .bind(Utc::now())
        .bind(account_id)
        .bind(code)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NoteError::Expired("OTP expired".to_string()));
        }

        Ok(())
    }

    async fn send_challenge(&self, email: &str, otp: &str) -> NoteResult<()> {
        let minutes = (self.config.authentication.otp_ttl_secs + 59) / 60;
        let body = format!("Your OTP is: {} (valid {} minutes)", otp, minutes);

        self.notifier
            .send(email, "Your OTP", &body)
            .await
            .map_err(|e| {
                tracing::error!("Failed to deliver passcode to {}: {}", email, e);
                match e {
                    NoteError::DeliveryFailed(_) => e,
                    other => NoteError::DeliveryFailed(other.to_string()),
                }
            })
    }

    /// Six digit passcode in [100000, 999999]
    fn generate_otp() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }
}

/// Decide whether `code` matches the account's live passcode at `now`.
/// The passcode is still valid at exactly its expiry instant.
fn check_challenge(account: &Account, code: &str, now: DateTime<Utc>) -> NoteResult<()> {
    let stored = match (&account.otp, account.otp_expires_at) {
        (Some(otp), Some(expires_at)) if now <= expires_at => otp,
        _ => return Err(NoteError::Expired("OTP expired".to_string())),
    };

    if stored != code {
        return Err(NoteError::Mismatch("Invalid OTP".to_string()));
    }

    Ok(())
}

/// Trim and lower-case an email, rejecting blank or malformed input
fn normalize_email(email: &str) -> NoteResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(NoteError::Validation("Email required".to_string()));
    }

    if !email.validate_email() {
        return Err(NoteError::Validation("Invalid email format".to_string()));
    }

    Ok(email)
}

/// Configuration management for Notekeep
use crate::error::{NoteError, NoteResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub google: Option<GoogleConfig>,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Browser app that receives the OAuth redirects
    pub frontend_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of an emailed passcode
    pub otp_ttl_secs: i64,
    /// Session lifetime after passcode verification
    pub otp_session_ttl_secs: i64,
    /// Session lifetime after Google sign-in
    pub oauth_session_ttl_secs: i64,
}

/// Google OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> NoteResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| NoteError::Validation("Invalid port number".to_string()))?;
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/notes.sqlite"));

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| NoteError::Validation("JWT secret required".to_string()))?;
        let otp_ttl_secs = parse_secs("OTP_TTL_SECS", 300)?;
        let otp_session_ttl_secs = parse_secs("OTP_SESSION_TTL_SECS", 2 * 3600)?;
        let oauth_session_ttl_secs = parse_secs("OAUTH_SESSION_TTL_SECS", 3600)?;

        let google = if let Ok(client_id) = env::var("GOOGLE_CLIENT_ID") {
            Some(GoogleConfig {
                client_id,
                client_secret: env::var("GOOGLE_CLIENT_SECRET").map_err(|_| {
                    NoteError::Validation("Google client secret required".to_string())
                })?,
                callback_url: env::var("GOOGLE_CALLBACK_URL").unwrap_or_else(|_| {
                    format!("http://localhost:{}/auth/google/callback", port)
                }),
            })
        } else {
            None
        };

        let email = if let Ok(smtp_url) = env::var("SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let json = env::var("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                frontend_url,
            },
            storage: StorageConfig { database_path },
            authentication: AuthConfig {
                jwt_secret,
                otp_ttl_secs,
                otp_session_ttl_secs,
                oauth_session_ttl_secs,
            },
            google,
            email,
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> NoteResult<()> {
        if self.service.hostname.is_empty() {
            return Err(NoteError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(NoteError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        let auth = &self.authentication;
        if auth.otp_ttl_secs <= 0 || auth.otp_session_ttl_secs <= 0 || auth.oauth_session_ttl_secs <= 0
        {
            return Err(NoteError::Validation("Lifetimes must be positive".to_string()));
        }

        Ok(())
    }
}

fn parse_secs(key: &str, default: i64) -> NoteResult<i64> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| NoteError::Validation(format!("{} must be a number of seconds", key))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 5000,
            frontend_url: "http://localhost:5173".to_string(),
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only".to_string(),
            otp_ttl_secs: 300,
            otp_session_ttl_secs: 7200,
            oauth_session_ttl_secs: 3600,
        },
        google: None,
        email: None,
        logging: LoggingConfig {
            level: "info".to_string(),
            json: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.authentication.jwt_secret = "secret".to_string();
        assert!(matches!(config.validate(), Err(NoteError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_zero_lifetime() {
        let mut config = test_config();
        config.authentication.otp_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}

//! Google sign-in
//!
//! Authorization Code flow with PKCE. [`GoogleOAuth::authorize_url`] builds
//! the consent URL and remembers the CSRF state with its PKCE verifier;
//! [`GoogleOAuth::exchange_code`] consumes that state, trades the code for an
//! access token and reads the profile from the userinfo endpoint.
//!
//! Pending states live in process memory and expire after ten minutes.

use crate::{
    account::ExternalIdentity,
    config::GoogleConfig,
    error::{NoteError, NoteResult},
};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// How long a consent round trip may take
const STATE_TTL_MINUTES: i64 = 10;

/// Google userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// PKCE verifier waiting for its callback
#[derive(Clone)]
struct PendingState {
    pkce_verifier: String,
    expires_at: DateTime<Utc>,
}

/// Storage for OAuth state and PKCE verifiers
#[derive(Clone, Default)]
pub struct OAuthStateStore {
    states: Arc<RwLock<HashMap<String, PendingState>>>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn store(&self, state: String, pkce_verifier: String) {
        let now = Utc::now();
        let mut states = self.states.write().await;
        states.retain(|_, pending| pending.expires_at >= now);
        states.insert(
            state,
            PendingState {
                pkce_verifier,
                expires_at: now + Duration::minutes(STATE_TTL_MINUTES),
            },
        );
    }

    /// Remove the state and return its verifier if it has not expired
    async fn take(&self, state: &str) -> Option<String> {
        let pending = self.states.write().await.remove(state)?;
        (pending.expires_at >= Utc::now()).then_some(pending.pkce_verifier)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Google OAuth handler
pub struct GoogleOAuth {
    client: ConfiguredClient,
    http: reqwest::Client,
    states: OAuthStateStore,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig) -> NoteResult<Self> {
        let invalid = |e: oauth2::url::ParseError| {
            NoteError::Validation(format!("Invalid Google OAuth URL: {}", e))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(invalid)?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(invalid)?)
            .set_redirect_uri(RedirectUrl::new(config.callback_url.clone()).map_err(invalid)?);

        // Token endpoint responses must not be followed through redirects
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NoteError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            http,
            states: OAuthStateStore::new(),
        })
    }

    /// Consent URL for a new sign-in attempt
    pub async fn authorize_url(&self) -> String {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        self.states
            .store(csrf_state.secret().clone(), pkce_verifier.secret().clone())
            .await;

        auth_url.to_string()
    }

    /// Complete the flow and return the identity Google asserts
    pub async fn exchange_code(&self, code: &str, state: &str) -> NoteResult<ExternalIdentity> {
        let pkce_verifier = self
            .states
            .take(state)
            .await
            .ok_or_else(|| NoteError::Validation("Invalid or expired OAuth state".to_string()))?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| NoteError::Upstream(format!("Token exchange failed: {}", e)))?;

        let user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NoteError::Upstream(format!("Userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| NoteError::Upstream(format!("Invalid userinfo response: {}", e)))?;

        let email = user
            .email
            .ok_or_else(|| NoteError::Upstream("Google profile has no email".to_string()))?;

        Ok(ExternalIdentity {
            subject: user.id,
            email,
            email_verified: user.verified_email,
            name: user.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> GoogleOAuth {
        GoogleOAuth::new(&GoogleConfig {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            callback_url: "http://localhost:5000/auth/google/callback".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_url_records_state() {
        let google = google();
        let url = google.authorize_url().await;

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid+email+profile"));
        assert_eq!(google.states.len().await, 1);
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = OAuthStateStore::new();
        store.store("abc".to_string(), "verifier".to_string()).await;

        assert_eq!(store.take("abc").await.as_deref(), Some("verifier"));
        assert_eq!(store.take("abc").await, None);
    }

    #[tokio::test]
    async fn test_expired_state_rejected() {
        let store = OAuthStateStore::new();
        store.states.write().await.insert(
            "old".to_string(),
            PendingState {
                pkce_verifier: "verifier".to_string(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );

        assert_eq!(store.take("old").await, None);
    }

    #[test]
    fn test_userinfo_verification_flag() {
        let user: GoogleUser = serde_json::from_str(
            r#"{"id":"g-1","email":"b@x.com","verified_email":true,"name":"Bea"}"#,
        )
        .unwrap();
        assert!(user.verified_email);

        // Absent flag is treated as unverified
        let user: GoogleUser = serde_json::from_str(r#"{"id":"g-2","email":"c@x.com"}"#).unwrap();
        assert!(!user.verified_email);
        assert_eq!(user.name, None);
    }

    #[tokio::test]
    async fn test_unknown_state_fails_before_network() {
        let google = google();
        let result = google.exchange_code("code", "never-issued").await;
        assert!(matches!(result, Err(NoteError::Validation(_))));
    }
}

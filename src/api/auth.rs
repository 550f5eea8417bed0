/// Passcode, profile and Google sign-in endpoints
use crate::{
    account::{ChallengeMode, LoginResponse, LoginUser, OtpRequest, VerifyOtpRequest},
    auth::AuthContext,
    context::AppContext,
    db::account::PublicProfile,
    error::{NoteError, NoteResult},
    oauth::GoogleOAuth,
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Build auth routes (mounted under `/api/auth` and `/auth`)
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup-otp", post(signup_otp))
        .route("/signin-otp", post(signin_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/me", get(me))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
}

/// Send a passcode to a new email address
async fn signup_otp(
    State(ctx): State<AppContext>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> NoteResult<Json<serde_json::Value>> {
    let Json(req) = payload?;
    let email = req.email.unwrap_or_default();
    ctx.account_manager
        .issue_challenge(&email, ChallengeMode::Signup)
        .await?;

    Ok(Json(json!({ "message": "Signup OTP sent" })))
}

/// Send a passcode to a registered email address
async fn signin_otp(
    State(ctx): State<AppContext>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> NoteResult<Json<serde_json::Value>> {
    let Json(req) = payload?;
    let email = req.email.unwrap_or_default();
    ctx.account_manager
        .issue_challenge(&email, ChallengeMode::Signin)
        .await?;

    Ok(Json(json!({ "message": "Signin OTP sent" })))
}

/// Exchange a passcode for a session credential
async fn verify_otp(
    State(ctx): State<AppContext>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> NoteResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    let (Some(email), Some(otp)) = (req.email, req.otp) else {
        return Err(NoteError::Validation("Email and OTP required".to_string()));
    };

    let login = ctx.account_manager.verify_challenge(&email, &otp).await?;

    Ok(Json(LoginResponse {
        message: "Logged in".to_string(),
        token: login.token,
        user: LoginUser {
            email: login.profile.email,
            name: login.profile.name,
        },
    }))
}

/// Current account profile
async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> NoteResult<Json<PublicProfile>> {
    let account = ctx.account_manager.get_account(&auth.account_id).await?;
    Ok(Json(PublicProfile::from(&account)))
}

fn google(ctx: &AppContext) -> NoteResult<Arc<GoogleOAuth>> {
    ctx.google
        .clone()
        .ok_or_else(|| NoteError::NotFound("Google sign-in is not configured".to_string()))
}

/// Start Google sign-in
async fn google_login(State(ctx): State<AppContext>) -> NoteResult<Redirect> {
    let url = google(&ctx)?.authorize_url().await;
    tracing::debug!("Redirecting to Google consent screen");
    Ok(Redirect::to(&url))
}

/// Query parameters Google sends back
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Finish Google sign-in and hand the credential to the browser app
async fn google_callback(
    State(ctx): State<AppContext>,
    Query(params): Query<CallbackParams>,
) -> NoteResult<Redirect> {
    let google = google(&ctx)?;
    let frontend = &ctx.config.service.frontend_url;

    match complete_google_login(&ctx, &google, params).await {
        Ok(url) => Ok(Redirect::to(&url)),
        Err(e) => {
            tracing::warn!("Google sign-in failed: {}", e);
            Ok(Redirect::to(&format!("{}/login?error=oauth_failed", frontend)))
        }
    }
}

async fn complete_google_login(
    ctx: &AppContext,
    google: &GoogleOAuth,
    params: CallbackParams,
) -> NoteResult<String> {
    if let Some(error) = params.error {
        return Err(NoteError::Upstream(format!("Google returned error: {}", error)));
    }

    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err(NoteError::Validation("Missing code or state".to_string()));
    };

    let identity = google.exchange_code(&code, &state).await?;
    let (account, token) = ctx.account_manager.oauth_login(&identity).await?;

    success_redirect(
        &ctx.config.service.frontend_url,
        &token,
        &PublicProfile::from(&account),
    )
}

/// `<frontend>/auth-success?token=..&user=<url-encoded JSON profile>`
fn success_redirect(frontend: &str, token: &str, profile: &PublicProfile) -> NoteResult<String> {
    let user = serde_json::to_string(profile)
        .map_err(|e| NoteError::Internal(format!("Failed to encode profile: {}", e)))?;

    Ok(format!(
        "{}/auth-success?token={}&user={}",
        frontend,
        urlencoding::encode(token),
        urlencoding::encode(&user)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_redirect_encodes_profile() {
        let profile = PublicProfile {
            id: "acc-1".to_string(),
            email: "b@x.com".to_string(),
            name: Some("Bea & Co".to_string()),
        };

        let url = success_redirect("http://localhost:5173", "a.b.c", &profile).unwrap();
        let (base, query) = url.split_once('?').unwrap();
        assert_eq!(base, "http://localhost:5173/auth-success");

        let params: Vec<(&str, &str)> = query
            .split('&')
            .map(|kv| kv.split_once('=').unwrap())
            .collect();
        assert_eq!(params[0], ("token", "a.b.c"));
        assert_eq!(params[1].0, "user");

        let decoded = urlencoding::decode(params[1].1).unwrap();
        let parsed: PublicProfile = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, profile);
    }
}

/// Authentication extractor
use crate::{
    api::middleware::extract_bearer_token, context::AppContext, error::NoteError,
    session::TokenError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - verifies the bearer credential on the request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = NoteError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(TokenError::Missing)?;
        let claims = state.sessions.verify(&token)?;

        Ok(AuthContext {
            account_id: claims.sub,
        })
    }
}

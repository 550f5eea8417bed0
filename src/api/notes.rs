/// Note endpoints, all scoped to the authenticated account
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::note::Note,
    error::NoteResult,
    note::NoteRequest,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

/// Build note routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/:id", put(update_note).delete(delete_note))
}

async fn list_notes(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> NoteResult<Json<Vec<Note>>> {
    Ok(Json(ctx.note_store.list(&auth.account_id).await?))
}

async fn create_note(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> NoteResult<(StatusCode, Json<Note>)> {
    let Json(req) = payload?;
    let note = ctx
        .note_store
        .create(&auth.account_id, req.content.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> NoteResult<Json<Note>> {
    let Json(req) = payload?;
    let note = ctx
        .note_store
        .update(&auth.account_id, &id, req.content.as_deref())
        .await?;

    Ok(Json(note))
}

async fn delete_note(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> NoteResult<Json<serde_json::Value>> {
    ctx.note_store.delete(&auth.account_id, &id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

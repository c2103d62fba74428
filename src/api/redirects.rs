use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::{Ack, AppState};
use crate::redirects::{Redirect, RedirectInput};
use crate::Result;

pub async fn list_redirects(State(s): State<AppState>) -> Result<Json<Vec<Redirect>>> {
    Ok(Json(s.redirects.list().await?))
}

pub async fn create_redirect(State(s): State<AppState>, Json(input): Json<RedirectInput>) -> Result<(StatusCode, Json<Redirect>)> {
    Ok((StatusCode::CREATED, Json(s.redirects.create(input).await?)))
}

pub async fn update_redirect(State(s): State<AppState>, Path(id): Path<Uuid>, Json(input): Json<RedirectInput>) -> Result<Json<Redirect>> {
    Ok(Json(s.redirects.update(id, input).await?))
}

pub async fn delete_redirect(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Ack>> {
    s.redirects.delete(id).await?;
    Ok(Ack::new("Redirect deleted"))
}

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use strand_types::api::{AiSettingsResponse, Claims, UpdateAiSettingsRequest};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub async fn get_ai_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| Ok(db.get_user(&claims.sub)?)).await?;

    // A user who has never touched the store simply has no settings yet.
    let (ai_nickname, ai_personality) = user
        .map(|u| (u.ai_nickname, u.ai_personality))
        .unwrap_or_default();

    Ok(Json(AiSettingsResponse {
        ai_nickname,
        ai_personality,
    }))
}

pub async fn update_ai_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateAiSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = with_db(&state, move |db| {
        db.upsert_user(
            &claims.sub,
            claims.name.as_deref(),
            claims.email.as_deref(),
            claims.picture.as_deref(),
        )?;
        db.update_ai_settings(
            &claims.sub,
            req.ai_nickname.as_deref(),
            req.ai_personality.as_deref(),
        )?;
        Ok(AiSettingsResponse {
            ai_nickname: req.ai_nickname,
            ai_personality: req.ai_personality,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Hard delete of the account; owned threads go with it (store cascade).
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| Ok(db.delete_user(&claims.sub)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

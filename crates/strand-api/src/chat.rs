use axum::{
    Extension, Json,
    body::Body,
    extract::State,
    http::header,
    response::Response,
};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::error;

use strand_llm::{Persona, StreamEvent, catalog, ensure_system_prompt};
use strand_types::api::{ChatRequest, Claims};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// Streaming chat gateway: forward the conversation to the hosted model and
/// relay tokens back as a chunked plain-text body. Nothing is persisted
/// here — saving the finished transcript is the caller's job. Dropping the
/// response mid-stream closes the provider connection.
pub async fn completions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let model = req
        .model
        .unwrap_or_else(|| state.llm.default_model().to_string());
    if catalog::find_model(&model).is_none() {
        return Err(ApiError::InvalidOperation(format!("unknown model: {model}")));
    }

    let sub = claims.sub.clone();
    let persona = with_db(&state, move |db| {
        Ok(db.get_user(&sub)?.map(|u| Persona {
            nickname: u.ai_nickname,
            personality: u.ai_personality,
        }))
    })
    .await?;

    let mut messages = req.messages;
    ensure_system_prompt(&mut messages, persona.as_ref());

    let mut events = state
        .llm
        .stream_chat(&model, &messages)
        .await
        .map_err(|e| ApiError::Stream(e.to_string()))?;

    let body_stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Delta(text)) => {
                    yield Ok::<Bytes, std::io::Error>(Bytes::from(text));
                }
                Ok(StreamEvent::Done { .. }) => break,
                Err(e) => {
                    // Mid-stream provider failure: terminate the body; the
                    // caller keeps whatever arrived and may resend.
                    error!("chat stream failed: {:#}", e);
                    yield Err(std::io::Error::other(e.to_string()));
                    break;
                }
            }
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use strand_db::models::ThreadRow;
use strand_types::api::{
    BranchThreadRequest, Claims, RenameThreadRequest, RotateShareResponse, SaveMessagesRequest,
    SaveMessagesResponse, SetPinnedRequest, SetRequireAuthRequest, SharedThreadResponse,
    ThreadResponse, ThreadSummary,
};
use strand_types::models::ChatMessage;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub const DEFAULT_TITLE: &str = "New Chat";

/// Find-or-create the caller's scratch thread. Repeated new-chat actions
/// land on the same empty thread instead of accumulating them.
pub async fn new_thread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| {
        db.upsert_user(
            &claims.sub,
            claims.name.as_deref(),
            claims.email.as_deref(),
            claims.picture.as_deref(),
        )?;

        if let Some(existing) = db.find_scratch_thread(&claims.sub)? {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let share_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        db.insert_thread(&id, &claims.sub, DEFAULT_TITLE, None, &share_id, &now)?;

        db.get_thread(&id, &claims.sub)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("thread vanished after insert")))
    })
    .await?;

    Ok(Json(to_thread_response(row)))
}

pub async fn list_threads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| Ok(db.list_threads(&claims.sub)?)).await?;

    let summaries: Vec<ThreadSummary> = rows
        .into_iter()
        .map(|row| ThreadSummary {
            id: parse_uuid(&row.id, "thread id"),
            title: row.title,
            pinned: row.pinned,
            created_at: parse_timestamp(&row.created_at, &row.id),
            updated_at: parse_timestamp(&row.updated_at, &row.id),
        })
        .collect();

    Ok(Json(summaries))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| {
        db.get_thread(&thread_id.to_string(), &claims.sub)?
            .ok_or(ApiError::NotFound)
    })
    .await?;

    Ok(Json(to_thread_response(row)))
}

/// Wholesale transcript overwrite. Returns the refreshed `updated_at` so the
/// caller can track its last-persisted snapshot.
pub async fn save_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let serialized = serde_json::to_string(&req.messages)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("transcript encode failed: {}", e)))?;
    let now = Utc::now();

    let matched = with_db(&state, move |db| {
        Ok(db.save_messages(
            &thread_id.to_string(),
            &claims.sub,
            &serialized,
            &now.to_rfc3339(),
        )?)
    })
    .await?;

    if !matched {
        return Err(ApiError::NotFound);
    }

    Ok(Json(SaveMessagesResponse { updated_at: now }))
}

pub async fn rename_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RenameThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    mutate(&state, move |db| {
        db.rename_thread(&thread_id.to_string(), &claims.sub, &req.title)
    })
    .await
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    mutate(&state, move |db| {
        db.delete_thread(&thread_id.to_string(), &claims.sub)
    })
    .await
}

pub async fn set_pinned(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetPinnedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    mutate(&state, move |db| {
        db.set_pinned(&thread_id.to_string(), &claims.sub, req.pinned)
    })
    .await
}

pub async fn set_require_auth(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetRequireAuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    mutate(&state, move |db| {
        db.set_require_auth(&thread_id.to_string(), &claims.sub, req.require_auth)
    })
    .await
}

/// Rotate the public link. Prior share ids stop resolving; owner access by
/// thread id is untouched.
pub async fn rotate_share_id(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let share_id = Uuid::new_v4();

    let matched = with_db(&state, move |db| {
        Ok(db.regenerate_share_id(&thread_id.to_string(), &claims.sub, &share_id.to_string())?)
    })
    .await?;

    if !matched {
        return Err(ApiError::NotFound);
    }

    Ok(Json(RotateShareResponse { share_id }))
}

/// Public share view — no session required. The row is returned even when
/// `require_auth` is set; gating display on that flag is the viewing layer's
/// job, not the store's.
pub async fn get_shared_thread(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| {
        db.get_thread_by_share_id(&share_id.to_string())?
            .ok_or(ApiError::NotFound)
    })
    .await?;

    Ok(Json(SharedThreadResponse {
        title: row.title.clone(),
        messages: parse_messages(row.messages.as_deref(), &row.id),
        require_auth: row.require_auth,
        updated_at: parse_timestamp(&row.updated_at, &row.id),
    }))
}

/// Copy someone else's thread into the caller's account. Cloning your own
/// thread is rejected; branch exists for that.
pub async fn clone_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| {
        clone_from_source(db, &claims, &thread_id.to_string())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_thread_response(row))))
}

fn clone_from_source(
    db: &strand_db::Database,
    claims: &Claims,
    thread_id: &str,
) -> Result<ThreadRow, ApiError> {
    let source = db.get_thread_any(thread_id)?.ok_or(ApiError::NotFound)?;

    if source.user_id == claims.sub {
        return Err(ApiError::InvalidOperation("cannot clone own thread".into()));
    }

    db.upsert_user(
        &claims.sub,
        claims.name.as_deref(),
        claims.email.as_deref(),
        claims.picture.as_deref(),
    )?;

    let id = Uuid::new_v4().to_string();
    let share_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    db.insert_thread(
        &id,
        &claims.sub,
        &source.title,
        source.messages.as_deref(),
        &share_id,
        &now,
    )?;

    db.get_thread(&id, &claims.sub)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("thread vanished after insert")))
}

/// Fork a conversation from an already-truncated transcript prefix.
pub async fn branch_thread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BranchThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let serialized = serde_json::to_string(&req.messages)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("transcript encode failed: {}", e)))?;

    let row = with_db(&state, move |db| {
        db.upsert_user(
            &claims.sub,
            claims.name.as_deref(),
            claims.email.as_deref(),
            claims.picture.as_deref(),
        )?;

        let id = Uuid::new_v4().to_string();
        let share_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        db.insert_thread(&id, &claims.sub, &req.title, Some(&serialized), &share_id, &now)?;

        db.get_thread(&id, &claims.sub)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("thread vanished after insert")))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_thread_response(row))))
}

/// Owner-scoped single-statement mutation; zero rows matched is NotFound
/// whether the thread is missing or owned by someone else.
async fn mutate<F>(state: &AppState, f: F) -> Result<StatusCode, ApiError>
where
    F: FnOnce(&strand_db::Database) -> anyhow::Result<bool> + Send + 'static,
{
    let matched = with_db(state, move |db| Ok(f(db)?)).await?;
    if !matched {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

fn to_thread_response(row: ThreadRow) -> ThreadResponse {
    ThreadResponse {
        id: parse_uuid(&row.id, "thread id"),
        title: row.title.clone(),
        messages: parse_messages(row.messages.as_deref(), &row.id),
        pinned: row.pinned,
        share_id: parse_uuid(&row.share_id, "share id"),
        require_auth: row.require_auth,
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
    }
}

fn parse_messages(raw: Option<&str>, thread_id: &str) -> Vec<ChatMessage> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt transcript on thread '{}': {}", thread_id, e);
        Vec::new()
    })
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, thread_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') stores "YYYY-MM-DD HH:MM:SS" without a
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on thread '{}': {}", raw, thread_id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_db::Database;

    fn claims_for(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            name: Some(sub.to_string()),
            email: None,
            picture: None,
            exp: usize::MAX,
        }
    }

    fn seed_thread(db: &Database, user: &str, title: &str, messages: Option<&str>) -> String {
        db.upsert_user(user, Some(user), None, None).unwrap();
        let id = Uuid::new_v4().to_string();
        let share_id = Uuid::new_v4().to_string();
        db.insert_thread(&id, user, title, messages, &share_id, "2026-01-01T00:00:00Z")
            .unwrap();
        id
    }

    #[test]
    fn cloning_own_thread_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_thread(&db, "alice", "Mine", None);

        let result = clone_from_source(&db, &claims_for("alice"), &id);
        assert!(matches!(result, Err(ApiError::InvalidOperation(ref msg))
            if msg == "cannot clone own thread"));

        // Rejection leaves the owner with just the original thread.
        assert_eq!(db.list_threads("alice").unwrap().len(), 1);
    }

    #[test]
    fn cloning_a_missing_thread_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let result = clone_from_source(&db, &claims_for("bob"), &Uuid::new_v4().to_string());
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[test]
    fn cloning_another_users_thread_copies_it() {
        let db = Database::open_in_memory().unwrap();
        let source_id = seed_thread(
            &db,
            "alice",
            "Recipe ideas",
            Some("[{\"role\":\"user\",\"content\":\"pasta\"}]"),
        );

        let clone = clone_from_source(&db, &claims_for("bob"), &source_id).unwrap();
        assert_eq!(clone.user_id, "bob");
        assert_eq!(clone.title, "Recipe ideas");
        assert_ne!(clone.id, source_id);
        assert!(clone.messages.as_deref().unwrap().contains("pasta"));
    }

    #[test]
    fn corrupt_transcript_degrades_to_empty() {
        assert!(parse_messages(None, "t1").is_empty());
        assert!(parse_messages(Some("not json"), "t1").is_empty());

        let parsed = parse_messages(Some("[{\"role\":\"user\",\"content\":\"hi\"}]"), "t1");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].content, "hi");
    }

    #[test]
    fn sqlite_naive_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2026-03-01 12:30:00", "t1");
        assert_eq!(ts.to_rfc3339(), "2026-03-01T12:30:00+00:00");

        let rfc = parse_timestamp("2026-03-01T12:30:00+00:00", "t1");
        assert_eq!(rfc, ts);
    }
}

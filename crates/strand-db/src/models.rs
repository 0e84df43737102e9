/// Database row types — these map directly to SQLite rows.
/// Distinct from strand-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub ai_nickname: Option<String>,
    pub ai_personality: Option<String>,
    pub created_at: String,
}

pub struct ThreadRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// JSON transcript; NULL until the first save (a scratch thread).
    pub messages: Option<String>,
    pub pinned: bool,
    pub share_id: String,
    pub require_auth: bool,
    pub created_at: String,
    pub updated_at: String,
}

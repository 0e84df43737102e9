use crate::Database;
use crate::models::{ThreadRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const THREAD_COLUMNS: &str =
    "id, user_id, title, messages, pinned, share_id, require_auth, created_at, updated_at";

impl Database {
    // -- Users --

    /// Identity is issued externally; user rows are mirrored lazily from
    /// session claims the first time a user touches the store.
    pub fn upsert_user(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        image: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, image) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     image = excluded.image",
                rusqlite::params![id, name, email, image],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, image, ai_nickname, ai_personality, created_at
                 FROM users WHERE id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        image: row.get(3)?,
                        ai_nickname: row.get(4)?,
                        ai_personality: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_ai_settings(
        &self,
        id: &str,
        ai_nickname: Option<&str>,
        ai_personality: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET ai_nickname = ?2, ai_personality = ?3 WHERE id = ?1",
                rusqlite::params![id, ai_nickname, ai_personality],
            )?;
            Ok(n > 0)
        })
    }

    /// Hard delete; owned threads follow via ON DELETE CASCADE.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Threads --

    pub fn insert_thread(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        messages: Option<&str>,
        share_id: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO threads (id, user_id, title, messages, share_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id, user_id, title, messages, share_id, now],
            )?;
            Ok(())
        })
    }

    /// Owner-scoped read. A thread that exists but belongs to someone else is
    /// indistinguishable from one that does not exist.
    pub fn get_thread(&self, id: &str, user_id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            query_thread_where(conn, "id = ?1 AND user_id = ?2", rusqlite::params![id, user_id])
        })
    }

    /// Unscoped read, used only by the clone-from-share path, which must see
    /// threads the caller does not own.
    pub fn get_thread_any(&self, id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| query_thread_where(conn, "id = ?1", rusqlite::params![id]))
    }

    pub fn get_thread_by_share_id(&self, share_id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            query_thread_where(conn, "share_id = ?1", rusqlite::params![share_id])
        })
    }

    pub fn list_threads(&self, user_id: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {THREAD_COLUMNS} FROM threads WHERE user_id = ?1 ORDER BY updated_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], thread_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The scratch thread: no transcript saved yet. At most one per user by
    /// construction — new-chat reuses it instead of inserting another.
    pub fn find_scratch_thread(&self, user_id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            query_thread_where(
                conn,
                "user_id = ?1 AND messages IS NULL",
                rusqlite::params![user_id],
            )
        })
    }

    /// Wholesale transcript overwrite; refreshes updated_at to `now`.
    pub fn save_messages(
        &self,
        id: &str,
        user_id: &str,
        messages: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE threads SET messages = ?3, updated_at = ?4
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, messages, now],
            )?;
            Ok(n > 0)
        })
    }

    pub fn rename_thread(&self, id: &str, user_id: &str, title: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE threads SET title = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, title],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_thread(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM threads WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_pinned(&self, id: &str, user_id: &str, pinned: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE threads SET pinned = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, pinned],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_require_auth(&self, id: &str, user_id: &str, require_auth: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE threads SET require_auth = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, require_auth],
            )?;
            Ok(n > 0)
        })
    }

    /// Rotates the public link. Old share ids stop resolving immediately;
    /// id-based owner access is unaffected.
    pub fn regenerate_share_id(&self, id: &str, user_id: &str, new_share_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE threads SET share_id = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, new_share_id],
            )?;
            Ok(n > 0)
        })
    }
}

fn query_thread_where(
    conn: &Connection,
    predicate: &str,
    params: impl rusqlite::Params,
) -> Result<Option<ThreadRow>> {
    let sql = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row(params, thread_from_row).optional()?;
    Ok(row)
}

fn thread_from_row(row: &Row<'_>) -> std::result::Result<ThreadRow, rusqlite::Error> {
    Ok(ThreadRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        messages: row.get(3)?,
        pinned: row.get::<_, i64>(4)? != 0,
        share_id: row.get(5)?,
        require_auth: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_users(users: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for u in users {
            db.upsert_user(u, Some(*u), None, None).unwrap();
        }
        db
    }

    fn new_thread(db: &Database, user: &str, title: &str) -> (String, String) {
        let id = Uuid::new_v4().to_string();
        let share_id = Uuid::new_v4().to_string();
        db.insert_thread(&id, user, title, None, &share_id, "2026-01-01T00:00:00Z")
            .unwrap();
        (id, share_id)
    }

    #[test]
    fn ownership_isolation_on_mutations() {
        let db = db_with_users(&["alice", "bob"]);
        let (id, _) = new_thread(&db, "alice", "Alice's thread");

        // Every owner-scoped mutation by bob matches zero rows.
        assert!(!db.rename_thread(&id, "bob", "stolen").unwrap());
        assert!(!db.set_pinned(&id, "bob", true).unwrap());
        assert!(!db.set_require_auth(&id, "bob", true).unwrap());
        assert!(!db.regenerate_share_id(&id, "bob", "new-share").unwrap());
        assert!(!db.save_messages(&id, "bob", "[]", "2026-01-02T00:00:00Z").unwrap());
        assert!(!db.delete_thread(&id, "bob").unwrap());

        // State unchanged, and bob cannot even read it.
        let row = db.get_thread(&id, "alice").unwrap().unwrap();
        assert_eq!(row.title, "Alice's thread");
        assert!(!row.pinned);
        assert!(row.messages.is_none());
        assert!(db.get_thread(&id, "bob").unwrap().is_none());
    }

    #[test]
    fn scratch_thread_is_reused() {
        let db = db_with_users(&["alice"]);
        let (id, _) = new_thread(&db, "alice", "New Chat");

        let first = db.find_scratch_thread("alice").unwrap().unwrap();
        let second = db.find_scratch_thread("alice").unwrap().unwrap();
        assert_eq!(first.id, id);
        assert_eq!(second.id, id);

        // Once a transcript is saved the thread stops being scratch.
        db.save_messages(&id, "alice", "[{\"role\":\"user\",\"content\":\"hi\"}]", "2026-01-02T00:00:00Z")
            .unwrap();
        assert!(db.find_scratch_thread("alice").unwrap().is_none());
    }

    #[test]
    fn transcript_round_trips_through_save() {
        let db = db_with_users(&["alice"]);
        let (id, _) = new_thread(&db, "alice", "New Chat");

        let transcript = serde_json::json!([
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi there", "model": "gpt-4o"},
        ])
        .to_string();

        assert!(db.save_messages(&id, "alice", &transcript, "2026-01-02T00:00:00Z").unwrap());
        let row = db.get_thread(&id, "alice").unwrap().unwrap();
        assert_eq!(row.messages.as_deref(), Some(transcript.as_str()));
        assert_eq!(row.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn share_id_rotation_invalidates_old_link() {
        let db = db_with_users(&["alice"]);
        let (id, old_share) = new_thread(&db, "alice", "Shared");

        assert!(db.get_thread_by_share_id(&old_share).unwrap().is_some());

        let new_share = Uuid::new_v4().to_string();
        assert!(db.regenerate_share_id(&id, "alice", &new_share).unwrap());

        assert!(db.get_thread_by_share_id(&old_share).unwrap().is_none());
        let row = db.get_thread_by_share_id(&new_share).unwrap().unwrap();
        assert_eq!(row.id, id);
    }

    #[test]
    fn share_fetch_returns_row_even_when_auth_required() {
        // Gating display on require_auth is the viewing layer's job; the
        // store hands back the row either way.
        let db = db_with_users(&["alice"]);
        let (id, share) = new_thread(&db, "alice", "Gated");

        assert!(db.set_require_auth(&id, "alice", true).unwrap());

        let row = db.get_thread_by_share_id(&share).unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(row.require_auth);
    }

    #[test]
    fn listing_orders_by_recent_activity() {
        let db = db_with_users(&["alice"]);
        let (older, _) = new_thread(&db, "alice", "older");
        let (newer, _) = new_thread(&db, "alice", "newer");

        db.save_messages(&older, "alice", "[]", "2026-01-03T00:00:00Z").unwrap();
        db.save_messages(&newer, "alice", "[]", "2026-01-02T00:00:00Z").unwrap();

        let rows = db.list_threads("alice").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![older.as_str(), newer.as_str()]);
    }

    #[test]
    fn cloned_thread_copies_content_with_fresh_identity() {
        let db = db_with_users(&["alice", "bob"]);
        let (source_id, source_share) = new_thread(&db, "alice", "Recipe ideas");
        db.save_messages(&source_id, "alice", "[{\"role\":\"user\",\"content\":\"pasta\"}]", "2026-01-02T00:00:00Z")
            .unwrap();

        // Clone path: unscoped read, then insert under the cloner.
        let source = db.get_thread_any(&source_id).unwrap().unwrap();
        let clone_id = Uuid::new_v4().to_string();
        let clone_share = Uuid::new_v4().to_string();
        db.insert_thread(
            &clone_id,
            "bob",
            &source.title,
            source.messages.as_deref(),
            &clone_share,
            "2026-01-05T00:00:00Z",
        )
        .unwrap();

        let clone = db.get_thread(&clone_id, "bob").unwrap().unwrap();
        assert_eq!(clone.title, source.title);
        assert_eq!(clone.messages, source.messages);
        assert_ne!(clone.id, source.id);
        assert_ne!(clone.share_id, source_share);
        assert_eq!(clone.created_at, "2026-01-05T00:00:00Z");

        // Source untouched.
        let source_after = db.get_thread(&source_id, "alice").unwrap().unwrap();
        assert_eq!(source_after.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn deleting_a_user_cascades_to_threads() {
        let db = db_with_users(&["alice"]);
        let (id, share) = new_thread(&db, "alice", "doomed");

        assert!(db.delete_user("alice").unwrap());
        assert!(db.get_thread_any(&id).unwrap().is_none());
        assert!(db.get_thread_by_share_id(&share).unwrap().is_none());
    }

    #[test]
    fn ai_settings_update() {
        let db = db_with_users(&["alice"]);
        assert!(db.update_ai_settings("alice", Some("Strand"), Some("concise")).unwrap());

        let user = db.get_user("alice").unwrap().unwrap();
        assert_eq!(user.ai_nickname.as_deref(), Some("Strand"));
        assert_eq!(user.ai_personality.as_deref(), Some("concise"));

        assert!(!db.update_ai_settings("nobody", None, None).unwrap());
    }
}

use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert a new user and return the assigned id.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// All registered users, sorted by username.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, username, password, created_at FROM users ORDER BY username")?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE id = ?1", [id], |row| {
                    row.get(0)
                })?;
            Ok(count > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, sender_id, receiver_id, body, attachment_url, attachment_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.sender_id,
                    row.receiver_id,
                    row.body,
                    row.attachment_url,
                    row.attachment_id,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT} WHERE id = ?1"))?;
            let row = stmt.query_row([id], message_from_row).optional()?;
            Ok(row)
        })
    }

    /// All messages where the user is sender or receiver, newest first.
    pub fn list_messages_for(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE sender_id = ?1 OR receiver_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Participant-scoped substring search over message bodies, newest first.
    /// The query is matched literally: LIKE metacharacters in it are escaped.
    pub fn search_messages(&self, user_id: i64, query: &str) -> Result<Vec<MessageRow>> {
        let query = escape_like(query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE (sender_id = ?1 OR receiver_id = ?1)
                   AND body LIKE '%' || ?2 || '%' ESCAPE '\\'
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, query], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_message_body(&self, id: &str, body: &str, updated_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET body = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, body, updated_at],
            )?;
            Ok(())
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

const MESSAGE_SELECT: &str = "SELECT id, sender_id, receiver_id, body, attachment_url, attachment_id, created_at, updated_at
     FROM messages";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        body: row.get(3)?,
        attachment_url: row.get(4)?,
        attachment_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_user<P: rusqlite::ToSql>(
    conn: &Connection,
    predicate: &str,
    param: P,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, created_at FROM users WHERE {predicate}"
    ))?;

    let row = stmt.query_row([&param], user_from_row).optional()?;

    Ok(row)
}

/// Backslash-escape LIKE metacharacters so a query matches them literally.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
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

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn message(id: &str, sender: i64, receiver: i64, body: &str, created_at: &str) -> MessageRow {
        MessageRow {
            id: id.to_string(),
            sender_id: sender,
            receiver_id: receiver,
            body: body.to_string(),
            attachment_url: None,
            attachment_id: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    fn seed_users(db: &Database) -> (i64, i64) {
        let a = db.create_user("alice", "hash-a").unwrap();
        let b = db.create_user("bob", "hash-b").unwrap();
        (a, b)
    }

    #[test]
    fn create_and_lookup_user() {
        let db = test_db();
        let id = db.create_user("alice", "hash").unwrap();

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);

        let by_id = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(db.user_exists(id).unwrap());
        assert!(!db.user_exists(id + 100).unwrap());
    }

    #[test]
    fn list_users_is_sorted_by_username() {
        let db = test_db();
        db.create_user("carol", "hash-c").unwrap();
        db.create_user("alice", "hash-a").unwrap();
        db.create_user("bob", "hash-b").unwrap();

        let users = db.list_users().unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = test_db();
        db.create_user("alice", "hash").unwrap();
        assert!(db.create_user("alice", "other").is_err());
    }

    #[test]
    fn insert_and_get_message_roundtrip() {
        let db = test_db();
        let (a, b) = seed_users(&db);

        db.insert_message(&message("m1", a, b, "hello", "2026-01-01T10:00:00.000000Z"))
            .unwrap();

        let row = db.get_message("m1").unwrap().unwrap();
        assert_eq!(row.body, "hello");
        assert_eq!(row.sender_id, a);
        assert_eq!(row.receiver_id, b);
        assert!(row.attachment_url.is_none());

        assert!(db.get_message("missing").unwrap().is_none());
    }

    #[test]
    fn list_is_participant_scoped_and_newest_first() {
        let db = test_db();
        let (a, b) = seed_users(&db);
        let c = db.create_user("carol", "hash-c").unwrap();

        db.insert_message(&message("m1", a, b, "first", "2026-01-01T10:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m2", b, a, "second", "2026-01-01T11:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m3", b, c, "not for alice", "2026-01-01T12:00:00.000000Z"))
            .unwrap();

        let rows = db.list_messages_for(a).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn search_filters_by_substring() {
        let db = test_db();
        let (a, b) = seed_users(&db);

        db.insert_message(&message("m1", a, b, "see you tomorrow", "2026-01-01T10:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m2", b, a, "tomorrow works", "2026-01-01T11:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m3", a, b, "unrelated", "2026-01-01T12:00:00.000000Z"))
            .unwrap();

        let rows = db.search_messages(a, "tomorrow").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn search_treats_like_metacharacters_literally() {
        let db = test_db();
        let (a, b) = seed_users(&db);

        db.insert_message(&message("m1", a, b, "progress at 100%", "2026-01-01T10:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m2", a, b, "progress at 100x", "2026-01-01T11:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m3", a, b, "var_name", "2026-01-01T12:00:00.000000Z"))
            .unwrap();
        db.insert_message(&message("m4", a, b, "varXname", "2026-01-01T13:00:00.000000Z"))
            .unwrap();

        let rows = db.search_messages(a, "100%").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);

        let rows = db.search_messages(a, "var_name").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m3"]);
    }

    #[test]
    fn update_and_delete_message() {
        let db = test_db();
        let (a, b) = seed_users(&db);

        db.insert_message(&message("m1", a, b, "hi", "2026-01-01T10:00:00.000000Z"))
            .unwrap();

        db.update_message_body("m1", "hi there", "2026-01-01T10:05:00.000000Z")
            .unwrap();
        let row = db.get_message("m1").unwrap().unwrap();
        assert_eq!(row.body, "hi there");
        assert_eq!(row.updated_at, "2026-01-01T10:05:00.000000Z");
        assert_eq!(row.created_at, "2026-01-01T10:00:00.000000Z");

        db.delete_message("m1").unwrap();
        assert!(db.get_message("m1").unwrap().is_none());
    }
}

/// Database row types — these map directly to SQLite rows.
/// Distinct from parley-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub body: String,
    pub attachment_url: Option<String>,
    pub attachment_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

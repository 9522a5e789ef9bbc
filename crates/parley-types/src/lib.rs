pub mod api;
pub mod error;
pub mod events;
pub mod models;
pub mod token;

/// User identifiers are opaque numeric ids assigned by the database.
pub type UserId = i64;

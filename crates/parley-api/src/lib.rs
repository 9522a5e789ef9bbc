pub mod attachments;
pub mod auth;
pub mod error;
pub mod ingress;
pub mod messages;
pub mod middleware;
pub mod users;

pub mod connection;
pub mod fanout;
pub mod ingress;
pub mod registry;

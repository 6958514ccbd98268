//! Request handlers.

pub mod chat;
pub mod oauth;
pub mod table;

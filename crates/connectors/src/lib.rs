#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

//! # connectors
//!
//! Task-platform integrations for the gateway.
//!
//! One module per platform, each providing:
//! - OAuth authorize-URL construction and code exchange
//! - A fetch client that walks the platform's project/task hierarchy
//! - Flattening of the fetched export into [`TaskDocument`]s for retrieval
//!
//! Platforms covered: Asana (REST), ClickUp (REST), Linear (GraphQL).

pub mod asana;
pub mod clickup;
pub mod linear;
pub mod models;

pub use models::{OauthConfig, OauthToken, Platform, TaskDocument};

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # gateway
//!
//! HTTP service tying the platform connectors, retrieval QA, and tabular
//! editing together behind one axum router.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use errors::ApiError;
pub use server::{build_router, AppState};

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

//! # rag
//!
//! Retrieval-augmented question answering over task exports.
//!
//! The pipeline: connector exports flatten into text chunks, chunks are
//! embedded into an in-memory cosine index, and each question retrieves
//! the top-k chunks as context for the chat model.

pub mod chunks;
pub mod index;
pub mod qa;

pub use chunks::from_documents;
pub use index::VectorIndex;
pub use qa::{Answer, RagError, RagResult, RetrievalQa};

//! Needs-diff service for cairn.
//!
//! The [`NeedsDiffService`] is the server half of the upload protocol: it
//! persists a submitted chunk and, for manifests, answers with the children
//! the backend does not hold yet, in manifest order.

mod error;
mod service;

pub use error::DiffError;
pub use service::{DiffConfig, NeedsDiffService};

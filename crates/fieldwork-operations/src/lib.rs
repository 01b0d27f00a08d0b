//! Collect lifecycle transitions and the collaborators they drive.
//!
//! Each transition is a task plan run by `fieldwork-saga`; the tasks talk to
//! a [`traits::FormService`], a [`traits::CollectStore`] and a
//! [`traits::DocumentStore`] through a [`CollectContext`].

pub mod config;
mod context;
pub mod data;
mod error;
pub mod operations;
pub mod providers;
pub mod tasks;
pub mod traits;
pub mod workflow;

pub use config::Settings;
pub use context::{CollectContext, export_path, media_path};
pub use error::{OperationError, Result};

mod collect_store;
mod documents;
mod form_service;

pub use collect_store::CollectStore;
pub use documents::DocumentStore;
pub use form_service::FormService;

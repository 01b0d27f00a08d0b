use std::path::PathBuf;
use std::sync::Arc;

use fieldwork_core::{Collect, CollectId, Target};

use crate::Result;
use crate::config::Settings;
use crate::error::OperationError;
use crate::traits::{CollectStore, DocumentStore, FormService};

/// Collaborators shared by every task of a transition.
#[derive(Clone)]
pub struct CollectContext {
    forms: Arc<dyn FormService>,
    store: Arc<dyn CollectStore>,
    documents: Arc<dyn DocumentStore>,
    settings: Settings,
}

impl CollectContext {
    pub fn new(
        forms: Arc<dyn FormService>,
        store: Arc<dyn CollectStore>,
        documents: Arc<dyn DocumentStore>,
        settings: Settings,
    ) -> Self {
        Self {
            forms,
            store,
            documents,
            settings,
        }
    }

    #[must_use]
    pub fn forms(&self) -> &dyn FormService {
        self.forms.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &dyn CollectStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load a collect that must exist.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::CollectNotFound` if it does not.
    pub fn collect(&self, id: CollectId) -> Result<Collect> {
        self.store
            .load_collect(id)?
            .ok_or(OperationError::CollectNotFound(id))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn targets(&self, id: CollectId) -> Result<Vec<Target>> {
        self.store.targets(id)
    }

    /// `{folder}/targets/{identifier}-{LAST First}.{ext}`
    #[must_use]
    pub fn target_document_path(&self, collect: &Collect, target: &Target) -> PathBuf {
        PathBuf::from(collect.folder())
            .join("targets")
            .join(format!("{}.{}", target.fname(), self.documents.document_extension()))
    }
}

impl std::fmt::Debug for CollectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectContext")
            .field("server", &self.settings.server.url)
            .field("data_dir", &self.settings.storage.data_dir)
            .field("documents_dir", &self.settings.storage.documents_dir)
            .finish_non_exhaustive()
    }
}

/// `{folder}/{folder}.json`
#[must_use]
pub fn export_path(collect: &Collect) -> PathBuf {
    let folder = collect.folder();
    PathBuf::from(&folder).join(format!("{folder}.json"))
}

/// `{folder}/medias/{file_name}`
#[must_use]
pub fn media_path(collect: &Collect, file_name: &str) -> PathBuf {
    PathBuf::from(collect.folder()).join("medias").join(file_name)
}

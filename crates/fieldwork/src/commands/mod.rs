mod inspect;
mod transition;

use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use fieldwork_core::{CollectId, CollectStatus};
use fieldwork_operations::operations::{CollectOperations, TransitionGuard};
use fieldwork_operations::providers::{FileSystemDocuments, JsonCollectStore, LazyOnaFormService};
use fieldwork_operations::{CollectContext, Settings};
use tracing::debug;

use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Open a collect and publish its survey form
    Start {
        /// Commune the survey runs in
        #[arg(long)]
        commune: String,
        /// Distinguishes collects in the same commune
        #[arg(long)]
        suffix: String,
    },
    /// Close field collection and publish the scan form
    End { collect: CollectId },
    /// Reconcile scans and export data and medias
    Finalize { collect: CollectId },
    /// Take an ended collect back to field collection
    Reopen { collect: CollectId },
    /// Move a collect to its next status
    Upgrade { collect: CollectId },
    /// Undo the transition that produced the current status
    Downgrade { collect: CollectId },
    /// Move a collect to a status, one step at a time
    Transform {
        collect: CollectId,
        #[arg(value_enum)]
        status: CollectStatus,
    },
    /// Show a collect
    Status { collect: CollectId },
    /// List collects
    List,
}

impl Commands {
    /// Whether the command talks to the form service.
    fn uses_server(&self) -> bool {
        !matches!(self, Self::Status { .. } | Self::List)
    }

    pub(crate) fn execute(self, config: &Path) -> Result<()> {
        let ops = operations(config, self.uses_server())?;
        match self {
            Self::Start { commune, suffix } => transition::start(&ops, commune, suffix),
            Self::End { collect } => transition::end(&ops, collect),
            Self::Finalize { collect } => transition::finalize(&ops, collect),
            Self::Reopen { collect } => transition::reopen(&ops, collect),
            Self::Upgrade { collect } => transition::upgrade(&ops, collect),
            Self::Downgrade { collect } => transition::downgrade(&ops, collect),
            Self::Transform { collect, status } => transition::transform(&ops, collect, status),
            Self::Status { collect } => inspect::status(&ops, collect),
            Self::List => inspect::list(&ops),
        }
    }
}

fn operations(config: &Path, uses_server: bool) -> Result<CollectOperations> {
    let settings = Settings::load(config)?;
    debug!(config = %config.display(), server = %settings.server.url, "settings loaded");

    let forms = Arc::new(LazyOnaFormService::new(settings.clone()));
    if uses_server {
        forms.connect()?;
    }
    let store = Arc::new(JsonCollectStore::new(&settings.storage.data_dir));
    let documents = Arc::new(FileSystemDocuments::new(
        &settings.storage.documents_dir,
        settings.forms.clone(),
    ));
    let guard = TransitionGuard::with_lock_dir(&settings.storage.locks_dir());
    Ok(CollectOperations::with_guard(
        CollectContext::new(forms, store, documents, settings),
        guard,
    ))
}

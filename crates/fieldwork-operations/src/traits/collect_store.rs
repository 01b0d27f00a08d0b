use fieldwork_core::{Collect, CollectId, NewCollect, Target};

use crate::Result;

/// Persistence of collects and their targets.
///
/// Calls are synchronous and immediately consistent: a read after a write
/// sees the write.
pub trait CollectStore: Send + Sync {
    /// Persist a new collect with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collect cannot be written.
    fn create_collect(&self, new: &NewCollect) -> Result<Collect>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_collect(&self, id: CollectId) -> Result<Option<Collect>>;

    /// # Errors
    ///
    /// Returns an error if the collect does not exist or cannot be written.
    fn save_collect(&self, collect: &Collect) -> Result<()>;

    /// Delete a collect and its targets. Deleting a missing collect is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_collect(&self, id: CollectId) -> Result<()>;

    /// All collects, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_collects(&self) -> Result<Vec<Collect>>;

    /// Targets of a collect, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn targets(&self, collect: CollectId) -> Result<Vec<Target>>;

    /// # Errors
    ///
    /// Returns an error if the collect does not exist or cannot be written.
    fn create_target(&self, target: &Target) -> Result<()>;

    /// Replace a target, matched by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not exist or cannot be written.
    fn save_target(&self, target: &Target) -> Result<()>;

    /// Delete every target of a collect.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_targets(&self, collect: CollectId) -> Result<()>;

    /// Whether any collect has a target with this identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn target_exists(&self, identifier: &str) -> Result<bool>;
}

use std::path::Path;

use fieldwork_core::{Collect, FormDefinition, FormKind, Target};

use crate::Result;

/// Generates form definitions and documents, and stores files.
///
/// Paths are relative to the store's root.
pub trait DocumentStore: Send + Sync {
    /// Render the definition of a form ready to be uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read.
    fn generate_form(&self, kind: FormKind, form_id: &str, title: &str) -> Result<FormDefinition>;

    /// Render the survey sheet of a target.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be rendered.
    fn generate_document(&self, collect: &Collect, target: &Target) -> Result<Vec<u8>>;

    /// Extension of the files [`generate_document`](Self::generate_document)
    /// produces, without the dot.
    fn document_extension(&self) -> &'static str;

    /// Write a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Remove a file. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    fn delete_file(&self, path: &Path) -> Result<bool>;
}

use fieldwork_core::{Attachment, FormDefinition, FormId, MediaId, Submission};

use crate::Result;

/// Remote service hosting the forms enumerators fill in.
///
/// Every call blocks until the service answered. Failures are reported
/// as they come; nothing is retried.
pub trait FormService: Send + Sync {
    /// Upload a form definition and return its remote key.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the form.
    fn create_form(&self, definition: &FormDefinition) -> Result<FormId>;

    /// Stop accepting submissions for a form.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn disable_form(&self, form: FormId) -> Result<()>;

    /// Accept submissions for a form again.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn enable_form(&self, form: FormId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn delete_form(&self, form: FormId) -> Result<()>;

    /// All submissions received by a form.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails or answers garbage.
    fn fetch_submissions(&self, form: FormId) -> Result<Vec<Submission>>;

    /// Attach a media file to a form.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is rejected.
    fn upload_media(&self, form: FormId, file_name: &str, content: &[u8]) -> Result<MediaId>;

    /// Look an attached media up by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn find_media(&self, form: FormId, file_name: &str) -> Result<Option<MediaId>>;

    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn delete_media(&self, form: FormId, media: MediaId) -> Result<()>;

    /// Let `user` submit to the form with `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn grant_access(&self, form: FormId, user: &str, role: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the service call fails.
    fn revoke_access(&self, form: FormId, user: &str) -> Result<()>;

    /// Download the content of a submission attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be downloaded.
    fn fetch_media(&self, attachment: &Attachment) -> Result<Vec<u8>>;
}

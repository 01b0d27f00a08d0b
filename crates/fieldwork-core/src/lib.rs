//! Domain model of a social survey collect: the collect itself, its
//! targets, the submissions they come from and the forms they are
//! collected with.

pub mod collect;
pub mod error;
pub mod form;
pub mod itemsets;
pub mod submission;
pub mod target;

pub use collect::{Collect, CollectId, CollectStatus, NewCollect};
pub use error::{CoreError, Result};
pub use form::{FormDefinition, FormId, FormKind, MediaId};
pub use itemsets::{itemsets_csv, ITEMSETS_FILE_NAME};
pub use submission::{media_totals, Attachment, Submission, ATTACHMENTS_KEY};
pub use target::{
    random_identifier, reconcile_scans, reset_scans, unused_identifier, Gender, Target,
    IDENTIFIER_LEN,
};

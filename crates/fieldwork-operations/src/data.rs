//! Values exchanged between the tasks of a collect transition.

use fieldwork_core::{CollectId, FormDefinition, FormId, MediaId, NewCollect, Submission};
use fieldwork_saga::TaskData;

use crate::Result;
use crate::error::OperationError;

/// What the operator submitted to open a collect.
pub const FORM: &str = "form";
/// The collect a transition works on.
pub const COLLECT: &str = "collect";
/// A generated form definition, before upload.
pub const XFORM: &str = "xform";
/// Submissions downloaded from a form.
pub const DATA: &str = "data";
/// The targets choice list, as CSV.
pub const ITEMSETS: &str = "itemsets";
/// Media attached to the scan form.
pub const UPLOADED_MEDIA: &str = "uploaded_media";
/// A form created on the server by this run.
pub const UPLOADED_FORM: &str = "uploaded_form";
/// A form deleted from the server by this run.
pub const DELETED_FORM: &str = "deleted_form";

#[derive(Debug, Clone, PartialEq)]
pub enum CollectValue {
    NewCollect(NewCollect),
    Collect(CollectId),
    Submissions(Vec<Submission>),
    Form(FormDefinition),
    Itemsets(String),
    Media(MediaId),
    RemoteForm(FormId),
}

pub type CollectData = TaskData<CollectValue>;

/// Seed inputs of every transition of an existing collect.
#[must_use]
pub fn seed(collect: CollectId) -> CollectData {
    TaskData::new().with(COLLECT, CollectValue::Collect(collect))
}

fn missing(key: &'static str) -> OperationError {
    OperationError::MissingValue { key }
}

/// # Errors
///
/// Returns `OperationError::MissingValue` if the key is absent or holds
/// something else.
pub fn new_collect(data: &CollectData) -> Result<&NewCollect> {
    match data.get(FORM) {
        Some(CollectValue::NewCollect(new)) => Ok(new),
        _ => Err(missing(FORM)),
    }
}

/// # Errors
///
/// Returns `OperationError::MissingValue` if the key is absent or holds
/// something else.
pub fn collect_id(data: &CollectData) -> Result<CollectId> {
    match data.get(COLLECT) {
        Some(CollectValue::Collect(id)) => Ok(*id),
        _ => Err(missing(COLLECT)),
    }
}

/// # Errors
///
/// Returns `OperationError::MissingValue` if the key is absent or holds
/// something else.
pub fn submissions(data: &CollectData) -> Result<&[Submission]> {
    match data.get(DATA) {
        Some(CollectValue::Submissions(submissions)) => Ok(submissions),
        _ => Err(missing(DATA)),
    }
}

/// # Errors
///
/// Returns `OperationError::MissingValue` if the key is absent or holds
/// something else.
pub fn xform(data: &CollectData) -> Result<&FormDefinition> {
    match data.get(XFORM) {
        Some(CollectValue::Form(form)) => Ok(form),
        _ => Err(missing(XFORM)),
    }
}

/// # Errors
///
/// Returns `OperationError::MissingValue` if the key is absent or holds
/// something else.
pub fn itemsets(data: &CollectData) -> Result<&str> {
    match data.get(ITEMSETS) {
        Some(CollectValue::Itemsets(csv)) => Ok(csv),
        _ => Err(missing(ITEMSETS)),
    }
}

/// The uploaded media, if this run uploaded one.
#[must_use]
pub fn uploaded_media(data: &CollectData) -> Option<MediaId> {
    match data.get(UPLOADED_MEDIA) {
        Some(CollectValue::Media(id)) => Some(*id),
        _ => None,
    }
}

/// The server form stored under `key`, if this run recorded one.
#[must_use]
pub fn remote_form(data: &CollectData, key: &str) -> Option<FormId> {
    match data.get(key) {
        Some(CollectValue::RemoteForm(id)) => Some(*id),
        _ => None,
    }
}

/// The collect id, from the inputs or from what a task put in its output.
#[must_use]
pub fn any_collect_id(inputs: &CollectData, output: &CollectData) -> Option<CollectId> {
    collect_id(output).or_else(|_| collect_id(inputs)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_holds_the_collect() {
        let data = seed(CollectId(4));

        assert_eq!(collect_id(&data).expect("seeded"), CollectId(4));
    }

    #[test]
    fn wrong_kind_is_reported_as_missing() {
        let data = TaskData::new().with(COLLECT, CollectValue::Media(MediaId(1)));

        let err = collect_id(&data).expect_err("not a collect");

        assert!(matches!(err, OperationError::MissingValue { key: COLLECT }));
    }

    #[test]
    fn output_collect_wins_over_input() {
        let inputs = seed(CollectId(1));
        let output = seed(CollectId(2));

        assert_eq!(any_collect_id(&inputs, &output), Some(CollectId(2)));
        assert_eq!(any_collect_id(&inputs, &TaskData::new()), Some(CollectId(1)));
        assert_eq!(any_collect_id(&TaskData::new(), &TaskData::new()), None);
    }

    #[test]
    fn remote_form_is_read_from_its_own_key() {
        let data = TaskData::new().with(UPLOADED_FORM, CollectValue::RemoteForm(FormId(8)));

        assert_eq!(remote_form(&data, UPLOADED_FORM), Some(FormId(8)));
        assert_eq!(remote_form(&data, DELETED_FORM), None);
    }
}

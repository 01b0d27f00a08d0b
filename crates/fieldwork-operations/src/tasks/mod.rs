//! The tasks of every collect transition, grouped by transition.
//!
//! Reverts never assume the forward action ran in this process: each one
//! reloads the collect and only undoes what it finds.

pub mod end;
pub mod finalize;
pub mod reopen;
pub mod start;

use chrono::{Datelike, Utc};
use fieldwork_core::{
    Collect, FormDefinition, FormId, FormKind, Submission, Target, media_totals, unused_identifier,
};
use fieldwork_saga::{TaskCollection, TaskPlan};
use tracing::{debug, info};

use crate::Result;
use crate::context::CollectContext;
use crate::data::{self, CollectData, CollectValue, UPLOADED_FORM, collect_id};
use crate::error::OperationError;

pub type CollectPlan = TaskPlan<CollectContext, CollectValue, OperationError>;
pub type CollectCollection = TaskCollection<CollectContext, CollectValue, OperationError>;

/// The collect named by the inputs, if it still exists.
fn existing_collect(ctx: &CollectContext, inputs: &CollectData) -> Result<Option<Collect>> {
    match collect_id(inputs) {
        Ok(id) => ctx.store().load_collect(id),
        Err(_) => Ok(None),
    }
}

fn input_collect(ctx: &CollectContext, inputs: &CollectData) -> Result<Collect> {
    ctx.collect(collect_id(inputs)?)
}

fn form_slot(collect: &mut Collect, kind: FormKind) -> &mut Option<FormId> {
    match kind {
        FormKind::Survey => &mut collect.form_pk,
        FormKind::Scan => &mut collect.scan_form_pk,
    }
}

/// Upload `form` and record its key on the collect.
///
/// The key is in `output` before the collect is saved, so the form can be
/// deleted even when the save fails.
fn upload_form(
    ctx: &CollectContext,
    collect: &mut Collect,
    kind: FormKind,
    form: &FormDefinition,
    output: &mut CollectData,
) -> Result<()> {
    let form_pk = ctx.forms().create_form(form)?;
    info!(collect = %collect.id, form = %form_pk, %kind, "form uploaded");
    output.insert(UPLOADED_FORM, CollectValue::RemoteForm(form_pk));
    *form_slot(collect, kind) = Some(form_pk);
    ctx.store().save_collect(collect)
}

/// Delete a form uploaded by [`upload_form`] and clear its key.
///
/// The form comes from `output` when this run uploaded it, from the stored
/// collect on a cold revert.
fn delete_uploaded_form(
    ctx: &CollectContext,
    inputs: &CollectData,
    output: &mut CollectData,
    kind: FormKind,
) -> Result<()> {
    let mut collect = existing_collect(ctx, inputs)?;
    let stored = collect.as_mut().and_then(|c| *form_slot(c, kind));
    if let Some(form_pk) = data::remote_form(output, UPLOADED_FORM).or(stored) {
        ctx.forms().delete_form(form_pk)?;
        info!(form = %form_pk, %kind, "form deleted");
    }
    if let Some(collect) = collect.as_mut().filter(|_| stored.is_some()) {
        *form_slot(collect, kind) = None;
        ctx.store().save_collect(collect)?;
    }
    output.release(UPLOADED_FORM);
    Ok(())
}

/// Create one target per survey submission and fill the survey counters.
fn populate_targets(
    ctx: &CollectContext,
    collect: &mut Collect,
    submissions: &[Submission],
) -> Result<()> {
    let year = Utc::now().year();
    for submission in submissions {
        let identifier = unused_identifier(submissions.len(), |candidate| {
            ctx.store().target_exists(candidate)
        })?;
        let target = Target::from_submission(collect.id, identifier, submission, year)?;
        debug!(collect = %collect.id, target = %target, "creating target");
        ctx.store().create_target(&target)?;
    }

    let attachments: Vec<_> = submissions.iter().flat_map(Submission::attachments).collect();
    let (count, size) = media_totals(&attachments);
    collect.nb_submissions = Some(submissions.len() as u64);
    collect.nb_medias = Some(count);
    collect.medias_size = Some(size);
    ctx.store().save_collect(collect)
}

/// Delete the targets of a collect and clear the survey counters.
fn clear_targets(ctx: &CollectContext, collect: &mut Collect) -> Result<()> {
    ctx.store().delete_targets(collect.id)?;
    collect.reset_survey_counters();
    ctx.store().save_collect(collect)
}

fn write_target_documents(ctx: &CollectContext, collect: &Collect) -> Result<()> {
    for target in ctx.targets(collect.id)? {
        let content = ctx.documents().generate_document(collect, &target)?;
        ctx.documents()
            .write_file(&ctx.target_document_path(collect, &target), &content)?;
    }
    Ok(())
}

fn remove_target_documents(ctx: &CollectContext, collect: &Collect) -> Result<()> {
    for target in ctx.targets(collect.id)? {
        ctx.documents()
            .delete_file(&ctx.target_document_path(collect, &target))?;
    }
    Ok(())
}

//! Take an ended collect back to field collection.
//!
//! Runs forward rather than as a cold revert of the end transition: the
//! scan form, its choice list and the targets are torn down explicitly,
//! and each revert rebuilds what the reverts running after it rely on.

use chrono::Utc;
use fieldwork_core::{CollectStatus, FormKind, ITEMSETS_FILE_NAME, itemsets_csv};
use fieldwork_saga::{Task, TaskPlan};
use tracing::{info, warn};

use super::{
    CollectPlan, clear_targets, existing_collect, input_collect, populate_targets,
    remove_target_documents, upload_form, write_target_documents,
};
use crate::Result;
use crate::context::CollectContext;
use crate::data::{self, COLLECT, CollectData, CollectValue, DELETED_FORM, UPLOADED_FORM};
use crate::error::OperationError;

#[must_use]
pub fn plan() -> CollectPlan {
    TaskPlan::builder("reopen_collect")
        .task(ReEnableSurveyForm)
        .task(DetachItemsetsFromScanForm)
        .task(UnshareScanForm)
        .task(DeleteScanForm)
        .task(RemoveTargetDocuments)
        .task(ResetSurveyData)
        .task(MarkCollectStarted)
        .build()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReEnableSurveyForm;

impl Task for ReEnableSurveyForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "re_enable_survey_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form_pk = collect.form_pk.ok_or(OperationError::MissingForm {
            collect: collect.id,
            kind: FormKind::Survey,
        })?;
        ctx.forms().enable_form(form_pk)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.form_pk) {
            ctx.forms().disable_form(form_pk)?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "stop accepting survey submissions".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DetachItemsetsFromScanForm;

impl Task for DetachItemsetsFromScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "detach_itemsets_from_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let Some(form_pk) = collect.scan_form_pk else {
            return Ok(());
        };
        if let Some(media) = ctx.forms().find_media(form_pk, ITEMSETS_FILE_NAME)? {
            ctx.forms().delete_media(form_pk, media)?;
        }
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let Some(collect) = existing_collect(ctx, inputs)? else {
            return Ok(());
        };
        let Some(form_pk) = collect.scan_form_pk else {
            return Ok(());
        };
        if ctx.forms().find_media(form_pk, ITEMSETS_FILE_NAME)?.is_none() {
            let csv = itemsets_csv(&ctx.targets(collect.id)?);
            ctx.forms()
                .upload_media(form_pk, ITEMSETS_FILE_NAME, csv.as_bytes())?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "attach the targets choice list to the scan form again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnshareScanForm;

impl Task for UnshareScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "unshare_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = input_collect(ctx, inputs)?.scan_form_pk {
            ctx.forms()
                .revoke_access(form_pk, &ctx.settings().agent.username)?;
        }
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.scan_form_pk) {
            let agent = &ctx.settings().agent;
            ctx.forms().grant_access(form_pk, &agent.username, &agent.role)?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "share the scan form with the agent again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteScanForm;

impl Task for DeleteScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        if let Some(form_pk) = collect.scan_form_pk.take() {
            ctx.forms().delete_form(form_pk)?;
            info!(collect = %collect.id, form = %form_pk, "scan form deleted");
            output.insert(DELETED_FORM, CollectValue::RemoteForm(form_pk));
            ctx.store().save_collect(&collect)?;
        }
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let Some(mut collect) = existing_collect(ctx, inputs)? else {
            return Ok(());
        };
        // a key still stored after a failed save points at the deleted form
        let deleted = data::remote_form(output, DELETED_FORM);
        if collect.scan_form_pk.is_some() && collect.scan_form_pk != deleted {
            return Ok(());
        }
        let form = ctx.documents().generate_form(
            FormKind::Scan,
            &collect.scan_form_id(),
            &collect.scan_form_title(),
        )?;
        let mut uploaded = CollectData::new();
        if let Err(err) = upload_form(ctx, &mut collect, FormKind::Scan, &form, &mut uploaded) {
            if let Some(form_pk) = data::remote_form(&uploaded, UPLOADED_FORM) {
                if let Err(cleanup) = ctx.forms().delete_form(form_pk) {
                    warn!(form = %form_pk, error = %cleanup, "could not delete the scan form uploaded again");
                }
            }
            return Err(err);
        }
        output.release(DELETED_FORM);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "generate and upload the scan form again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveTargetDocuments;

impl Task for RemoveTargetDocuments {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "remove_target_documents"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        remove_target_documents(ctx, &input_collect(ctx, inputs)?)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(collect) => write_target_documents(ctx, &collect),
            None => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "generate the target documents again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResetSurveyData;

impl Task for ResetSurveyData {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "reset_survey_data"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        clear_targets(ctx, &mut collect)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let Some(mut collect) = existing_collect(ctx, inputs)? else {
            return Ok(());
        };
        let Some(form_pk) = collect.form_pk else {
            return Ok(());
        };
        if !ctx.targets(collect.id)?.is_empty() {
            return Ok(());
        }
        // the submissions were released with the targets, fetch them again
        let submissions = ctx.forms().fetch_submissions(form_pk)?;
        populate_targets(ctx, &mut collect, &submissions)
    }

    fn revert_description(&self) -> String {
        "download the survey submissions and recreate the targets".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkCollectStarted;

impl Task for MarkCollectStarted {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "mark_collect_started"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        collect.change_status(CollectStatus::Started, Utc::now());
        ctx.store().save_collect(&collect)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(mut collect) if collect.status == CollectStatus::Started => {
                collect.change_status(CollectStatus::Ended, Utc::now());
                ctx.store().save_collect(&collect)
            }
            _ => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "move the collect back to ended".to_string()
    }
}

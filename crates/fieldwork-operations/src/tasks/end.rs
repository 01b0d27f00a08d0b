//! Close field collection: pull the survey submissions into targets, then
//! publish the scan form listing them.

use chrono::Utc;
use fieldwork_core::{CollectStatus, FormKind, ITEMSETS_FILE_NAME, itemsets_csv};
use fieldwork_saga::{Task, TaskPlan};
use tracing::info;

use super::{
    CollectPlan, clear_targets, delete_uploaded_form, existing_collect, input_collect,
    populate_targets, remove_target_documents, upload_form, write_target_documents,
};
use crate::Result;
use crate::context::CollectContext;
use crate::data::{
    self, COLLECT, CollectData, CollectValue, DATA, ITEMSETS, UPLOADED_FORM, UPLOADED_MEDIA, XFORM,
};
use crate::error::OperationError;

#[must_use]
pub fn plan() -> CollectPlan {
    TaskPlan::builder("end_collect")
        .task(DisableSurveyForm)
        .task(DownloadSurveyData)
        .task(AddSurveyDataToCollect)
        .task(GenerateTargetDocuments)
        .task(GenerateItemsets)
        .task(GenerateScanForm)
        .task(UploadScanForm)
        .task(ShareScanForm)
        .task(AttachItemsetsToScanForm)
        .task(MarkCollectEnded)
        .build()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisableSurveyForm;

impl Task for DisableSurveyForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "disable_survey_form"
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
        ctx.forms().disable_form(form_pk)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.form_pk) {
            ctx.forms().enable_form(form_pk)?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "accept survey submissions again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadSurveyData;

impl Task for DownloadSurveyData {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "download_survey_data"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[DATA]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form_pk = collect.form_pk.ok_or(OperationError::MissingForm {
            collect: collect.id,
            kind: FormKind::Survey,
        })?;
        let submissions = ctx.forms().fetch_submissions(form_pk)?;
        info!(collect = %collect.id, count = submissions.len(), "survey submissions downloaded");
        output.insert(DATA, CollectValue::Submissions(submissions));
        Ok(())
    }

    fn revert(&self, _ctx: &CollectContext, _inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        output.release(DATA);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "release the downloaded survey submissions".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddSurveyDataToCollect;

impl Task for AddSurveyDataToCollect {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "add_survey_data_to_collect"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT, DATA]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        populate_targets(ctx, &mut collect, data::submissions(inputs)?)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(mut collect) => clear_targets(ctx, &mut collect),
            None => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "delete the targets and clear the survey counters".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateTargetDocuments;

impl Task for GenerateTargetDocuments {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "generate_target_documents"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        write_target_documents(ctx, &input_collect(ctx, inputs)?)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(collect) => remove_target_documents(ctx, &collect),
            None => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "remove the target documents".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateItemsets;

impl Task for GenerateItemsets {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "generate_itemsets"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[ITEMSETS]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let targets = ctx.targets(data::collect_id(inputs)?)?;
        output.insert(ITEMSETS, CollectValue::Itemsets(itemsets_csv(&targets)));
        Ok(())
    }

    fn revert(&self, _ctx: &CollectContext, _inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        output.release(ITEMSETS);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "release the targets choice list".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateScanForm;

impl Task for GenerateScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "generate_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[XFORM]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form = ctx.documents().generate_form(
            FormKind::Scan,
            &collect.scan_form_id(),
            &collect.scan_form_title(),
        )?;
        output.insert(XFORM, CollectValue::Form(form));
        Ok(())
    }

    fn revert(&self, _ctx: &CollectContext, _inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        output.release(XFORM);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "release the generated scan form".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadScanForm;

impl Task for UploadScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "upload_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT, XFORM]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[UPLOADED_FORM]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        upload_form(ctx, &mut collect, FormKind::Scan, data::xform(inputs)?, output)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        delete_uploaded_form(ctx, inputs, output, FormKind::Scan)
    }

    fn revert_description(&self) -> String {
        "delete the scan form from the server".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShareScanForm;

impl Task for ShareScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "share_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form_pk = collect.scan_form_pk.ok_or(OperationError::MissingForm {
            collect: collect.id,
            kind: FormKind::Scan,
        })?;
        let agent = &ctx.settings().agent;
        ctx.forms().grant_access(form_pk, &agent.username, &agent.role)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.scan_form_pk) {
            ctx.forms()
                .revoke_access(form_pk, &ctx.settings().agent.username)?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "revoke the agent's access to the scan form".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttachItemsetsToScanForm;

impl Task for AttachItemsetsToScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "attach_itemsets_to_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT, ITEMSETS]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[UPLOADED_MEDIA]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form_pk = collect.scan_form_pk.ok_or(OperationError::MissingForm {
            collect: collect.id,
            kind: FormKind::Scan,
        })?;
        let media = ctx.forms().upload_media(
            form_pk,
            ITEMSETS_FILE_NAME,
            data::itemsets(inputs)?.as_bytes(),
        )?;
        output.insert(UPLOADED_MEDIA, CollectValue::Media(media));
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.scan_form_pk) else {
            return Ok(());
        };
        // a cold revert has no output, so look the media up by name
        let media = match data::uploaded_media(output) {
            Some(media) => Some(media),
            None => ctx.forms().find_media(form_pk, ITEMSETS_FILE_NAME)?,
        };
        if let Some(media) = media {
            ctx.forms().delete_media(form_pk, media)?;
        }
        output.release(UPLOADED_MEDIA);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "remove the targets choice list from the scan form".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkCollectEnded;

impl Task for MarkCollectEnded {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "mark_collect_ended"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        collect.change_status(CollectStatus::Ended, Utc::now());
        ctx.store().save_collect(&collect)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(mut collect) if collect.status == CollectStatus::Ended => {
                collect.change_status(CollectStatus::Started, Utc::now());
                ctx.store().save_collect(&collect)
            }
            _ => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "move the collect back to started".to_string()
    }
}

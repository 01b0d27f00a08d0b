//! Close the scan form, reconcile its results with the targets and export
//! everything.

use chrono::Utc;
use fieldwork_core::{
    Collect, CollectStatus, FormId, FormKind, Target, reconcile_scans, reset_scans,
};
use fieldwork_saga::{Task, TaskPlan};
use serde::Serialize;
use tracing::{debug, info};

use super::{CollectPlan, existing_collect, input_collect};
use crate::Result;
use crate::context::{CollectContext, export_path, media_path};
use crate::data::{self, COLLECT, CollectData, CollectValue, DATA};
use crate::error::OperationError;

#[must_use]
pub fn plan() -> CollectPlan {
    TaskPlan::builder("finalize_collect")
        .task(DisableScanForm)
        .task(DownloadScanData)
        .task(AddScanDataToCollect)
        .task(ExportCollectData)
        .task(ExportCollectMedias)
        .task(MarkCollectFinalized)
        .build()
}

fn scan_form(collect: &Collect) -> Result<FormId> {
    collect.scan_form_pk.ok_or(OperationError::MissingForm {
        collect: collect.id,
        kind: FormKind::Scan,
    })
}

/// File name of an exported media; prefixed so targets cannot collide.
fn media_file_name(target: &Target, basename: &str) -> String {
    format!("{}_{basename}", target.identifier)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisableScanForm;

impl Task for DisableScanForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "disable_scan_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        ctx.forms().disable_form(scan_form(&collect)?)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(form_pk) = existing_collect(ctx, inputs)?.and_then(|c| c.scan_form_pk) {
            ctx.forms().enable_form(form_pk)?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "accept scan submissions again".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadScanData;

impl Task for DownloadScanData {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "download_scan_data"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[DATA]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let submissions = ctx.forms().fetch_submissions(scan_form(&collect)?)?;
        info!(collect = %collect.id, count = submissions.len(), "scan submissions downloaded");
        output.insert(DATA, CollectValue::Submissions(submissions));
        Ok(())
    }

    fn revert(&self, _ctx: &CollectContext, _inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        output.release(DATA);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "release the downloaded scan submissions".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddScanDataToCollect;

impl Task for AddScanDataToCollect {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "add_scan_data_to_collect"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT, DATA]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        let mut targets = ctx.targets(collect.id)?;
        reconcile_scans(&mut collect, &mut targets, data::submissions(inputs)?)?;
        for target in &targets {
            ctx.store().save_target(target)?;
        }
        info!(
            collect = %collect.id,
            indigents = collect.nb_indigents.unwrap_or_default(),
            "scan results reconciled"
        );
        ctx.store().save_collect(&collect)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let Some(mut collect) = existing_collect(ctx, inputs)? else {
            return Ok(());
        };
        let mut targets = ctx.targets(collect.id)?;
        reset_scans(&mut collect, &mut targets);
        for target in &targets {
            ctx.store().save_target(target)?;
        }
        ctx.store().save_collect(&collect)
    }

    fn revert_description(&self) -> String {
        "clear the reconciled scan results".to_string()
    }
}

#[derive(Serialize)]
struct CollectExport<'a> {
    collect: &'a Collect,
    targets: &'a [Target],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportCollectData;

impl Task for ExportCollectData {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "export_collect_data"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let targets = ctx.targets(collect.id)?;
        let content = serde_json::to_vec_pretty(&CollectExport {
            collect: &collect,
            targets: &targets,
        })?;
        ctx.documents().write_file(&export_path(&collect), &content)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        if let Some(collect) = existing_collect(ctx, inputs)? {
            ctx.documents().delete_file(&export_path(&collect))?;
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "remove the exported collect data".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportCollectMedias;

impl Task for ExportCollectMedias {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "export_collect_medias"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        for target in ctx.targets(collect.id)? {
            for attachment in target.attachments() {
                let content = ctx.forms().fetch_media(&attachment)?;
                let path = media_path(&collect, &media_file_name(&target, attachment.basename()));
                debug!(path = %path.display(), "exporting media");
                ctx.documents().write_file(&path, &content)?;
            }
        }
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let Some(collect) = existing_collect(ctx, inputs)? else {
            return Ok(());
        };
        for target in ctx.targets(collect.id)? {
            for attachment in target.attachments() {
                let path = media_path(&collect, &media_file_name(&target, attachment.basename()));
                ctx.documents().delete_file(&path)?;
            }
        }
        Ok(())
    }

    fn revert_description(&self) -> String {
        "remove the exported medias".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkCollectFinalized;

impl Task for MarkCollectFinalized {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "mark_collect_finalized"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        collect.change_status(CollectStatus::Finalized, Utc::now());
        ctx.store().save_collect(&collect)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, _output: &mut CollectData) -> Result<()> {
        match existing_collect(ctx, inputs)? {
            Some(mut collect) if collect.status == CollectStatus::Finalized => {
                // keep the original end date
                collect.status = CollectStatus::Ended;
                collect.finalized_on = None;
                ctx.store().save_collect(&collect)
            }
            _ => Ok(()),
        }
    }

    fn revert_description(&self) -> String {
        "move the collect back to ended".to_string()
    }
}

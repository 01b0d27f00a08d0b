//! Open a collect: record it, then publish its survey form.

use fieldwork_core::FormKind;
use fieldwork_saga::{Task, TaskPlan};
use tracing::info;

use super::{CollectPlan, delete_uploaded_form, input_collect, upload_form};
use crate::Result;
use crate::context::CollectContext;
use crate::data::{self, COLLECT, CollectData, CollectValue, FORM, UPLOADED_FORM, XFORM};
use crate::error::OperationError;

#[must_use]
pub fn plan() -> CollectPlan {
    TaskPlan::builder("start_collect")
        .task(CreateCollectInstance)
        .task(GenerateSurveyForm)
        .task(UploadSurveyForm)
        .build()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateCollectInstance;

impl Task for CreateCollectInstance {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_collect_instance"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[FORM]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = ctx.store().create_collect(data::new_collect(inputs)?)?;
        info!(collect = %collect.id, name = %collect.name(), "collect created");
        output.insert(COLLECT, CollectValue::Collect(collect.id));
        Ok(())
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        // a cold revert only has the collect in its inputs
        if let Some(id) = data::any_collect_id(inputs, output) {
            ctx.store().delete_collect(id)?;
            info!(collect = %id, "collect deleted");
        }
        output.release(COLLECT);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "delete the collect and its targets".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateSurveyForm;

impl Task for GenerateSurveyForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "generate_survey_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[XFORM]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let collect = input_collect(ctx, inputs)?;
        let form = ctx
            .documents()
            .generate_form(FormKind::Survey, &collect.form_id(), &collect.form_title())?;
        output.insert(XFORM, CollectValue::Form(form));
        Ok(())
    }

    fn revert(&self, _ctx: &CollectContext, _inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        output.release(XFORM);
        Ok(())
    }

    fn revert_description(&self) -> String {
        "release the generated survey form".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadSurveyForm;

impl Task for UploadSurveyForm {
    type Context = CollectContext;
    type Value = CollectValue;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "upload_survey_form"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &[COLLECT, XFORM]
    }

    fn required_outputs(&self) -> &[&'static str] {
        &[UPLOADED_FORM]
    }

    fn process(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        let mut collect = input_collect(ctx, inputs)?;
        upload_form(ctx, &mut collect, FormKind::Survey, data::xform(inputs)?, output)
    }

    fn revert(&self, ctx: &CollectContext, inputs: &CollectData, output: &mut CollectData) -> Result<()> {
        delete_uploaded_form(ctx, inputs, output, FormKind::Survey)
    }

    fn revert_description(&self) -> String {
        "delete the survey form from the server".to_string()
    }
}

//! Collect lifecycle driven end to end against in-memory collaborators.

mod common;

use std::path::PathBuf;

use common::Harness;
use fieldwork_core::{CollectStatus, ITEMSETS_FILE_NAME};
use fieldwork_operations::OperationError;
use fieldwork_saga::TaskStatus;

#[test]
fn start_publishes_the_survey_form() {
    let h = Harness::new();

    let id = h.started_with_submissions();

    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Started);
    let form = h.forms.form(h.survey_form(id)).expect("form on server");
    assert!(form.enabled);
    assert_eq!(form.definition.form_id, "enquete-sociale-1");
    assert_eq!(form.definition.title, "Enquête sociale Kati/2024");
}

#[test]
fn end_turns_submissions_into_targets_and_publishes_the_scan_form() {
    let h = Harness::new();
    let id = h.started_with_submissions();

    let outcome = h.ops.end(id).expect("end succeeds");

    assert_eq!(outcome.collection, "end_collect");
    assert_eq!(outcome.status, TaskStatus::Success);

    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Ended);
    assert!(collect.ended_on.is_some());
    assert_eq!(collect.nb_submissions, Some(2));
    assert_eq!(collect.nb_medias, Some(2));
    assert_eq!(collect.medias_size, Some(200));

    let targets = h.targets(id);
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.identifier.len() == fieldwork_core::IDENTIFIER_LEN));
    assert_ne!(targets[0].identifier, targets[1].identifier);

    let survey = h.forms.form(h.survey_form(id)).expect("survey form kept");
    assert!(!survey.enabled);

    let scan = h.forms.form(h.scan_form(id)).expect("scan form on server");
    assert_eq!(scan.definition.form_id, "scan-certificats-1");
    assert_eq!(scan.shared_with.get("agent").map(String::as_str), Some("dataentry"));
    let (name, csv) = scan.media.values().next().expect("itemsets attached");
    assert_eq!(name, ITEMSETS_FILE_NAME);
    let csv = String::from_utf8(csv.clone()).expect("utf-8 csv");
    assert!(csv.starts_with("ident,nom,age,sexe\r\n"));
    assert!(csv.contains("Awa TRAORE"));

    let ctx = h.ops.context();
    for target in &targets {
        assert!(h.documents.file(&ctx.target_document_path(&collect, target)).is_some());
    }
}

#[test]
fn finalize_reconciles_scans_and_exports_everything() {
    let h = Harness::new();
    let id = h.ended_with_scan();

    let outcome = h.ops.finalize(id).expect("finalize succeeds");

    assert_eq!(outcome.collection, "finalize_collect");
    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Finalized);
    assert!(collect.finalized_on.is_some());
    assert_eq!(collect.nb_indigents, Some(1));
    assert_eq!(collect.nb_non_indigents, Some(1));
    assert_eq!(collect.nb_medias, Some(3));
    assert_eq!(collect.medias_size, Some(250));

    let traore = h.target_named(id, "Traore");
    let diallo = h.target_named(id, "Diallo");
    assert_eq!(traore.is_indigent, Some(true));
    assert_eq!(traore.scan_attachments.len(), 1);
    assert_eq!(diallo.is_indigent, Some(false));

    assert!(!h.forms.form(h.scan_form(id)).expect("scan form kept").enabled);

    let export = h
        .documents
        .file(&PathBuf::from("enquete-sociale-1/enquete-sociale-1.json"))
        .expect("data exported");
    let export: serde_json::Value = serde_json::from_slice(&export).expect("valid json");
    assert_eq!(export["collect"]["id"], 1);
    assert_eq!(export["targets"].as_array().map(Vec::len), Some(2));

    let medias = PathBuf::from("enquete-sociale-1/medias");
    assert_eq!(
        h.documents.file(&medias.join(format!("{}_cert-1.jpg", traore.identifier))),
        Some(b"certificate".to_vec())
    );
    assert!(h.documents.file(&medias.join(format!("{}_photo-1.jpg", traore.identifier))).is_some());
    assert!(h.documents.file(&medias.join(format!("{}_photo-2.jpg", diallo.identifier))).is_some());
}

#[test]
fn reopen_brings_an_ended_collect_back_to_the_field() {
    let h = Harness::new();
    let id = h.ended();
    let survey_form = h.survey_form(id);
    let scan_form = h.scan_form(id);

    let outcome = h.ops.reopen(id).expect("reopen succeeds");

    assert_eq!(outcome.collection, "reopen_collect");
    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Started);
    assert_eq!(collect.ended_on, None);
    assert_eq!(collect.scan_form_pk, None);
    assert_eq!(collect.nb_submissions, None);
    assert!(h.targets(id).is_empty());
    assert!(h.documents.paths().is_empty());
    assert!(h.forms.form(scan_form).is_none());
    assert!(h.forms.form(survey_form).expect("survey form kept").enabled);

    h.ops.end(id).expect("end succeeds again");
    assert_eq!(h.targets(id).len(), 2);
    assert_eq!(h.collect(id).status, CollectStatus::Ended);
}

#[test]
fn downgrading_an_ended_collect_undoes_end() {
    let h = Harness::new();
    let id = h.ended();
    let scan_form = h.scan_form(id);

    let outcome = h.ops.downgrade(id).expect("downgrade succeeds");

    assert_eq!(outcome.collection, "end_collect");
    assert_eq!(outcome.status, TaskStatus::Reverted);
    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Started);
    assert_eq!(collect.scan_form_pk, None);
    assert_eq!(collect.nb_medias, None);
    assert!(h.targets(id).is_empty());
    assert!(h.documents.paths().is_empty());
    assert!(h.forms.form(scan_form).is_none());
    assert!(h.forms.form(h.survey_form(id)).expect("survey form kept").enabled);
}

#[test]
fn downgrading_a_finalized_collect_keeps_the_end_date() {
    let h = Harness::new();
    let id = h.finalized();
    let ended_on = h.collect(id).ended_on;

    h.ops.downgrade(id).expect("downgrade succeeds");

    let collect = h.collect(id);
    assert_eq!(collect.status, CollectStatus::Ended);
    assert_eq!(collect.ended_on, ended_on);
    assert_eq!(collect.finalized_on, None);
    assert_eq!(collect.nb_indigents, None);
    assert_eq!(collect.nb_medias, Some(2));
    assert!(h.targets(id).iter().all(|t| t.is_indigent.is_none()));
    assert!(h.forms.form(h.scan_form(id)).expect("scan form kept").enabled);

    // only the target documents written by end remain
    let paths = h.documents.paths();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.starts_with("enquete-sociale-1/targets")));
}

#[test]
fn downgrading_a_started_collect_deletes_it() {
    let h = Harness::new();
    let id = h.started_with_submissions();
    let form = h.survey_form(id);

    h.ops.downgrade(id).expect("downgrade succeeds");

    assert!(matches!(
        h.ops.status(id),
        Err(OperationError::CollectNotFound(missing)) if missing == id
    ));
    assert!(h.forms.form(form).is_none());
}

#[test]
fn transform_walks_one_status_at_a_time() {
    let h = Harness::new();
    let id = h.started_with_submissions();
    let scan_form_id = fieldwork_core::FormId(2);

    // the scan form is created by end, so the scan submission comes later
    let forward = h
        .ops
        .transform_to(id, CollectStatus::Ended)
        .expect("transform succeeds");
    assert_eq!(forward.len(), 1);
    assert_eq!(h.scan_form(id), scan_form_id);

    let ident = h.target_named(id, "Diallo").identifier;
    let scan = common::scan(&ident, "cert-2.jpg");
    for attachment in scan.attachments() {
        h.forms.host_file(&attachment, b"certificate");
    }
    h.forms.submit(scan_form_id, scan).expect("scan form exists");

    let forward = h
        .ops
        .transform_to(id, CollectStatus::Finalized)
        .expect("transform succeeds");
    assert_eq!(forward.len(), 1);
    assert_eq!(h.collect(id).status, CollectStatus::Finalized);

    let backward = h
        .ops
        .transform_to(id, CollectStatus::Started)
        .expect("transform succeeds");
    let collections: Vec<_> = backward.iter().map(|o| o.collection).collect();
    assert_eq!(collections, ["finalize_collect", "end_collect"]);
    assert_eq!(h.collect(id).status, CollectStatus::Started);

    assert!(h.ops.transform_to(id, CollectStatus::Started).expect("no-op").is_empty());
}

#[test]
fn status_and_list_report_collects() {
    let h = Harness::new();
    let finalized = h.finalized();
    let started = h.started_with_submissions();

    let summary = h.ops.status(finalized).expect("collect exists");
    assert_eq!(summary.targets, 2);
    assert_eq!(summary.label, CollectStatus::Finalized.label());

    let listing = h.ops.list().expect("store readable");
    assert_eq!(listing.active.iter().map(|c| c.id).collect::<Vec<_>>(), [started]);
    assert_eq!(listing.archived.iter().map(|c| c.id).collect::<Vec<_>>(), [finalized]);
}

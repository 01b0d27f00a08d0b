//! Lifecycle against the JSON store and filesystem documents.

mod common;

use std::fs;
use std::sync::Arc;

use fieldwork_core::{CollectStatus, NewCollect};
use fieldwork_operations::operations::{CollectOperations, TransitionGuard};
use fieldwork_operations::providers::{FileSystemDocuments, JsonCollectStore, MemoryFormService};
use fieldwork_operations::{CollectContext, OperationError, Settings};
use tempfile::TempDir;

fn operations(dir: &TempDir, forms: &Arc<MemoryFormService>) -> CollectOperations {
    let mut settings = Settings::default();
    settings.storage.data_dir = dir.path().join("data");
    settings.storage.documents_dir = dir.path().join("documents");
    let store = Arc::new(JsonCollectStore::new(&settings.storage.data_dir));
    let documents = Arc::new(FileSystemDocuments::new(
        &settings.storage.documents_dir,
        settings.forms.clone(),
    ));
    let guard = TransitionGuard::with_lock_dir(&settings.storage.locks_dir());
    CollectOperations::with_guard(
        CollectContext::new(forms.clone(), store, documents, settings),
        guard,
    )
}

#[test]
fn ended_collect_survives_a_restart() {
    let dir = TempDir::new().expect("create temp dir");
    let forms = Arc::new(MemoryFormService::new());

    let id = {
        let ops = operations(&dir, &forms);
        let outcome = ops
            .start(NewCollect {
                commune: "Kati".to_string(),
                suffix: "2024".to_string(),
            })
            .expect("start succeeds");
        let form = ops
            .context()
            .collect(outcome.collect)
            .expect("collect stored")
            .form_pk
            .expect("survey form uploaded");
        forms
            .submit(form, common::survey("Traore", "awa", "photo-1.jpg"))
            .expect("form exists");
        ops.end(outcome.collect).expect("end succeeds");
        outcome.collect
    };

    let ops = operations(&dir, &forms);
    let summary = ops.status(id).expect("collect reloaded");
    assert_eq!(summary.collect.status, CollectStatus::Ended);
    assert_eq!(summary.targets, 1);

    let target = &ops.context().targets(id).expect("targets stored")[0];
    let sheet = dir
        .path()
        .join("documents/enquete-sociale-1/targets")
        .join(format!("{}.txt", target.fname()));
    let sheet = fs::read_to_string(sheet).expect("sheet written");
    assert!(sheet.contains(&format!("Identifiant : {}", target.identifier)));

    let form = forms
        .form(summary.collect.scan_form_pk.expect("scan form uploaded"))
        .expect("scan form on server");
    assert!(String::from_utf8_lossy(&form.definition.content).contains("scan-certificats-1"));
}

#[test]
fn downgrading_a_started_collect_removes_its_file() {
    let dir = TempDir::new().expect("create temp dir");
    let forms = Arc::new(MemoryFormService::new());
    let ops = operations(&dir, &forms);
    let outcome = ops
        .start(NewCollect {
            commune: "Kati".to_string(),
            suffix: "2024".to_string(),
        })
        .expect("start succeeds");

    ops.downgrade(outcome.collect).expect("downgrade succeeds");

    assert!(!dir.path().join("data/collects/1.json").exists());
    assert!(ops.list().expect("store readable").active.is_empty());
}

#[test]
fn transitions_are_exclusive_across_instances_sharing_a_store() {
    let dir = TempDir::new().expect("create temp dir");
    let forms = Arc::new(MemoryFormService::new());
    let first = operations(&dir, &forms);
    let second = operations(&dir, &forms);
    let id = first
        .start(NewCollect {
            commune: "Kati".to_string(),
            suffix: "2024".to_string(),
        })
        .expect("start succeeds")
        .collect;

    let running = first.guard().acquire(id).expect("guard free");
    assert!(matches!(
        second.end(id),
        Err(OperationError::TransitionInProgress(busy)) if busy == id
    ));
    assert_eq!(second.status(id).expect("collect readable").collect.status, CollectStatus::Started);

    drop(running);
    second.end(id).expect("end succeeds once the lock is released");
    assert_eq!(first.status(id).expect("collect readable").collect.status, CollectStatus::Ended);
    assert!(!dir.path().join("data/locks").join(format!("{id}.lock")).exists());
}

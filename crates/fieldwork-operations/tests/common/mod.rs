#![allow(dead_code)]

use std::sync::Arc;

use fieldwork_core::{Attachment, Collect, CollectId, FormId, NewCollect, Submission, Target};
use fieldwork_operations::operations::CollectOperations;
use fieldwork_operations::providers::{MemoryCollectStore, MemoryDocuments, MemoryFormService};
use fieldwork_operations::{CollectContext, Settings};
use serde_json::json;

pub struct Harness {
    pub forms: Arc<MemoryFormService>,
    pub store: Arc<MemoryCollectStore>,
    pub documents: Arc<MemoryDocuments>,
    pub ops: CollectOperations,
}

impl Harness {
    pub fn new() -> Self {
        let forms = Arc::new(MemoryFormService::new());
        let store = Arc::new(MemoryCollectStore::new());
        let documents = Arc::new(MemoryDocuments::new());
        let ctx = CollectContext::new(
            forms.clone(),
            store.clone(),
            documents.clone(),
            Settings::default(),
        );
        Self {
            forms,
            store,
            documents,
            ops: CollectOperations::new(ctx),
        }
    }

    pub fn collect(&self, id: CollectId) -> Collect {
        self.ops.context().collect(id).expect("collect exists")
    }

    pub fn targets(&self, id: CollectId) -> Vec<Target> {
        self.ops.context().targets(id).expect("targets readable")
    }

    pub fn target_named(&self, id: CollectId, last_name: &str) -> Target {
        self.targets(id)
            .into_iter()
            .find(|target| target.last_name == last_name)
            .expect("target exists")
    }

    /// A started collect with two survey submissions waiting.
    pub fn started_with_submissions(&self) -> CollectId {
        let outcome = self
            .ops
            .start(NewCollect {
                commune: "Kati".to_string(),
                suffix: "2024".to_string(),
            })
            .expect("start succeeds");
        let form = self.survey_form(outcome.collect);
        for (last, first, photo) in [("Traore", "awa", "photo-1.jpg"), ("Diallo", "moussa", "photo-2.jpg")] {
            let submission = survey(last, first, photo);
            for attachment in submission.attachments() {
                self.forms.host_file(&attachment, photo.as_bytes());
            }
            self.forms.submit(form, submission).expect("form exists");
        }
        outcome.collect
    }

    pub fn ended(&self) -> CollectId {
        let id = self.started_with_submissions();
        self.ops.end(id).expect("end succeeds");
        id
    }

    /// An ended collect whose scan form certifies `Traore`.
    pub fn ended_with_scan(&self) -> CollectId {
        let id = self.ended();
        let ident = self.target_named(id, "Traore").identifier;
        let scan = scan(&ident, "cert-1.jpg");
        for attachment in scan.attachments() {
            self.forms.host_file(&attachment, b"certificate");
        }
        self.forms
            .submit(self.scan_form(id), scan)
            .expect("scan form exists");
        id
    }

    pub fn finalized(&self) -> CollectId {
        let id = self.ended_with_scan();
        self.ops.finalize(id).expect("finalize succeeds");
        id
    }

    pub fn survey_form(&self, id: CollectId) -> FormId {
        self.collect(id).form_pk.expect("survey form uploaded")
    }

    pub fn scan_form(&self, id: CollectId) -> FormId {
        self.collect(id).scan_form_pk.expect("scan form uploaded")
    }
}

pub fn survey(last: &str, first: &str, photo: &str) -> Submission {
    serde_json::from_value(json!({
        "enquete/nom": last,
        "enquete/prenoms": first,
        "enquete/sexe": "masculin",
        "enquete/type-naissance": "annee",
        "enquete/annee-naissance": 1960,
        "localisation-enquete/lieu_region": "Koulikoro",
        "localisation-enquete/lieu_cercle": "Kati",
        "localisation-enquete/lieu_commune": "Kati",
        "localisation-enquete/lieu_village": "Sanankoroba",
        "_attachments": [attachment(&format!("enqueteur/attachments/{photo}"), 100)],
    }))
    .expect("valid submission")
}

pub fn scan(ident: &str, certificate: &str) -> Submission {
    serde_json::from_value(json!({
        "ident": ident,
        "_attachments": [attachment(&format!("agent/attachments/{certificate}"), 50)],
    }))
    .expect("valid submission")
}

fn attachment(filename: &str, filesize: u64) -> serde_json::Value {
    serde_json::to_value(Attachment {
        filename: filename.to_string(),
        download_url: None,
        mimetype: Some("image/jpeg".to_string()),
        filesize,
    })
    .expect("serializable attachment")
}

//! In-memory collaborators with failure injection, for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use fieldwork_core::{
    Attachment, Collect, CollectId, FormDefinition, FormId, FormKind, MediaId, NewCollect,
    Submission, Target,
};

use crate::Result;
use crate::error::OperationError;
use crate::traits::{CollectStore, DocumentStore, FormService};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
enum Arm {
    /// Let this many calls through, then fail every other one.
    SucceedFirst(usize),
    /// Fail this many calls, then heal.
    FailNext(usize),
}

/// Records every call by operation name and fails the ones armed to fail.
#[derive(Debug, Default)]
pub struct Faults {
    armed: Mutex<HashMap<String, Arm>>,
    calls: Mutex<Vec<String>>,
}

impl Faults {
    /// Fail every call to `operation` from now on.
    pub fn fail_on(&self, operation: &str) {
        self.fail_after(operation, 0);
    }

    /// Let `successes` calls to `operation` through, then fail the others.
    pub fn fail_after(&self, operation: &str, successes: usize) {
        lock(&self.armed).insert(operation.to_string(), Arm::SucceedFirst(successes));
    }

    /// Fail the next `failures` calls to `operation`, then let it through.
    pub fn fail_next(&self, operation: &str, failures: usize) {
        if failures == 0 {
            self.heal(operation);
        } else {
            lock(&self.armed).insert(operation.to_string(), Arm::FailNext(failures));
        }
    }

    /// Stop failing `operation`.
    pub fn heal(&self, operation: &str) {
        lock(&self.armed).remove(operation);
    }

    /// Every operation called so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == operation).count()
    }

    fn check(&self, operation: &str) -> Result<()> {
        lock(&self.calls).push(operation.to_string());
        let mut armed = lock(&self.armed);
        let Some(arm) = armed.get(operation).copied() else {
            return Ok(());
        };
        let (next, fail) = match arm {
            Arm::SucceedFirst(0) => (Some(arm), true),
            Arm::SucceedFirst(n) => (Some(Arm::SucceedFirst(n - 1)), false),
            Arm::FailNext(n) => (Some(Arm::FailNext(n - 1)).filter(|_| n > 1), true),
        };
        match next {
            Some(arm) => armed.insert(operation.to_string(), arm),
            None => armed.remove(operation),
        };
        if fail {
            Err(OperationError::Injected(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

fn not_found(what: impl std::fmt::Display) -> OperationError {
    OperationError::FormService {
        status: 404,
        message: format!("{what} not found"),
    }
}

/// A form held by [`MemoryFormService`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryForm {
    pub definition: FormDefinition,
    pub enabled: bool,
    /// User name to role.
    pub shared_with: BTreeMap<String, String>,
    /// Attached media by id.
    pub media: BTreeMap<MediaId, (String, Vec<u8>)>,
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Default)]
struct FormState {
    next_id: u64,
    forms: BTreeMap<FormId, MemoryForm>,
    files: HashMap<String, Vec<u8>>,
}

impl FormState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn form_mut(&mut self, form: FormId) -> Result<&mut MemoryForm> {
        self.forms.get_mut(&form).ok_or_else(|| not_found(format!("form {form}")))
    }
}

/// Form service keeping forms, submissions and media in memory.
#[derive(Debug, Default)]
pub struct MemoryFormService {
    state: Mutex<FormState>,
    faults: Faults,
}

impl MemoryFormService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Receive a submission on `form`, as an enumerator would send it.
    ///
    /// # Errors
    ///
    /// Returns a 404 `OperationError::FormService` if the form does not
    /// exist.
    pub fn submit(&self, form: FormId, submission: Submission) -> Result<()> {
        lock(&self.state).form_mut(form)?.submissions.push(submission);
        Ok(())
    }

    /// Make a file downloadable by [`FormService::fetch_media`].
    pub fn host_file(&self, attachment: &Attachment, content: &[u8]) {
        lock(&self.state)
            .files
            .insert(attachment.filename.clone(), content.to_vec());
    }

    #[must_use]
    pub fn form(&self, form: FormId) -> Option<MemoryForm> {
        lock(&self.state).forms.get(&form).cloned()
    }

    #[must_use]
    pub fn form_ids(&self) -> Vec<FormId> {
        lock(&self.state).forms.keys().copied().collect()
    }
}

impl FormService for MemoryFormService {
    fn create_form(&self, definition: &FormDefinition) -> Result<FormId> {
        self.faults.check("create_form")?;
        let mut state = lock(&self.state);
        let id = FormId(state.next_id());
        state.forms.insert(
            id,
            MemoryForm {
                definition: definition.clone(),
                enabled: true,
                shared_with: BTreeMap::new(),
                media: BTreeMap::new(),
                submissions: Vec::new(),
            },
        );
        Ok(id)
    }

    fn disable_form(&self, form: FormId) -> Result<()> {
        self.faults.check("disable_form")?;
        lock(&self.state).form_mut(form)?.enabled = false;
        Ok(())
    }

    fn enable_form(&self, form: FormId) -> Result<()> {
        self.faults.check("enable_form")?;
        lock(&self.state).form_mut(form)?.enabled = true;
        Ok(())
    }

    fn delete_form(&self, form: FormId) -> Result<()> {
        self.faults.check("delete_form")?;
        lock(&self.state)
            .forms
            .remove(&form)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("form {form}")))
    }

    fn fetch_submissions(&self, form: FormId) -> Result<Vec<Submission>> {
        self.faults.check("fetch_submissions")?;
        Ok(lock(&self.state).form_mut(form)?.submissions.clone())
    }

    fn upload_media(&self, form: FormId, file_name: &str, content: &[u8]) -> Result<MediaId> {
        self.faults.check("upload_media")?;
        let mut state = lock(&self.state);
        let id = MediaId(state.next_id());
        state
            .form_mut(form)?
            .media
            .insert(id, (file_name.to_string(), content.to_vec()));
        Ok(id)
    }

    fn find_media(&self, form: FormId, file_name: &str) -> Result<Option<MediaId>> {
        self.faults.check("find_media")?;
        Ok(lock(&self.state)
            .form_mut(form)?
            .media
            .iter()
            .find(|(_, (name, _))| name == file_name)
            .map(|(id, _)| *id))
    }

    fn delete_media(&self, form: FormId, media: MediaId) -> Result<()> {
        self.faults.check("delete_media")?;
        lock(&self.state)
            .form_mut(form)?
            .media
            .remove(&media)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("media {media}")))
    }

    fn grant_access(&self, form: FormId, user: &str, role: &str) -> Result<()> {
        self.faults.check("grant_access")?;
        lock(&self.state)
            .form_mut(form)?
            .shared_with
            .insert(user.to_string(), role.to_string());
        Ok(())
    }

    fn revoke_access(&self, form: FormId, user: &str) -> Result<()> {
        self.faults.check("revoke_access")?;
        lock(&self.state).form_mut(form)?.shared_with.remove(user);
        Ok(())
    }

    fn fetch_media(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        self.faults.check("fetch_media")?;
        lock(&self.state)
            .files
            .get(&attachment.filename)
            .cloned()
            .ok_or_else(|| not_found(&attachment.filename))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    collects: BTreeMap<CollectId, Collect>,
    targets: BTreeMap<CollectId, Vec<Target>>,
}

/// Collect store keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryCollectStore {
    state: Mutex<StoreState>,
    faults: Faults,
}

impl MemoryCollectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl CollectStore for MemoryCollectStore {
    fn create_collect(&self, new: &NewCollect) -> Result<Collect> {
        self.faults.check("create_collect")?;
        let mut state = lock(&self.state);
        state.next_id += 1;
        let collect = Collect::new(CollectId(state.next_id), new, Utc::now());
        state.collects.insert(collect.id, collect.clone());
        Ok(collect)
    }

    fn load_collect(&self, id: CollectId) -> Result<Option<Collect>> {
        self.faults.check("load_collect")?;
        Ok(lock(&self.state).collects.get(&id).cloned())
    }

    fn save_collect(&self, collect: &Collect) -> Result<()> {
        self.faults.check("save_collect")?;
        let mut state = lock(&self.state);
        let slot = state
            .collects
            .get_mut(&collect.id)
            .ok_or(OperationError::CollectNotFound(collect.id))?;
        *slot = collect.clone();
        Ok(())
    }

    fn delete_collect(&self, id: CollectId) -> Result<()> {
        self.faults.check("delete_collect")?;
        let mut state = lock(&self.state);
        state.collects.remove(&id);
        state.targets.remove(&id);
        Ok(())
    }

    fn list_collects(&self) -> Result<Vec<Collect>> {
        self.faults.check("list_collects")?;
        Ok(lock(&self.state).collects.values().cloned().collect())
    }

    fn targets(&self, collect: CollectId) -> Result<Vec<Target>> {
        self.faults.check("targets")?;
        Ok(lock(&self.state)
            .targets
            .get(&collect)
            .cloned()
            .unwrap_or_default())
    }

    fn create_target(&self, target: &Target) -> Result<()> {
        self.faults.check("create_target")?;
        let mut state = lock(&self.state);
        if !state.collects.contains_key(&target.collect) {
            return Err(OperationError::CollectNotFound(target.collect));
        }
        state
            .targets
            .entry(target.collect)
            .or_default()
            .push(target.clone());
        Ok(())
    }

    fn save_target(&self, target: &Target) -> Result<()> {
        self.faults.check("save_target")?;
        let mut state = lock(&self.state);
        let slot = state
            .targets
            .get_mut(&target.collect)
            .and_then(|targets| {
                targets
                    .iter_mut()
                    .find(|known| known.identifier == target.identifier)
            })
            .ok_or_else(|| fieldwork_core::CoreError::UnknownTarget(target.identifier.clone()))?;
        *slot = target.clone();
        Ok(())
    }

    fn delete_targets(&self, collect: CollectId) -> Result<()> {
        self.faults.check("delete_targets")?;
        lock(&self.state).targets.remove(&collect);
        Ok(())
    }

    fn target_exists(&self, identifier: &str) -> Result<bool> {
        self.faults.check("target_exists")?;
        Ok(lock(&self.state)
            .targets
            .values()
            .flatten()
            .any(|target| target.identifier == identifier))
    }
}

/// Document store keeping written files in memory.
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    faults: Faults,
}

impl MemoryDocuments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    #[must_use]
    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    /// Paths of every stored file, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.files).keys().cloned().collect()
    }
}

impl DocumentStore for MemoryDocuments {
    fn generate_form(&self, kind: FormKind, form_id: &str, title: &str) -> Result<FormDefinition> {
        self.faults.check("generate_form")?;
        Ok(FormDefinition {
            kind,
            form_id: form_id.to_string(),
            title: title.to_string(),
            file_name: format!("{form_id}.xml"),
            content: format!("<{kind} id=\"{form_id}\">{title}</{kind}>").into_bytes(),
        })
    }

    fn generate_document(&self, collect: &Collect, target: &Target) -> Result<Vec<u8>> {
        self.faults.check("generate_document")?;
        Ok(format!("{} / {target}", collect.name()).into_bytes())
    }

    fn document_extension(&self) -> &'static str {
        "txt"
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.faults.check("write_file")?;
        lock(&self.files).insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<bool> {
        self.faults.check("delete_file")?;
        Ok(lock(&self.files).remove(path).is_some())
    }
}

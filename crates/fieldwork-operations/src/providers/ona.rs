use std::sync::OnceLock;
use std::time::Duration;

use fieldwork_core::{Attachment, FormDefinition, FormId, MediaId, Submission};
use reqwest::Url;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::Result;
use crate::config::Settings;
use crate::error::OperationError;
use crate::traits::FormService;

const API_PREFIX: &str = "/api/v1";
const MEDIA_PREFIX: &str = "/media";
const XFORM_MIME: &str = "text/xml";
const CSV_MIME: &str = "text/plain; charset=utf-8";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct CreatedForm {
    formid: u64,
}

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    id: u64,
    #[serde(default)]
    xform: Option<u64>,
    #[serde(default)]
    data_value: String,
}

/// [`FormService`] backed by the ONA REST API, authenticated with a token.
pub struct OnaFormService {
    client: Client,
    base_url: Url,
}

impl std::fmt::Debug for OnaFormService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnaFormService")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OnaFormService {
    /// # Errors
    ///
    /// Returns `OperationError::MissingToken` without a token,
    /// `OperationError::InvalidUrl` if the server URL does not parse.
    pub fn new(settings: &Settings) -> Result<Self> {
        let token = settings.token()?;
        let base_url = Url::parse(&settings.server.url).map_err(|_| OperationError::InvalidUrl {
            url: settings.server.url.clone(),
        })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|_| OperationError::MissingToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("fieldwork/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        debug!(base_url = %base_url, "created form service client");
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|_| OperationError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
            })
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        self.url(&format!("{API_PREFIX}{path}"))
    }

    fn send(&self, request: RequestBuilder, expected: &[u16]) -> Result<Response> {
        let response = request.send()?;
        let status = response.status().as_u16();
        if expected.contains(&status) {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = error_message(&body);
        warn!(status, message = %message, "form service request failed");
        Err(OperationError::FormService { status, message })
    }

    fn set_downloadable(&self, form: FormId, downloadable: bool) -> Result<()> {
        let url = self.api_url(&format!("/forms/{form}"))?;
        let value = if downloadable { "true" } else { "false" };
        self.send(
            self.client.patch(url).form(&[("downloadable", value)]),
            &[200],
        )?;
        Ok(())
    }

    fn media_size(&self, attachment: &Attachment) -> Result<Option<u64>> {
        let url = self.url(&format!("{MEDIA_PREFIX}/{}", attachment.filename))?;
        let response = self.send(self.client.head(url), &[200])?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok()))
    }

    fn with_media_sizes(&self, mut submission: Submission) -> Result<Submission> {
        let mut attachments = submission.attachments();
        if attachments.iter().all(|attachment| attachment.filesize > 0) {
            return Ok(submission);
        }
        for attachment in attachments.iter_mut().filter(|a| a.filesize == 0) {
            if let Some(size) = self.media_size(attachment)? {
                attachment.filesize = size;
            }
        }
        submission.set_attachments(&attachments);
        Ok(submission)
    }
}

/// The `detail` field of an error body when there is one, the raw body
/// otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl FormService for OnaFormService {
    fn create_form(&self, definition: &FormDefinition) -> Result<FormId> {
        let part = Part::bytes(definition.content.clone())
            .file_name(definition.file_name.clone())
            .mime_str(XFORM_MIME)?;
        let form = Form::new().part("xml_file", part);
        let url = self.api_url("/forms")?;

        let created: CreatedForm = self
            .send(self.client.post(url).multipart(form), &[201])?
            .json()?;
        debug!(form_id = %definition.form_id, pk = created.formid, "form uploaded");
        Ok(FormId(created.formid))
    }

    fn disable_form(&self, form: FormId) -> Result<()> {
        self.set_downloadable(form, false)
    }

    fn enable_form(&self, form: FormId) -> Result<()> {
        self.set_downloadable(form, true)
    }

    fn delete_form(&self, form: FormId) -> Result<()> {
        let url = self.api_url(&format!("/forms/{form}"))?;
        self.send(self.client.delete(url), &[204])?;
        Ok(())
    }

    fn fetch_submissions(&self, form: FormId) -> Result<Vec<Submission>> {
        let url = self.api_url(&format!("/data/{form}"))?;
        let records: Vec<Submission> = self.send(self.client.get(url), &[200])?.json()?;
        debug!(form = %form, count = records.len(), "submissions downloaded");
        records
            .into_iter()
            .map(|submission| self.with_media_sizes(submission))
            .collect()
    }

    fn upload_media(&self, form: FormId, file_name: &str, content: &[u8]) -> Result<MediaId> {
        let part = Part::bytes(content.to_vec())
            .file_name(file_name.to_string())
            .mime_str(CSV_MIME)?;
        let payload = Form::new()
            .text("data_value", file_name.to_string())
            .text("data_type", "media")
            .text("xform", form.to_string())
            .part("data_file", part);
        let url = self.api_url("/metadata.json")?;

        let created: MetadataEntry = self
            .send(self.client.post(url).multipart(payload), &[201])?
            .json()?;
        Ok(MediaId(created.id))
    }

    fn find_media(&self, form: FormId, file_name: &str) -> Result<Option<MediaId>> {
        let mut url = self.api_url("/metadata.json")?;
        url.query_pairs_mut().append_pair("xform", &form.to_string());

        let entries: Vec<MetadataEntry> = self.send(self.client.get(url), &[200])?.json()?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.xform == Some(form.0) && entry.data_value == file_name)
            .map(|entry| MediaId(entry.id)))
    }

    fn delete_media(&self, _form: FormId, media: MediaId) -> Result<()> {
        let url = self.api_url(&format!("/metadata/{media}"))?;
        self.send(self.client.delete(url), &[200, 204])?;
        Ok(())
    }

    fn grant_access(&self, form: FormId, user: &str, role: &str) -> Result<()> {
        let url = self.api_url(&format!("/forms/{form}/share"))?;
        self.send(
            self.client.put(url).form(&[("username", user), ("role", role)]),
            &[200, 201, 204],
        )?;
        Ok(())
    }

    fn revoke_access(&self, form: FormId, user: &str) -> Result<()> {
        let url = self.api_url(&format!("/forms/{form}/share"))?;
        self.send(
            self.client
                .put(url)
                .form(&[("username", user), ("role", "readonly"), ("remove", "true")]),
            &[200, 201, 204],
        )?;
        Ok(())
    }

    fn fetch_media(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        let url = match &attachment.download_url {
            Some(path) => self.url(path)?,
            None => self.url(&format!("{MEDIA_PREFIX}/{}", attachment.filename))?,
        };
        let bytes = self.send(self.client.get(url), &[200])?.bytes()?;
        Ok(bytes.to_vec())
    }
}

/// [`OnaFormService`] built on first use, so commands that never reach the
/// server run without a token.
pub struct LazyOnaFormService {
    settings: Settings,
    service: OnceLock<OnaFormService>,
}

impl std::fmt::Debug for LazyOnaFormService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyOnaFormService")
            .field("server", &self.settings.server.url)
            .field("connected", &self.service.get().is_some())
            .finish_non_exhaustive()
    }
}

impl LazyOnaFormService {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            service: OnceLock::new(),
        }
    }

    /// Build the client now if it was not built yet.
    ///
    /// # Errors
    ///
    /// Same as [`OnaFormService::new`].
    pub fn connect(&self) -> Result<&OnaFormService> {
        if let Some(service) = self.service.get() {
            return Ok(service);
        }
        let service = OnaFormService::new(&self.settings)?;
        Ok(self.service.get_or_init(|| service))
    }
}

impl FormService for LazyOnaFormService {
    fn create_form(&self, definition: &FormDefinition) -> Result<FormId> {
        self.connect()?.create_form(definition)
    }

    fn disable_form(&self, form: FormId) -> Result<()> {
        self.connect()?.disable_form(form)
    }

    fn enable_form(&self, form: FormId) -> Result<()> {
        self.connect()?.enable_form(form)
    }

    fn delete_form(&self, form: FormId) -> Result<()> {
        self.connect()?.delete_form(form)
    }

    fn fetch_submissions(&self, form: FormId) -> Result<Vec<Submission>> {
        self.connect()?.fetch_submissions(form)
    }

    fn upload_media(&self, form: FormId, file_name: &str, content: &[u8]) -> Result<MediaId> {
        self.connect()?.upload_media(form, file_name, content)
    }

    fn find_media(&self, form: FormId, file_name: &str) -> Result<Option<MediaId>> {
        self.connect()?.find_media(form, file_name)
    }

    fn delete_media(&self, form: FormId, media: MediaId) -> Result<()> {
        self.connect()?.delete_media(form, media)
    }

    fn grant_access(&self, form: FormId, user: &str, role: &str) -> Result<()> {
        self.connect()?.grant_access(form, user, role)
    }

    fn revoke_access(&self, form: FormId, user: &str) -> Result<()> {
        self.connect()?.revoke_access(form, user)
    }

    fn fetch_media(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        self.connect()?.fetch_media(attachment)
    }
}

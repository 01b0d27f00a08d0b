use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A media file attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    /// Size in bytes, when known.
    #[serde(default)]
    pub filesize: u64,
}

impl Attachment {
    /// Last path segment of the file name, as stored on disk.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.filename
            .rsplit('/')
            .next()
            .unwrap_or(self.filename.as_str())
    }
}

/// One record submitted to a remote form, keyed by question path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission {
    fields: Map<String, Value>,
}

pub const ATTACHMENTS_KEY: &str = "_attachments";

impl Submission {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Value of a question as text; numbers are rendered, empty text is
    /// treated as absent.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Attachments listed under `_attachments`; malformed entries are skipped.
    #[must_use]
    pub fn attachments(&self) -> Vec<Attachment> {
        match self.fields.get(ATTACHMENTS_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_attachments(&mut self, attachments: &[Attachment]) {
        let items = attachments
            .iter()
            .filter_map(|attachment| serde_json::to_value(attachment).ok())
            .collect();
        self.fields
            .insert(ATTACHMENTS_KEY.to_string(), Value::Array(items));
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for Submission {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Number of attachments and their total size.
#[must_use]
pub fn media_totals<'a>(attachments: impl IntoIterator<Item = &'a Attachment>) -> (u64, u64) {
    attachments
        .into_iter()
        .fold((0, 0), |(count, size), attachment| {
            (count + 1, size + attachment.filesize)
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn submission(value: Value) -> Submission {
        serde_json::from_value(value).expect("object")
    }

    #[test]
    fn text_renders_numbers_and_skips_empty_strings() {
        let sub = submission(json!({
            "enquete/annee-naissance": 1970,
            "enquete/nom": "",
            "enquete/prenoms": "Awa",
        }));

        assert_eq!(sub.text("enquete/annee-naissance").as_deref(), Some("1970"));
        assert_eq!(sub.text("enquete/nom"), None);
        assert_eq!(sub.text("enquete/prenoms").as_deref(), Some("Awa"));
        assert_eq!(sub.text("missing"), None);
    }

    #[test]
    fn attachments_skip_malformed_entries() {
        let sub = submission(json!({
            "_attachments": [
                {"filename": "user/attachments/photo.jpg", "filesize": 120},
                {"no_filename": true},
            ]
        }));

        let attachments = sub.attachments();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].basename(), "photo.jpg");
        assert_eq!(attachments[0].filesize, 120);
    }

    #[test]
    fn set_attachments_round_trips_through_fields() {
        let mut sub = Submission::default();
        let attachment = Attachment {
            filename: "scan.png".to_string(),
            download_url: None,
            mimetype: Some("image/png".to_string()),
            filesize: 3,
        };

        sub.set_attachments(&[attachment.clone()]);

        assert_eq!(sub.attachments(), vec![attachment]);
    }

    #[test]
    fn media_totals_count_and_sum_sizes() {
        let attachments = [
            Attachment {
                filename: "a".to_string(),
                download_url: None,
                mimetype: None,
                filesize: 10,
            },
            Attachment {
                filename: "b".to_string(),
                download_url: None,
                mimetype: None,
                filesize: 32,
            },
        ];

        assert_eq!(media_totals(&attachments), (2, 42));
    }
}

use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

use fieldwork_core::{Collect, FormDefinition, FormKind, Target};

use crate::Result;
use crate::config::FormSettings;
use crate::error::OperationError;
use crate::traits::DocumentStore;

const SURVEY_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<h:html xmlns="http://www.w3.org/2002/xforms" xmlns:h="http://www.w3.org/1999/xhtml" xmlns:jr="http://openrosa.org/javarosa">
  <h:head>
    <h:title>{form_title}</h:title>
    <model>
      <instance>
        <data id="{form_id}">
          <localisation-enquete>
            <lieu_region/>
            <lieu_cercle/>
            <lieu_commune/>
            <lieu_village/>
            <lieu_village_autre/>
          </localisation-enquete>
          <enquete>
            <nom/>
            <prenoms/>
            <sexe/>
            <type-naissance/>
            <ddn/>
            <annee-naissance/>
          </enquete>
          <meta>
            <instanceID/>
          </meta>
        </data>
      </instance>
      <bind nodeset="/data/enquete/nom" type="string" required="true()"/>
      <bind nodeset="/data/enquete/prenoms" type="string" required="true()"/>
      <bind nodeset="/data/enquete/sexe" type="select1" required="true()"/>
      <bind nodeset="/data/enquete/type-naissance" type="select1" required="true()"/>
      <bind nodeset="/data/enquete/ddn" type="date" relevant="/data/enquete/type-naissance = 'ddn'"/>
      <bind nodeset="/data/enquete/annee-naissance" type="int" relevant="/data/enquete/type-naissance != 'ddn'"/>
      <bind nodeset="/data/meta/instanceID" type="string" readonly="true()" jr:preload="uid"/>
    </model>
  </h:head>
  <h:body/>
</h:html>
"#;

const SCAN_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<h:html xmlns="http://www.w3.org/2002/xforms" xmlns:h="http://www.w3.org/1999/xhtml" xmlns:jr="http://openrosa.org/javarosa">
  <h:head>
    <h:title>{form_title}</h:title>
    <model>
      <instance>
        <data id="{form_id}">
          <ident/>
          <certificat/>
          <meta>
            <instanceID/>
          </meta>
        </data>
      </instance>
      <instance id="targets" src="jr://file-csv/targets.csv"/>
      <bind nodeset="/data/ident" type="select1" required="true()"/>
      <bind nodeset="/data/certificat" type="binary" required="true()"/>
      <bind nodeset="/data/meta/instanceID" type="string" readonly="true()" jr:preload="uid"/>
    </model>
  </h:head>
  <h:body/>
</h:html>
"#;

/// Writes generated files under a root directory and renders forms from
/// XForm templates.
///
/// Templates may contain `{form_id}` and `{form_title}`; both are replaced
/// with XML-escaped values.
#[derive(Debug, Clone)]
pub struct FileSystemDocuments {
    root: PathBuf,
    templates: FormSettings,
}

impl FileSystemDocuments {
    #[must_use]
    pub fn new(root: &Path, templates: FormSettings) -> Self {
        Self {
            root: root.to_path_buf(),
            templates,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let escapes = path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || path.as_os_str().is_empty() {
            return Err(OperationError::InvalidDocumentPath {
                path: path.to_path_buf(),
            });
        }
        Ok(self.root.join(path))
    }

    fn template(&self, kind: FormKind) -> Result<String> {
        let (configured, builtin) = match kind {
            FormKind::Survey => (&self.templates.survey_template, SURVEY_TEMPLATE),
            FormKind::Scan => (&self.templates.scan_template, SCAN_TEMPLATE),
        };
        match configured {
            Some(path) => fs::read_to_string(path).map_err(|source| OperationError::TemplateRead {
                path: path.clone(),
                source,
            }),
            None => Ok(builtin.to_string()),
        }
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn survey_sheet(collect: &Collect, target: &Target) -> String {
    let mut sheet = String::new();
    let _ = writeln!(sheet, "{}", collect.form_title());
    let _ = writeln!(sheet, "{}", "=".repeat(collect.form_title().chars().count()));
    let _ = writeln!(sheet);
    let _ = writeln!(sheet, "Identifiant : {}", target.identifier);
    let _ = writeln!(sheet, "Nom : {}", target.name());
    let _ = writeln!(sheet, "Age : {} ans", target.age);
    let _ = writeln!(sheet, "Sexe : {}", target.gender.verbose_sex());
    let _ = writeln!(sheet, "Région : {}", target.region);
    let _ = writeln!(sheet, "Cercle : {}", target.cercle);
    let _ = writeln!(sheet, "Commune : {}", target.commune);
    let _ = writeln!(sheet, "Village : {}", target.village);
    let _ = writeln!(sheet);
    let _ = writeln!(sheet, "Réponses");
    let _ = writeln!(sheet, "--------");
    for (question, answer) in target.dataset.fields() {
        if question.starts_with('_') {
            continue;
        }
        let answer = answer
            .as_str()
            .map_or_else(|| answer.to_string(), ToString::to_string);
        let _ = writeln!(sheet, "{question} : {answer}");
    }
    sheet
}

impl DocumentStore for FileSystemDocuments {
    fn generate_form(&self, kind: FormKind, form_id: &str, title: &str) -> Result<FormDefinition> {
        let content = self
            .template(kind)?
            .replace("{form_id}", &escape_xml(form_id))
            .replace("{form_title}", &escape_xml(title));
        Ok(FormDefinition {
            kind,
            form_id: form_id.to_string(),
            title: title.to_string(),
            file_name: format!("{form_id}.xml"),
            content: content.into_bytes(),
        })
    }

    fn generate_document(&self, collect: &Collect, target: &Target) -> Result<Vec<u8>> {
        Ok(survey_sheet(collect, target).into_bytes())
    }

    fn document_extension(&self) -> &'static str {
        "txt"
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| OperationError::DocumentWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&full, content).map_err(|source| OperationError::DocumentWrite { path: full, source })
    }

    fn delete_file(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(OperationError::DocumentRemove { path: full, source }),
        }
    }
}

//! Choice lists attached to the scan form.
//!
//! The scan form offers one choice per surveyed target, so enumerators can
//! pick the person a certificate belongs to.

use crate::target::Target;

pub const ITEMSETS_FILE_NAME: &str = "targets.csv";

const HEADER: [&str; 4] = ["ident", "nom", "age", "sexe"];

/// Render the targets as the choice list attached to the scan form.
#[must_use]
pub fn itemsets_csv(targets: &[Target]) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().map(|s| (*s).to_string()));
    for target in targets {
        push_row(
            &mut out,
            [
                target.identifier.clone(),
                target.name(),
                target.age.to_string(),
                target.gender.verbose_sex().to_string(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row = fields
        .into_iter()
        .map(|field| quote(&field))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&row);
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::collect::CollectId;
    use crate::submission::Submission;

    fn target(identifier: &str, first: &str, last: &str, sexe: &str) -> Target {
        let submission: Submission = serde_json::from_value(json!({
            "enquete/prenoms": first,
            "enquete/nom": last,
            "enquete/sexe": sexe,
            "enquete/annee-naissance": 1974,
        }))
        .expect("object");
        Target::from_submission(CollectId(1), identifier.to_string(), &submission, 2024)
            .expect("valid survey")
    }

    #[test]
    fn header_only_without_targets() {
        assert_eq!(itemsets_csv(&[]), "ident,nom,age,sexe\r\n");
    }

    #[test]
    fn one_row_per_target() {
        let csv = itemsets_csv(&[
            target("AAAAAAAAAA", "moussa", "keita", "masculin"),
            target("BBBBBBBBBB", "awa", "diarra", "feminin"),
        ]);

        assert_eq!(
            csv,
            "ident,nom,age,sexe\r\n\
             AAAAAAAAAA,Moussa KEITA,50,Man\r\n\
             BBBBBBBBBB,Awa DIARRA,50,Woman\r\n"
        );
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let csv = itemsets_csv(&[target("AAAAAAAAAA", "jean, \"dit\"", "coulibaly", "masculin")]);

        assert!(csv.contains("\"Jean, \"\"dit\"\" COULIBALY\""));
    }
}

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collect::{Collect, CollectId};
use crate::error::{CoreError, Result};
use crate::submission::{media_totals, Attachment, Submission};

/// Length of a target identifier.
pub const IDENTIFIER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Wording used in itemsets.
    #[must_use]
    pub fn verbose_sex(self) -> &'static str {
        match self {
            Self::Male => "Man",
            Self::Female => "Woman",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
        }
    }
}

/// A surveyed person, created from one survey submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub identifier: String,
    pub collect: CollectId,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub gender: Gender,
    pub region: String,
    pub cercle: String,
    pub commune: String,
    pub village: String,
    /// `None` until the scan form has been reconciled.
    #[serde(default)]
    pub is_indigent: Option<bool>,
    /// The survey submission the target was built from.
    pub dataset: Submission,
    /// Attachments added by scan submissions, kept apart so reconciliation
    /// can be undone.
    #[serde(default)]
    pub scan_attachments: Vec<Attachment>,
}

impl Target {
    /// Build a target from a survey submission.
    ///
    /// The year of birth comes from the date of birth when the submission
    /// says it was given (`type-naissance == "ddn"`), from the year field
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSubmission` when the year of birth is
    /// missing, unparsable or in the future.
    pub fn from_submission(
        collect: CollectId,
        identifier: String,
        submission: &Submission,
        current_year: i32,
    ) -> Result<Self> {
        let year_of_birth = year_of_birth(submission)?;
        let age = u32::try_from(current_year - year_of_birth).map_err(|_| {
            CoreError::InvalidSubmission {
                field: "enquete/annee-naissance",
                reason: format!("{year_of_birth} is after {current_year}"),
            }
        })?;
        let gender = if submission.text("enquete/sexe").as_deref() == Some("feminin") {
            Gender::Female
        } else {
            Gender::Male
        };
        let location = |key: &str| submission.text(key).unwrap_or_default();

        Ok(Self {
            identifier,
            collect,
            first_name: location("enquete/prenoms"),
            last_name: location("enquete/nom"),
            age,
            gender,
            region: location("localisation-enquete/lieu_region"),
            cercle: location("localisation-enquete/lieu_cercle"),
            commune: location("localisation-enquete/lieu_commune"),
            village: submission
                .text("localisation-enquete/lieu_village")
                .or_else(|| submission.text("localisation-enquete/lieu_village_autre"))
                .unwrap_or_default(),
            is_indigent: None,
            dataset: submission.clone(),
            scan_attachments: Vec::new(),
        })
    }

    /// `First LAST`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} {}", title_case(&self.first_name), self.last_name.to_uppercase())
    }

    /// `{identifier}-{LAST First}`, used for file names.
    #[must_use]
    pub fn fname(&self) -> String {
        format!(
            "{}-{} {}",
            self.identifier,
            self.last_name.to_uppercase(),
            title_case(&self.first_name)
        )
    }

    /// Survey attachments followed by scan attachments.
    #[must_use]
    pub fn attachments(&self) -> Vec<Attachment> {
        let mut attachments = self.dataset.attachments();
        attachments.extend(self.scan_attachments.iter().cloned());
        attachments
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.identifier, self.name())
    }
}

fn year_of_birth(submission: &Submission) -> Result<i32> {
    let (field, raw) = if submission.text("enquete/type-naissance").as_deref() == Some("ddn") {
        let dob = submission.text("enquete/ddn").unwrap_or_default();
        let year = dob.split('-').next().unwrap_or_default().to_string();
        ("enquete/ddn", year)
    } else {
        (
            "enquete/annee-naissance",
            submission.text("enquete/annee-naissance").unwrap_or_default(),
        )
    };

    raw.trim()
        .parse()
        .map_err(|_| CoreError::InvalidSubmission {
            field,
            reason: format!("'{raw}' is not a year"),
        })
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Candidate identifier: ten upper-case hexadecimal characters.
#[must_use]
pub fn random_identifier() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(IDENTIFIER_LEN)
        .collect::<String>()
        .to_uppercase()
}

/// Draw identifiers until `is_taken` rejects none.
///
/// Gives up after `known + 10` attempts, `known` being the number of
/// identifiers already in use.
///
/// # Errors
///
/// Returns `CoreError::IdentifiersExhausted` when no free identifier was
/// drawn, or the error of `is_taken`.
pub fn unused_identifier<E>(
    known: usize,
    mut is_taken: impl FnMut(&str) -> std::result::Result<bool, E>,
) -> std::result::Result<String, E>
where
    E: From<CoreError>,
{
    let attempts = known + 10;
    for _ in 0..attempts {
        let candidate = random_identifier();
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(CoreError::IdentifiersExhausted { attempts }.into())
}

/// Mark the targets named by scan submissions as indigent, everybody else
/// as non-indigent, and update the collect's counters.
///
/// Every `ident` is checked before anything changes.
///
/// # Errors
///
/// Returns `CoreError::UnknownTarget` when a scan names no target of the
/// collect.
pub fn reconcile_scans(collect: &mut Collect, targets: &mut [Target], scans: &[Submission]) -> Result<()> {
    let positions: HashMap<String, usize> = targets
        .iter()
        .enumerate()
        .map(|(position, target)| (target.identifier.clone(), position))
        .collect();

    let mut matched = Vec::with_capacity(scans.len());
    for scan in scans {
        let ident = scan.text("ident").unwrap_or_default();
        let position = positions
            .get(&ident)
            .copied()
            .ok_or(CoreError::UnknownTarget(ident))?;
        matched.push((position, scan.attachments()));
    }

    let mut new_medias = Vec::new();
    for (position, attachments) in matched {
        let target = &mut targets[position];
        target.is_indigent = Some(true);
        target.scan_attachments.extend(attachments.iter().cloned());
        new_medias.extend(attachments);
    }
    for target in targets.iter_mut().filter(|t| t.is_indigent.is_none()) {
        target.is_indigent = Some(false);
    }

    let (count, size) = media_totals(&new_medias);
    let total = targets.len() as u64;
    let indigents = targets.iter().filter(|t| t.is_indigent == Some(true)).count() as u64;
    collect.nb_medias = Some(collect.nb_medias.unwrap_or_default() + count);
    collect.medias_size = Some(collect.medias_size.unwrap_or_default() + size);
    collect.nb_submissions = Some(total);
    collect.nb_indigents = Some(indigents);
    collect.nb_non_indigents = Some(total - indigents);
    Ok(())
}

/// Undo [`reconcile_scans`]. Harmless on targets never reconciled.
pub fn reset_scans(collect: &mut Collect, targets: &mut [Target]) {
    let removed: Vec<Attachment> = targets
        .iter_mut()
        .flat_map(|target| {
            target.is_indigent = None;
            std::mem::take(&mut target.scan_attachments)
        })
        .collect();
    let (count, size) = media_totals(&removed);

    collect.nb_medias = collect.nb_medias.map(|n| n.saturating_sub(count));
    collect.medias_size = collect.medias_size.map(|n| n.saturating_sub(size));
    collect.nb_indigents = None;
    collect.nb_non_indigents = None;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::collect::NewCollect;

    fn submission(value: serde_json::Value) -> Submission {
        serde_json::from_value(value).expect("object")
    }

    fn survey(extra: serde_json::Value) -> Submission {
        let mut base = json!({
            "enquete/prenoms": "awa",
            "enquete/nom": "Traoré",
            "enquete/sexe": "feminin",
            "enquete/type-naissance": "annee",
            "enquete/annee-naissance": "1980",
            "localisation-enquete/lieu_region": "Koulikoro",
            "localisation-enquete/lieu_cercle": "Kati",
            "localisation-enquete/lieu_commune": "Kati",
            "localisation-enquete/lieu_village": "Sirakoro",
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        submission(base)
    }

    fn target(identifier: &str) -> Target {
        Target::from_submission(CollectId(1), identifier.to_string(), &survey(json!({})), 2024)
            .expect("valid survey")
    }

    fn collect() -> Collect {
        let new = NewCollect {
            commune: "Kati".to_string(),
            suffix: "A".to_string(),
        };
        Collect::new(CollectId(1), &new, Utc::now())
    }

    #[test]
    fn target_reads_identity_and_location() {
        let target = target("ABCDEF0123");

        assert_eq!(target.age, 44);
        assert_eq!(target.gender, Gender::Female);
        assert_eq!(target.village, "Sirakoro");
        assert_eq!(target.is_indigent, None);
        assert_eq!(target.name(), "Awa TRAORÉ");
        assert_eq!(target.fname(), "ABCDEF0123-TRAORÉ Awa");
        assert_eq!(target.to_string(), "ABCDEF0123.Awa TRAORÉ");
    }

    #[test]
    fn date_of_birth_wins_when_declared() {
        let sub = survey(json!({
            "enquete/type-naissance": "ddn",
            "enquete/ddn": "1990-06-15",
        }));

        let target = Target::from_submission(CollectId(1), "X".to_string(), &sub, 2024)
            .expect("valid survey");

        assert_eq!(target.age, 34);
    }

    #[test]
    fn village_falls_back_to_free_text() {
        let sub = survey(json!({
            "localisation-enquete/lieu_village": "",
            "localisation-enquete/lieu_village_autre": "Hamdallaye",
        }));

        let target = Target::from_submission(CollectId(1), "X".to_string(), &sub, 2024)
            .expect("valid survey");

        assert_eq!(target.village, "Hamdallaye");
    }

    #[test]
    fn other_sexes_default_to_male() {
        let sub = survey(json!({"enquete/sexe": "masculin"}));

        let target = Target::from_submission(CollectId(1), "X".to_string(), &sub, 2024)
            .expect("valid survey");

        assert_eq!(target.gender, Gender::Male);
        assert_eq!(target.gender.verbose_sex(), "Man");
    }

    #[test]
    fn missing_year_is_rejected() {
        let sub = survey(json!({"enquete/annee-naissance": ""}));

        let result = Target::from_submission(CollectId(1), "X".to_string(), &sub, 2024);

        assert!(matches!(
            result,
            Err(CoreError::InvalidSubmission { field: "enquete/annee-naissance", .. })
        ));
    }

    #[test]
    fn random_identifiers_have_fixed_length() {
        let ident = random_identifier();

        assert_eq!(ident.len(), IDENTIFIER_LEN);
        assert!(ident.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unused_identifier_retries_taken_candidates() {
        let mut calls = 0;

        let ident = unused_identifier::<CoreError>(0, |_| {
            calls += 1;
            Ok(calls < 3)
        })
        .expect("third candidate is free");

        assert_eq!(calls, 3);
        assert_eq!(ident.len(), IDENTIFIER_LEN);
    }

    #[test]
    fn unused_identifier_gives_up() {
        let result = unused_identifier::<CoreError>(2, |_| Ok(true));

        assert!(matches!(
            result,
            Err(CoreError::IdentifiersExhausted { attempts: 12 })
        ));
    }

    #[test]
    fn reconcile_marks_scanned_targets_indigent() {
        let mut collect = collect();
        collect.nb_medias = Some(1);
        collect.medias_size = Some(100);
        let mut targets = vec![target("AAAAAAAAAA"), target("BBBBBBBBBB"), target("CCCCCCCCCC")];
        let scans = vec![submission(json!({
            "ident": "BBBBBBBBBB",
            "_attachments": [{"filename": "certificat.jpg", "filesize": 50}],
        }))];

        reconcile_scans(&mut collect, &mut targets, &scans).expect("known target");

        assert_eq!(targets[0].is_indigent, Some(false));
        assert_eq!(targets[1].is_indigent, Some(true));
        assert_eq!(targets[1].scan_attachments.len(), 1);
        assert_eq!(targets[1].attachments().len(), 1);
        assert_eq!(collect.nb_indigents, Some(1));
        assert_eq!(collect.nb_non_indigents, Some(2));
        assert_eq!(collect.nb_submissions, Some(3));
        assert_eq!(collect.nb_medias, Some(2));
        assert_eq!(collect.medias_size, Some(150));
    }

    #[test]
    fn reconcile_rejects_unknown_ident_without_changes() {
        let mut collect = collect();
        let mut targets = vec![target("AAAAAAAAAA")];
        let scans = vec![
            submission(json!({"ident": "AAAAAAAAAA"})),
            submission(json!({"ident": "ZZZZZZZZZZ"})),
        ];

        let result = reconcile_scans(&mut collect, &mut targets, &scans);

        assert!(matches!(result, Err(CoreError::UnknownTarget(ident)) if ident == "ZZZZZZZZZZ"));
        assert_eq!(targets[0].is_indigent, None);
        assert_eq!(collect.nb_indigents, None);
    }

    #[test]
    fn reset_undoes_reconciliation() {
        let mut collect = collect();
        collect.nb_medias = Some(0);
        collect.medias_size = Some(0);
        let mut targets = vec![target("AAAAAAAAAA"), target("BBBBBBBBBB")];
        let scans = vec![submission(json!({
            "ident": "AAAAAAAAAA",
            "_attachments": [{"filename": "c.jpg", "filesize": 7}],
        }))];
        reconcile_scans(&mut collect, &mut targets, &scans).expect("known target");

        reset_scans(&mut collect, &mut targets);

        assert!(targets.iter().all(|t| t.is_indigent.is_none()));
        assert!(targets.iter().all(|t| t.scan_attachments.is_empty()));
        assert_eq!(collect.nb_medias, Some(0));
        assert_eq!(collect.medias_size, Some(0));
        assert_eq!(collect.nb_indigents, None);
    }
}

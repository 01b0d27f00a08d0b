use chrono::{DateTime, Utc};
use fieldwork_core::Collect;
use fieldwork_operations::operations::{CollectListing, CollectSummary};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub(crate) trait CollectFormatter {
    fn format_summary(&self, summary: &CollectSummary) -> String;
    fn format_listing(&self, listing: &CollectListing) -> String;
}

pub(crate) struct PlainTextCollectFormatter;

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl PlainTextCollectFormatter {
    fn format_dates(output: &mut String, collect: &Collect) {
        let date = |d: Option<&DateTime<Utc>>| or_dash(d.map(|d| d.format(DATE_FORMAT)));
        output.push_str(&format!("  started:     {}\n", date(Some(&collect.started_on))));
        output.push_str(&format!("  ended:       {}\n", date(collect.ended_on.as_ref())));
        output.push_str(&format!("  finalized:   {}\n", date(collect.finalized_on.as_ref())));
    }

    fn format_counters(output: &mut String, summary: &CollectSummary) {
        let collect = &summary.collect;
        output.push_str(&format!("  targets:     {}\n", summary.targets));
        output.push_str(&format!("  submissions: {}\n", or_dash(collect.nb_submissions)));
        if collect.nb_indigents.is_some() || collect.nb_non_indigents.is_some() {
            output.push_str(&format!(
                "  indigents:   {} (non-indigents: {})\n",
                or_dash(collect.nb_indigents),
                or_dash(collect.nb_non_indigents)
            ));
        }
        if let Some(medias) = collect.nb_medias {
            output.push_str(&format!(
                "  medias:      {medias} ({} bytes)\n",
                collect.medias_size.unwrap_or_default()
            ));
        }
    }

    fn format_section(output: &mut String, title: &str, collects: &[Collect]) {
        if collects.is_empty() {
            return;
        }
        output.push_str(&format!("{title}:\n"));
        for collect in collects {
            output.push_str(&format!(
                "  {:>4}  {:<24} {}\n",
                collect.id,
                collect.name(),
                collect.status
            ));
        }
    }
}

impl CollectFormatter for PlainTextCollectFormatter {
    fn format_summary(&self, summary: &CollectSummary) -> String {
        let collect = &summary.collect;
        let mut output = format!("Collect {}: {}\n", collect.id, collect.name());
        output.push_str(&format!("  status:      {} ({})\n", collect.status, summary.label));
        Self::format_dates(&mut output, collect);
        output.push_str(&format!("  survey form: {}\n", or_dash(collect.form_pk)));
        output.push_str(&format!("  scan form:   {}\n", or_dash(collect.scan_form_pk)));
        Self::format_counters(&mut output, summary);
        output
    }

    fn format_listing(&self, listing: &CollectListing) -> String {
        if listing.active.is_empty() && listing.archived.is_empty() {
            return "No collects.\n".to_string();
        }

        let mut output = String::new();
        Self::format_section(&mut output, "Active collects", &listing.active);
        if !listing.active.is_empty() && !listing.archived.is_empty() {
            output.push('\n');
        }
        Self::format_section(&mut output, "Archived collects", &listing.archived);
        output
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use fieldwork_core::{CollectId, CollectStatus, FormId, NewCollect};

    use super::*;

    fn collect(id: u64, status: CollectStatus) -> Collect {
        let started = Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 30, 0)
            .single()
            .expect("valid date");
        let mut collect = Collect::new(
            CollectId(id),
            &NewCollect {
                commune: "Kati".to_string(),
                suffix: format!("S{id}"),
            },
            started,
        );
        collect.status = status;
        collect
    }

    #[test]
    fn summary_of_a_started_collect_has_dashes_for_missing_values() {
        let mut started = collect(1, CollectStatus::Started);
        started.form_pk = Some(FormId(41));
        let summary = CollectSummary {
            label: CollectStatus::Started.label(),
            collect: started,
            targets: 0,
        };

        let text = PlainTextCollectFormatter.format_summary(&summary);

        assert!(text.starts_with("Collect 1: E.S Kati S1\n"));
        assert!(text.contains("  started:     2024-03-01 08:30\n"));
        assert!(text.contains("  ended:       -\n"));
        assert!(text.contains("  survey form: 41\n"));
        assert!(text.contains("  scan form:   -\n"));
        assert!(!text.contains("indigents"));
        assert!(!text.contains("medias"));
    }

    #[test]
    fn summary_of_a_finalized_collect_shows_counters() {
        let mut finalized = collect(2, CollectStatus::Finalized);
        finalized.nb_submissions = Some(5);
        finalized.nb_indigents = Some(2);
        finalized.nb_non_indigents = Some(3);
        finalized.nb_medias = Some(7);
        finalized.medias_size = Some(4096);
        let summary = CollectSummary {
            label: CollectStatus::Finalized.label(),
            collect: finalized,
            targets: 5,
        };

        let text = PlainTextCollectFormatter.format_summary(&summary);

        assert!(text.contains("  status:      finalized (Collecte finalisée avec documents)\n"));
        assert!(text.contains("  indigents:   2 (non-indigents: 3)\n"));
        assert!(text.contains("  medias:      7 (4096 bytes)\n"));
    }

    #[test]
    fn empty_listing_says_so() {
        let text = PlainTextCollectFormatter.format_listing(&CollectListing::default());

        assert_eq!(text, "No collects.\n");
    }

    #[test]
    fn listing_separates_active_and_archived() {
        let listing = CollectListing {
            active: vec![collect(1, CollectStatus::Ended)],
            archived: vec![collect(2, CollectStatus::Finalized)],
        };

        let text = PlainTextCollectFormatter.format_listing(&listing);

        let active = text.find("Active collects:").expect("active section");
        let archived = text.find("Archived collects:").expect("archived section");
        assert!(active < archived);
        assert!(text.contains("E.S Kati S1"));
        assert!(text.contains("finalized"));
    }
}

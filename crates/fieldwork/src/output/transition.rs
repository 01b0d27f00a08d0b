use fieldwork_operations::operations::TransitionOutcome;

pub(crate) trait TransitionFormatter {
    fn format_outcome(&self, outcome: &TransitionOutcome) -> String;
}

pub(crate) struct PlainTextTransitionFormatter;

impl TransitionFormatter for PlainTextTransitionFormatter {
    fn format_outcome(&self, outcome: &TransitionOutcome) -> String {
        let mut output = format!(
            "Collect {}: {} {}\n",
            outcome.collect, outcome.collection, outcome.status
        );
        for line in outcome.audit.lines() {
            output.push_str(&format!("  {line}\n"));
        }
        output
    }
}

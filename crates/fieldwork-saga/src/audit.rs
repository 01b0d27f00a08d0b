use std::time::Instant;

use crate::status::TaskStatus;

/// Record of one task instance within a collection run.
#[derive(Debug)]
pub struct TaskRecord {
    /// Name of the task.
    pub name: &'static str,
    /// Latest known status.
    pub status: TaskStatus,
    /// Whether the forward action failed at some point.
    pub failed: bool,
    /// When the instance was created.
    pub started_at: Instant,
    /// When the instance last settled (processed or reverted).
    pub completed_at: Option<Instant>,
    /// Description of what reverting does.
    pub revert_description: String,
}

/// Audit log tracking every task instance of a collection run.
#[derive(Debug, Default)]
pub struct TaskAuditLog {
    records: Vec<TaskRecord>,
}

impl TaskAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new instance; its index matches the instance index.
    pub(crate) fn record_start(&mut self, name: &'static str, revert_description: String) {
        self.records.push(TaskRecord {
            name,
            status: TaskStatus::NotStarted,
            failed: false,
            started_at: Instant::now(),
            completed_at: None,
            revert_description,
        });
    }

    /// Record the status an instance settled in after processing.
    pub(crate) fn record_processed(&mut self, index: usize, status: TaskStatus) {
        if let Some(record) = self.records.get_mut(index) {
            record.failed = status != TaskStatus::Success;
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    /// Record the status an instance settled in after reverting.
    pub(crate) fn record_reverted(&mut self, index: usize, status: TaskStatus) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// One line per task for display.
    ///
    /// `✓` succeeded, `✗` failed and was undone, `↩` reverted, `⚠` revert
    /// failed, `·` untouched.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let symbol = match record.status {
                TaskStatus::Error => "⚠",
                _ if record.failed => "✗",
                TaskStatus::Success => "✓",
                TaskStatus::Reverted => "↩",
                _ => "·",
            };
            lines.push(format!("{symbol} {}", record.name));
        }
        lines.join("\n")
    }
}

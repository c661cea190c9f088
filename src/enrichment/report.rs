use crate::tempo::BpmDiscrepancy;

/// Lifecycle of one record during an enrichment pass.
///
/// `Pending` and `Analyzing` are transient; a finished pass leaves every record in one of the
/// three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Analyzing,
    Enriched,
    SkippedMissingFile,
    Failed,
}

impl RecordState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Enriched | Self::SkippedMissingFile | Self::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Enriched => "enriched",
            Self::SkippedMissingFile => "skipped_missing_file",
            Self::Failed => "failed",
        }
    }
}

/// Final state of one record, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub state: RecordState,
    /// Failure cause for `Failed` records.
    pub error: Option<String>,
}

/// Summary of one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub enriched_count: usize,
    pub skipped_missing_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub discrepancies: Vec<BpmDiscrepancy>,
    pub outcomes: Vec<RecordOutcome>,
}

impl EnrichmentReport {
    pub(super) fn record(&mut self, outcome: RecordOutcome) {
        match outcome.state {
            RecordState::Enriched => self.enriched_count += 1,
            RecordState::SkippedMissingFile => self.skipped_missing_count += 1,
            RecordState::Failed => self.failed_count += 1,
            RecordState::Pending | RecordState::Analyzing => {}
        }
        self.outcomes.push(outcome);
    }

    /// One-line summary for binaries.
    pub fn summary(&self) -> String {
        format!(
            "enriched {}/{} (skipped {} missing, {} failed, {} BPM discrepancies)",
            self.enriched_count,
            self.total_count,
            self.skipped_missing_count,
            self.failed_count,
            self.discrepancies.len()
        )
    }
}

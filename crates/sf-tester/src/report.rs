use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitReportEntry {
    pub file_name: String,
    pub line: usize,
    pub text: String,
    pub visits: u32,
    /// `100 * visits / test_runs`.
    pub percentage: f64,
}

/// Where a playthrough was when the story ran dry. Field order is the
/// report order: error text, then file, then line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfContentIncident {
    pub error_text: String,
    pub last_good_file: String,
    pub last_good_line: Option<usize>,
    pub last_good_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub lines_total: usize,
    pub lines_visited: usize,
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzReport {
    pub test_runs: usize,
    pub out_of_content_mode: bool,
    pub visits: Vec<VisitReportEntry>,
    pub out_of_content: Vec<OutOfContentIncident>,
    pub coverage: CoverageSummary,
}

impl FuzzReport {
    pub fn new(
        test_runs: usize,
        out_of_content_mode: bool,
        visits: Vec<VisitReportEntry>,
        out_of_content: Vec<OutOfContentIncident>,
    ) -> Self {
        let lines_total = visits.len();
        let lines_visited = visits.iter().filter(|entry| entry.visits > 0).count();
        let coverage_percent = if lines_total == 0 {
            0.0
        } else {
            lines_visited as f64 * 100.0 / lines_total as f64
        };

        Self {
            test_runs,
            out_of_content_mode,
            visits,
            out_of_content,
            coverage: CoverageSummary {
                lines_total,
                lines_visited,
                coverage_percent,
            },
        }
    }

    /// Entries no run reached.
    pub fn unvisited(&self) -> impl Iterator<Item = &VisitReportEntry> {
        self.visits.iter().filter(|entry| entry.visits == 0)
    }
}

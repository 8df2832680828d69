use std::collections::{BTreeMap, BTreeSet};

use sf_core::split_source_lines;

use crate::report::VisitReportEntry;
use crate::tagger::LineRoster;

/// Lines touched during a single run. Revisits within the run collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunVisitSet {
    files: BTreeMap<String, BTreeSet<usize>>,
}

impl RunVisitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file_name: &str, line: usize) {
        self.files
            .entry(file_name.to_string())
            .or_default()
            .insert(line);
    }

    pub fn contains(&self, file_name: &str, line: usize) -> bool {
        self.files
            .get(file_name)
            .map(|lines| lines.contains(&line))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<usize>)> {
        self.files.iter()
    }
}

/// Per file and line, the number of runs that reached the line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitCounter {
    counts: BTreeMap<String, BTreeMap<usize, u32>>,
}

impl VisitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zero count for every roster line not yet counted, so
    /// files no run reaches still show up in the report.
    pub fn seed(&mut self, roster: &LineRoster) {
        for (file_name, lines) in roster {
            let file_counts = self.counts.entry(file_name.clone()).or_default();
            for line in lines {
                file_counts.entry(*line).or_insert(0);
            }
        }
    }

    /// Adds one run. A file seen for the first time is seeded with a zero
    /// for every roster line so unreached lines still show up.
    pub fn fold(&mut self, run: &RunVisitSet, roster: &LineRoster) {
        for (file_name, lines) in run.iter() {
            let file_counts = self.counts.entry(file_name.clone()).or_insert_with(|| {
                roster
                    .get(file_name)
                    .map(|expected| expected.iter().map(|line| (*line, 0)).collect())
                    .unwrap_or_default()
            });
            for line in lines {
                *file_counts.entry(*line).or_insert(0) += 1;
            }
        }
    }

    pub fn count(&self, file_name: &str, line: usize) -> Option<u32> {
        self.counts.get(file_name)?.get(&line).copied()
    }

    /// Report entries ordered by file then line. Zero counts are dropped in
    /// out-of-content mode. Text comes from `sources`; lines outside the file
    /// read as empty.
    pub fn build_report(
        &self,
        sources: &BTreeMap<String, String>,
        test_runs: usize,
        out_of_content_mode: bool,
    ) -> Vec<VisitReportEntry> {
        let mut entries = Vec::new();

        for (file_name, lines) in &self.counts {
            let file_lines = sources
                .get(file_name)
                .map(|content| split_source_lines(content))
                .unwrap_or_default();

            for (line, visits) in lines {
                if out_of_content_mode && *visits == 0 {
                    continue;
                }
                let text = line
                    .checked_sub(1)
                    .and_then(|index| file_lines.get(index))
                    .map(|text| (*text).to_string())
                    .unwrap_or_default();
                entries.push(VisitReportEntry {
                    file_name: file_name.clone(),
                    line: *line,
                    text,
                    visits: *visits,
                    percentage: f64::from(*visits) * 100.0 / test_runs as f64,
                });
            }
        }

        entries
    }
}

#[cfg(test)]
mod aggregate_tests {
    use super::*;

    fn roster(entries: &[(&str, &[usize])]) -> LineRoster {
        entries
            .iter()
            .map(|(file, lines)| ((*file).to_string(), lines.to_vec()))
            .collect()
    }

    #[test]
    fn run_visit_set_discards_in_run_multiplicity() {
        let mut run = RunVisitSet::new();
        run.record("main.ink", 3);
        run.record("main.ink", 3);
        run.record("main.ink", 1);
        assert!(run.contains("main.ink", 3));
        assert!(!run.contains("other.ink", 3));
        let lines = run.iter().next().map(|(_, lines)| lines.len());
        assert_eq!(lines, Some(2));
    }

    #[test]
    fn fold_seeds_roster_lines_and_counts_runs() {
        let roster = roster(&[("main.ink", &[1, 2, 5])]);
        let mut counter = VisitCounter::new();

        let mut first = RunVisitSet::new();
        first.record("main.ink", 1);
        first.record("main.ink", 1);
        counter.fold(&first, &roster);

        let mut second = RunVisitSet::new();
        second.record("main.ink", 1);
        second.record("main.ink", 9);
        counter.fold(&second, &roster);

        assert_eq!(counter.count("main.ink", 1), Some(2));
        assert_eq!(counter.count("main.ink", 2), Some(0));
        assert_eq!(counter.count("main.ink", 5), Some(0));
        assert_eq!(counter.count("main.ink", 9), Some(1));
        assert_eq!(counter.count("other.ink", 1), None);
    }

    #[test]
    fn build_report_reads_text_and_computes_percentages() {
        let roster = roster(&[("main.ink", &[1, 2])]);
        let mut counter = VisitCounter::new();
        let mut run = RunVisitSet::new();
        run.record("main.ink", 1);
        counter.fold(&run, &roster);

        let mut sources = BTreeMap::new();
        sources.insert("main.ink".to_string(), "Hello\r\nWorld\n".to_string());

        let report = counter.build_report(&sources, 4, false);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].text, "Hello");
        assert_eq!(report[0].visits, 1);
        assert!((report[0].percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(report[1].text, "World");
        assert_eq!(report[1].visits, 0);

        let ooc_report = counter.build_report(&sources, 4, true);
        assert_eq!(ooc_report.len(), 1);
    }

    #[test]
    fn seed_lists_files_no_run_reached() {
        let roster = roster(&[("main.ink", &[1]), ("side.ink", &[2, 4])]);
        let mut counter = VisitCounter::new();
        counter.seed(&roster);

        let mut run = RunVisitSet::new();
        run.record("main.ink", 1);
        counter.fold(&run, &roster);
        counter.seed(&roster);

        assert_eq!(counter.count("main.ink", 1), Some(1));
        assert_eq!(counter.count("side.ink", 2), Some(0));
        assert_eq!(counter.count("side.ink", 4), Some(0));

        let report = counter.build_report(&BTreeMap::new(), 1, false);
        assert_eq!(report.len(), 3);
        assert_eq!(counter.build_report(&BTreeMap::new(), 1, true).len(), 1);
    }

    #[test]
    fn build_report_tolerates_missing_text() {
        let mut counter = VisitCounter::new();
        let mut run = RunVisitSet::new();
        run.record("gone.ink", 4);
        counter.fold(&run, &LineRoster::new());
        let report = counter.build_report(&BTreeMap::new(), 1, false);
        assert_eq!(report[0].text, "");
        assert_eq!(report[0].visits, 1);
    }
}

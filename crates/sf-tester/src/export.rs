use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::report::FuzzReport;
use crate::FuzzError;

const VISIT_HEADER: &str = "File,Line,Text,Visit Count,Visit %";
const INCIDENT_HEADER: &str = "Error,Last Good File,Last Good Line,Last Good Text";

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Bare unless the value would break the row.
fn field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        quoted(text)
    } else {
        text.to_string()
    }
}

/// Visit table, followed in out-of-content mode by a blank line and the
/// incident table.
pub fn render_csv(report: &FuzzReport) -> String {
    let mut output = String::new();
    output.push_str(VISIT_HEADER);
    output.push('\n');

    for entry in &report.visits {
        let _ = writeln!(
            output,
            "{},{},{},{},{:.2}",
            field(&entry.file_name),
            entry.line,
            quoted(&entry.text),
            entry.visits,
            entry.percentage
        );
    }

    if report.out_of_content_mode {
        output.push('\n');
        output.push_str(INCIDENT_HEADER);
        output.push('\n');
        for incident in &report.out_of_content {
            let line = incident
                .last_good_line
                .map(|line| line.to_string())
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "{},{},{},{}",
                quoted(&incident.error_text),
                field(&incident.last_good_file),
                line,
                quoted(&incident.last_good_text)
            );
        }
    }

    output
}

pub fn render_json(report: &FuzzReport) -> Result<String, FuzzError> {
    serde_json::to_string_pretty(report).map_err(FuzzError::Serialize)
}

pub fn write_csv(report: &FuzzReport, path: &Path) -> Result<(), FuzzError> {
    write_report(path, &render_csv(report))
}

pub fn write_json(report: &FuzzReport, path: &Path) -> Result<(), FuzzError> {
    write_report(path, &render_json(report)?)
}

fn write_report(path: &Path, contents: &str) -> Result<(), FuzzError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| FuzzError::WriteReport {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| FuzzError::WriteReport {
        path: path.to_path_buf(),
        source,
    })
}

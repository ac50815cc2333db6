//! CSV and JSON reports of a selection run
//!
//! Every CSV file is UTF-8 with a mandatory header and `\n` line endings.
//! Fields containing a comma, quote, CR or LF are quoted, with embedded
//! quotes doubled.

use crate::delta::{ClassDelta, LineDeltaRow, TestDelta};
use crate::result::ReportError;
use crate::selection::SelectionOutcome;
use crate::selector::TestSelector;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Kept selectors, one per row
pub const KEPT_SELECTORS_CSV: &str = "kept_selectors.csv";
/// Kept selectors as a plain list
pub const KEPT_SELECTORS_TXT: &str = "kept_selectors.txt";
/// Deltas of every candidate
pub const TEST_DELTAS_ALL_CSV: &str = "test_deltas_all.csv";
/// Deltas of kept candidates
pub const TEST_DELTAS_KEPT_CSV: &str = "test_deltas_kept.csv";
/// Per-class changes after verification
pub const CLASS_DELTAS_CSV: &str = "class_deltas.csv";
/// Line changes of kept candidates
pub const LINE_DELTAS_KEPT_CSV: &str = "line_deltas_kept.csv";
/// Run counts
pub const SUMMARY_JSON: &str = "summary.json";

const KEPT_HEADER: &str = "test_selector";
const TEST_DELTA_HEADER: &str =
    "test_selector,added_lines,added_methods,added_branches,added_instructions";
const CLASS_DELTA_HEADER: &str =
    "class_name,added_lines,added_methods,added_branches,added_instructions";
const LINE_DELTA_HEADER: &str =
    "test_selector,class_name,newly_covered_lines,upgraded_to_full_lines";

/// Quote a field when it contains a delimiter, quote or line break
#[must_use]
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes report files into one directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    out_dir: PathBuf,
    write_summary: bool,
}

impl ReportWriter {
    /// Create a writer for `out_dir`
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            write_summary: false,
        }
    }

    /// Also write `summary.json`
    #[must_use]
    pub const fn with_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    /// Output directory
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write every report of a selection run, returning the written paths
    pub fn write_selection(&self, outcome: &SelectionOutcome) -> Result<Vec<PathBuf>, ReportError> {
        let path = |name: &str| self.out_dir.join(name);
        let mut written = Vec::new();

        write_kept_selectors(&path(KEPT_SELECTORS_CSV), &outcome.kept)?;
        written.push(path(KEPT_SELECTORS_CSV));
        write_selector_list(&path(KEPT_SELECTORS_TXT), &outcome.kept)?;
        written.push(path(KEPT_SELECTORS_TXT));
        write_test_deltas(&path(TEST_DELTAS_ALL_CSV), &outcome.all_deltas)?;
        written.push(path(TEST_DELTAS_ALL_CSV));
        write_test_deltas(&path(TEST_DELTAS_KEPT_CSV), &outcome.kept_deltas)?;
        written.push(path(TEST_DELTAS_KEPT_CSV));
        write_class_deltas(&path(CLASS_DELTAS_CSV), &outcome.class_deltas)?;
        written.push(path(CLASS_DELTAS_CSV));
        write_line_deltas(&path(LINE_DELTAS_KEPT_CSV), &outcome.line_rows)?;
        written.push(path(LINE_DELTAS_KEPT_CSV));

        if self.write_summary {
            write_json(&path(SUMMARY_JSON), &outcome.summary())?;
            written.push(path(SUMMARY_JSON));
        }
        debug!(files = written.len(), dir = %self.out_dir.display(), "reports written");
        Ok(written)
    }
}

/// Write `kept_selectors.csv`
pub fn write_kept_selectors(path: &Path, selectors: &[TestSelector]) -> Result<(), ReportError> {
    write_rows(
        path,
        KEPT_HEADER,
        selectors.iter().map(|s| csv_field(&s.to_string())),
    )
}

/// Write one selector per line, without header
pub fn write_selector_list(path: &Path, selectors: &[TestSelector]) -> Result<(), ReportError> {
    let mut w = create(path)?;
    for selector in selectors {
        writeln!(w, "{selector}").map_err(|e| io_error(path, e))?;
    }
    w.flush().map_err(|e| io_error(path, e))
}

/// Write a test-deltas CSV
pub fn write_test_deltas(path: &Path, deltas: &[TestDelta]) -> Result<(), ReportError> {
    write_rows(
        path,
        TEST_DELTA_HEADER,
        deltas.iter().map(|d| {
            format!(
                "{},{},{},{},{}",
                csv_field(&d.selector.to_string()),
                d.added_lines,
                d.added_methods,
                d.added_branches,
                d.added_instructions
            )
        }),
    )
}

/// Write `class_deltas.csv`
pub fn write_class_deltas(path: &Path, deltas: &[ClassDelta]) -> Result<(), ReportError> {
    write_rows(
        path,
        CLASS_DELTA_HEADER,
        deltas.iter().map(|d| {
            format!(
                "{},{},{},{},{}",
                csv_field(&d.class_name),
                d.added_lines,
                d.added_methods,
                d.added_branches,
                d.added_instructions
            )
        }),
    )
}

/// Write `line_deltas_kept.csv`
pub fn write_line_deltas(path: &Path, rows: &[LineDeltaRow]) -> Result<(), ReportError> {
    write_rows(
        path,
        LINE_DELTA_HEADER,
        rows.iter().map(|r| {
            format!(
                "{},{},{},{}",
                csv_field(&r.selector.to_string()),
                csv_field(&r.class_name),
                csv_field(&r.newly_covered_ranges),
                csv_field(&r.upgraded_to_full_ranges)
            )
        }),
    )
}

/// Write a value as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, value)?;
    writeln!(w).map_err(|e| io_error(path, e))?;
    w.flush().map_err(|e| io_error(path, e))
}

/// Read a test-deltas CSV back in row order
pub fn read_test_deltas(path: &Path) -> Result<Vec<TestDelta>, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let malformed = |line: usize, message: String| ReportError::Malformed {
        path: path.to_path_buf(),
        line,
        message,
    };

    let records = parse_records(&text).map_err(|(line, message)| malformed(line, message))?;
    let mut records = records.into_iter();
    match records.next() {
        Some((_, header)) if header.join(",") == TEST_DELTA_HEADER => {}
        Some((line, header)) => {
            return Err(malformed(
                line,
                format!("unexpected header: {}", header.join(",")),
            ));
        }
        None => return Err(malformed(1, "missing header".to_string())),
    }

    records
        .map(|(line, fields)| {
            if fields.len() != 5 {
                return Err(malformed(
                    line,
                    format!("expected 5 fields, found {}", fields.len()),
                ));
            }
            let selector = TestSelector::parse(&fields[0])
                .map_err(|e| malformed(line, e.to_string()))?;
            let number = |i: usize| {
                fields[i].trim().parse::<i64>().map_err(|_| {
                    malformed(line, format!("field {} is not an integer: {}", i + 1, fields[i]))
                })
            };
            Ok(TestDelta {
                selector,
                added_lines: number(1)?,
                added_methods: number(2)?,
                added_branches: number(3)?,
                added_instructions: number(4)?,
            })
        })
        .collect()
}

/// Split CSV text into records, tagging each with its starting line.
///
/// Blank lines outside quotes are skipped.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, (usize, String)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    let _ = chars.next();
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    field.push(c);
                }
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if !(fields.is_empty() && field.trim().is_empty()) {
                    fields.push(std::mem::take(&mut field));
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                field.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err((record_line, "unterminated quoted field".to_string()));
    }
    if !(fields.is_empty() && field.trim().is_empty()) {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}

fn write_rows<I>(path: &Path, header: &str, rows: I) -> Result<(), ReportError>
where
    I: IntoIterator<Item = String>,
{
    let mut w = create(path)?;
    writeln!(w, "{header}").map_err(|e| io_error(path, e))?;
    for row in rows {
        writeln!(w, "{row}").map_err(|e| io_error(path, e))?;
    }
    w.flush().map_err(|e| io_error(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

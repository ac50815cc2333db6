//! JaCoCo XML fixtures shared by unit tests
//!
//! `sut_report` describes a single class `app/Sut` with four methods
//! `a`..`d`, one source line each (10, 20, 30, 40). Method `b` carries two
//! branches. A method listed in `covered` is fully executed, every other
//! method is missed. `sut_report_with` additionally takes methods that are
//! only partly executed: one instruction and one branch stay missed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub(crate) const METHODS: [&str; 4] = ["a", "b", "c", "d"];
const INSTRUCTIONS_PER_METHOD: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Execution {
    Missed,
    Partial,
    Full,
}

/// `(missed, covered)` pairs of one method
struct MethodCounts {
    instructions: (u64, u64),
    branches: (u64, u64),
    lines: (u64, u64),
    methods: (u64, u64),
}

fn branches(method: &str) -> u64 {
    if method == "b" {
        2
    } else {
        0
    }
}

fn counts(method: &str, execution: Execution) -> MethodCounts {
    let total_branches = branches(method);
    match execution {
        Execution::Missed => MethodCounts {
            instructions: (INSTRUCTIONS_PER_METHOD, 0),
            branches: (total_branches, 0),
            lines: (1, 0),
            methods: (1, 0),
        },
        Execution::Partial => MethodCounts {
            instructions: (1, INSTRUCTIONS_PER_METHOD - 1),
            branches: (total_branches.min(1), total_branches.saturating_sub(1)),
            lines: (0, 1),
            methods: (0, 1),
        },
        Execution::Full => MethodCounts {
            instructions: (0, INSTRUCTIONS_PER_METHOD),
            branches: (0, total_branches),
            lines: (0, 1),
            methods: (0, 1),
        },
    }
}

fn counter(out: &mut String, kind: &str, (missed, covered): (u64, u64)) {
    let _ = writeln!(
        out,
        r#"<counter type="{kind}" missed="{missed}" covered="{covered}"/>"#
    );
}

/// JaCoCo XML for `app/Sut` with the given methods executed
pub(crate) fn sut_report(covered: &[&str]) -> String {
    sut_report_with(covered, &[])
}

/// JaCoCo XML for `app/Sut` with `full` methods fully and `partial`
/// methods partly executed; `full` wins when a method is in both
pub(crate) fn sut_report_with(full: &[&str], partial: &[&str]) -> String {
    let execution = |method: &&str| {
        if full.contains(method) {
            Execution::Full
        } else if partial.contains(method) {
            Execution::Partial
        } else {
            Execution::Missed
        }
    };

    let mut out = String::from("<report name=\"fixture\"><package name=\"app\">\n");
    out.push_str("<class name=\"app/Sut\" sourcefilename=\"Sut.java\">\n");

    let mut totals = [(0u64, 0u64); 4];
    for (i, method) in METHODS.iter().enumerate() {
        let line = (i + 1) * 10;
        let c = counts(method, execution(method));
        let _ = writeln!(out, r#"<method name="{method}" desc="()V" line="{line}">"#);
        counter(&mut out, "INSTRUCTION", c.instructions);
        if branches(method) > 0 {
            counter(&mut out, "BRANCH", c.branches);
        }
        counter(&mut out, "LINE", c.lines);
        counter(&mut out, "METHOD", c.methods);
        out.push_str("</method>\n");

        let per_kind = [c.instructions, c.branches, c.lines, c.methods];
        for (total, (missed, covered)) in totals.iter_mut().zip(per_kind) {
            total.0 += missed;
            total.1 += covered;
        }
    }
    for (kind, pair) in ["INSTRUCTION", "BRANCH", "LINE", "METHOD"]
        .iter()
        .zip(totals)
    {
        counter(&mut out, kind, pair);
    }
    out.push_str("</class>\n<sourcefile name=\"Sut.java\">\n");

    for (i, method) in METHODS.iter().enumerate() {
        let c = counts(method, execution(method));
        let (mi, ci) = c.instructions;
        let (mb, cb) = c.branches;
        let _ = writeln!(
            out,
            r#"<line nr="{}" mi="{mi}" ci="{ci}" mb="{mb}" cb="{cb}"/>"#,
            (i + 1) * 10
        );
    }
    out.push_str("</sourcefile>\n</package></report>\n");
    out
}

/// Write `contents` to `dir/name` and return the path
pub(crate) fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap_or_else(|e| panic!("writing {name}: {e}"));
    path
}

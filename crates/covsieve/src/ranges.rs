//! Range encoding of line-number sets: `1-3;7-8;10`

use std::collections::BTreeSet;
use thiserror::Error;

/// Error decoding range text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid line range '{segment}' in '{input}'")]
pub struct RangeParseError {
    /// Whole input
    pub input: String,
    /// Offending `;`-separated segment
    pub segment: String,
}

/// Encode line numbers as maximal consecutive runs.
///
/// Input order and duplicates do not matter.
pub fn encode_ranges<I>(lines: I) -> String
where
    I: IntoIterator<Item = u32>,
{
    let sorted: BTreeSet<u32> = lines.into_iter().collect();
    let mut out = String::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return out;
    };

    let (mut start, mut prev) = (first, first);
    for line in iter {
        if prev.checked_add(1) == Some(line) {
            prev = line;
            continue;
        }
        push_run(&mut out, start, prev);
        out.push(';');
        start = line;
        prev = line;
    }
    push_run(&mut out, start, prev);
    out
}

fn push_run(out: &mut String, start: u32, end: u32) {
    if start == end {
        out.push_str(&start.to_string());
    } else {
        out.push_str(&format!("{start}-{end}"));
    }
}

/// Widest `start-end` run accepted by [`decode_ranges`]
pub const MAX_RANGE_SPAN: u32 = 1 << 20;

/// Decode range text back into the set of line numbers.
///
/// A run wider than [`MAX_RANGE_SPAN`] lines is rejected.
pub fn decode_ranges(text: &str) -> Result<BTreeSet<u32>, RangeParseError> {
    let mut lines = BTreeSet::new();
    if text.trim().is_empty() {
        return Ok(lines);
    }

    for segment in text.split(';') {
        let err = || RangeParseError {
            input: text.to_string(),
            segment: segment.to_string(),
        };
        let (start, end) = match segment.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<u32>().map_err(|_| err())?,
                b.trim().parse::<u32>().map_err(|_| err())?,
            ),
            None => {
                let n = segment.trim().parse::<u32>().map_err(|_| err())?;
                (n, n)
            }
        };
        if start > end || end - start >= MAX_RANGE_SPAN {
            return Err(err());
        }
        lines.extend(start..=end);
    }
    Ok(lines)
}

//! Version semantics for dependency diffing: prefix stripping, per-segment
//! numeric parsing, and bump classification.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    Major,
    Minor,
    Patch,
    None,
}

/// Strip one leading `^`, `~`, `=`, or `v`.
pub fn strip_prefix(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix(['^', '~', '=', 'v'])
        .unwrap_or(trimmed)
}

/// Parse `major.minor.patch`, tolerating missing segments and pre-release
/// suffixes (`1.2.3-beta.1` reads as `[1, 2, 3]`).
pub fn parse_version(version: &str) -> Vec<u64> {
    strip_prefix(version)
        .split('.')
        .take(3)
        .map(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

fn segment(parts: &[u64], index: usize) -> u64 {
    parts.get(index).copied().unwrap_or(0)
}

/// Lexicographic-per-numeric-segment ordering.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let pa = parse_version(a);
    let pb = parse_version(b);
    for i in 0..3 {
        match segment(&pa, i).cmp(&segment(&pb, i)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// The first differing segment decides the bump class.
pub fn classify_bump(old: &str, new: &str) -> Bump {
    let po = parse_version(old);
    let pn = parse_version(new);
    if segment(&po, 0) != segment(&pn, 0) {
        Bump::Major
    } else if segment(&po, 1) != segment(&pn, 1) {
        Bump::Minor
    } else if segment(&po, 2) != segment(&pn, 2) {
        Bump::Patch
    } else {
        Bump::None
    }
}

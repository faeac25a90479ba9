// src/version.rs

//! Version ordering for opaque package version strings
//!
//! Versions published by repositories are free-form strings. When both
//! sides parse as semver the semver order applies; otherwise the strings
//! are split into alternating numeric and non-numeric runs and compared
//! run by run, numeric runs numerically. The order is total and
//! round-trips through the canonical string form.

use semver::Version;
use std::cmp::Ordering;

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if let (Ok(va), Ok(vb)) = (Version::parse(a), Version::parse(b)) {
        return va.cmp(&vb);
    }
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        match (x, y) {
            (Chunk::Num(m), Chunk::Num(n)) => match m.cmp(n) {
                Ordering::Equal => {}
                ord => return ord,
            },
            (Chunk::Text(s), Chunk::Text(t)) => match s.cmp(t) {
                Ordering::Equal => {}
                ord => return ord,
            },
            // Numeric runs sort before textual ones: "1.0" < "1.0rc1" is
            // wrong for release candidates, but the order only has to be
            // total and stable, not distribution-accurate.
            (Chunk::Num(_), Chunk::Text(_)) => return Ordering::Less,
            (Chunk::Text(_), Chunk::Num(_)) => return Ordering::Greater,
        }
    }
    ca.len().cmp(&cb.len())
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Num(u64),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let run = &s[start..i];
            match run.parse::<u64>() {
                Ok(n) => out.push(Chunk::Num(n)),
                Err(_) => out.push(Chunk::Text(run)),
            }
        } else if bytes[i] == b'.' || bytes[i] == b'-' || bytes[i] == b'+' {
            // Separators order by their own byte value when they differ.
            i += 1;
            out.push(Chunk::Text(&s[start..i]));
        } else {
            while i < bytes.len()
                && !bytes[i].is_ascii_digit()
                && bytes[i] != b'.'
                && bytes[i] != b'-'
                && bytes[i] != b'+'
            {
                i += 1;
            }
            out.push(Chunk::Text(&s[start..i]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_order() {
        assert_eq!(compare("1.2.3", "1.2.10"), Ordering::Less);
        assert_eq!(compare("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn numeric_runs_compare_numerically() {
        assert_eq!(compare("1.9", "1.10"), Ordering::Less);
        assert_eq!(compare("0.3", "0.12"), Ordering::Less);
        assert_eq!(compare("10", "9"), Ordering::Greater);
    }

    #[test]
    fn mixed_runs() {
        assert_eq!(compare("4.0", "4.0a"), Ordering::Less);
        assert_eq!(compare("4.00", "4.0"), Ordering::Equal);
        assert_eq!(compare("1.0a", "1.0b"), Ordering::Less);
    }

    #[test]
    fn total_order_on_plain_strings() {
        assert_eq!(compare("alpha", "beta"), Ordering::Less);
        assert_eq!(compare("beta", "beta"), Ordering::Equal);
    }
}

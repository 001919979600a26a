//! Three-component version comparison.
//!
//! Only the first three dot-separated segments are inspected. A segment
//! contributes its leading digits; anything else (missing segment, `rc1`,
//! empty string) counts as 0. Pre-release and build suffixes are ignored.

use std::cmp::Ordering;

/// Remove a single leading `v` from a pinned version string.
pub fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn segments(version: &str) -> [u64; 3] {
    let mut out = [0u64; 3];
    for (slot, part) in out.iter_mut().zip(strip_v(version.trim()).split('.')) {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        *slot = digits.parse().unwrap_or(0);
    }
    out
}

/// Compare `a` and `b` by (major, minor, patch).
pub fn compare(a: &str, b: &str) -> Ordering {
    segments(a).cmp(&segments(b))
}

/// Sort a list of versions newest first.
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(b, a));
}

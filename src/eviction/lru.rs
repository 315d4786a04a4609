// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

/// Entry metadata for LRU victim selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LruCandidate {
    pub key: String,
    pub size: usize,
    pub last_accessed: i64,
}

/// Pick least-recently-used entries until at least `bytes_needed` are freed.
///
/// Returns victims oldest first. If every candidate together is not enough,
/// all of them are returned.
pub fn select_victims(mut candidates: Vec<LruCandidate>, bytes_needed: usize) -> Vec<LruCandidate> {
    if bytes_needed == 0 {
        return Vec::new();
    }

    candidates.sort_by(|a, b| {
        a.last_accessed
            .cmp(&b.last_accessed)
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut freed = 0usize;
    let mut victims = Vec::new();
    for candidate in candidates {
        if freed >= bytes_needed {
            break;
        }
        freed = freed.saturating_add(candidate.size);
        victims.push(candidate);
    }
    victims
}

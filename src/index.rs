use crate::caption::CaptionEntry;

/// Position of the active entry at `t`, if any.
pub fn resolve_index(t: f64, entries: &[CaptionEntry]) -> Option<usize> {
    entries.iter().position(|entry| entry.contains(t))
}

#[cfg(test)]
pub fn resolve(t: f64, entries: &[CaptionEntry]) -> Option<&CaptionEntry> {
    resolve_index(t, entries).map(|i| &entries[i])
}

use std::collections::HashSet;

use crate::types::ContentItem;

/// Remove duplicates by item `id`, keeping the first occurrence.
///
/// Later duplicates are dropped regardless of their field values; input
/// order is otherwise preserved. Applying this to its own output is a no-op.
pub fn dedupe_items(items: &[ContentItem]) -> Vec<ContentItem> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.id.as_str()) {
            kept.push(item.clone());
        }
    }
    kept
}

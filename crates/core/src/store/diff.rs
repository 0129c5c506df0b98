use std::collections::HashSet;
use std::hash::Hash;

use super::collection::ObservableCollection;

/// Counts of the edits applied by [`apply_diff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub replaced: usize,
    pub moved: usize,
}

impl DiffStats {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.replaced == 0 && self.moved == 0
    }
}

/// Bring `collection` to exactly `target` (same order, same values) with a
/// minimal set of keyed edits, delivered as one change batch.
///
/// Items whose key and value are unchanged keep their slot and are not
/// reported, so observers keyed on item identity do not re-render them.
/// Duplicate keys in `target` keep their first occurrence.
pub fn apply_diff<T, K>(
    collection: &ObservableCollection<T>,
    target: Vec<T>,
    key_of: impl Fn(&T) -> K,
) -> DiffStats
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Eq + Hash,
{
    let mut seen = HashSet::new();
    let target: Vec<T> = target
        .into_iter()
        .filter(|item| seen.insert(key_of(item)))
        .collect();
    let wanted = seen;

    collection.edit(|editor| {
        let mut stats = DiffStats {
            removed: editor.remove_where(|item| !wanted.contains(&key_of(item))),
            ..DiffStats::default()
        };

        for (index, want) in target.iter().enumerate() {
            let want_key = key_of(want);
            let in_place = editor
                .get(index)
                .map(|current| (key_of(current) == want_key, current == want));

            match in_place {
                Some((true, true)) => {}
                Some((true, false)) => {
                    editor.replace_at(index, want.clone());
                    stats.replaced += 1;
                }
                _ => {
                    let later = (index + 1..editor.len()).find(|&j| {
                        editor
                            .get(j)
                            .is_some_and(|current| key_of(current) == want_key)
                    });
                    match later {
                        Some(j) => {
                            editor.remove_at(j);
                            editor.insert(index, want.clone());
                            stats.moved += 1;
                        }
                        None => {
                            editor.insert(index, want.clone());
                            stats.added += 1;
                        }
                    }
                }
            }
        }

        // Leftovers can only be duplicate keys that were already present
        while editor.len() > target.len() {
            editor.remove_at(editor.len() - 1);
            stats.removed += 1;
        }

        stats
    })
}

use std::collections::{HashMap, HashSet};

use crate::mft::record::ROOT_RECORD;

pub const DEFAULT_MAX_DEPTH: usize = 255;

/// How a parent-chain walk terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOutcome {
    Resolved,
    /// The chain revisited a record.
    Cycle,
    /// Parent missing from the table, or its sequence number moved on.
    Orphan,
    /// Chain exceeded the depth cap.
    Deep,
}

#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub path: String,
    pub outcome: PathOutcome,
}

#[derive(Debug, Clone)]
struct PathEntry {
    parent: u64,
    parent_sequence: u16,
    sequence: u16,
    name: String,
}

/// Joins records into full paths by following $FILE_NAME parent references.
///
/// Populated during pass 1 with one entry per record that carries a file
/// name; resolution is memoized per record so the whole table resolves in
/// O(N). Termination cases: the root directory (record 5), a cycle, a
/// missing or reallocated parent, or the depth cap.
#[derive(Debug)]
pub struct PathBuilder {
    separator: char,
    max_depth: usize,
    entries: HashMap<u64, PathEntry>,
    cache: HashMap<u64, ResolvedPath>,
}

impl PathBuilder {
    pub fn new(separator: char, max_depth: usize) -> Self {
        Self {
            separator,
            max_depth,
            entries: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.entries.reserve(additional);
        self.cache.reserve(additional);
    }

    pub fn add_entry(
        &mut self,
        record: u64,
        sequence: u16,
        parent: u64,
        parent_sequence: u16,
        name: String,
    ) {
        self.entries.insert(
            record,
            PathEntry {
                parent,
                parent_sequence,
                sequence,
                name,
            },
        );
    }

    pub fn contains(&self, record: u64) -> bool {
        self.entries.contains_key(&record)
    }

    /// Resolve the full path of `record`. Results (including every
    /// intermediate ancestor) are cached.
    pub fn resolve(&mut self, record: u64) -> ResolvedPath {
        if let Some(hit) = self.cache.get(&record) {
            return hit.clone();
        }

        let sep = self.separator;
        let mut chain: Vec<u64> = Vec::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut cursor = record;

        // Walk up until something terminates the chain; `base` is the path
        // everything below it hangs from.
        let (mut base, outcome) = loop {
            if let Some(hit) = self.cache.get(&cursor) {
                break (hit.path.clone(), hit.outcome);
            }
            if !visited.insert(cursor) {
                break (format!("<cycle>{sep}"), PathOutcome::Cycle);
            }
            if chain.len() > self.max_depth {
                break (sep.to_string(), PathOutcome::Deep);
            }
            // The root terminates a chain whether or not record 5 itself
            // made it into the table.
            if cursor == ROOT_RECORD {
                break (sep.to_string(), PathOutcome::Resolved);
            }
            let Some(entry) = self.entries.get(&cursor) else {
                break (format!("<orphan>{sep}"), PathOutcome::Orphan);
            };
            chain.push(cursor);
            let parent = entry.parent;
            if parent == cursor {
                // Self-parented outside the root: nothing above it.
                break (format!("<orphan>{sep}"), PathOutcome::Orphan);
            }
            // A reallocated parent means this name no longer lives there.
            if let Some(parent_entry) = self.entries.get(&parent) {
                if entry.parent_sequence != 0
                    && parent != ROOT_RECORD
                    && parent_entry.sequence != entry.parent_sequence
                {
                    break (format!("<orphan>{sep}"), PathOutcome::Orphan);
                }
            }
            cursor = parent;
        };

        // Unwind from the topmost collected record down to the target,
        // caching every path built along the way.
        for &rec in chain.iter().rev() {
            let name = &self.entries[&rec].name;
            if name != "." {
                if !base.ends_with(sep) {
                    base.push(sep);
                }
                base.push_str(name);
            }
            self.cache.insert(
                rec,
                ResolvedPath {
                    path: base.clone(),
                    outcome,
                },
            );
        }

        let resolved = if record == ROOT_RECORD {
            ResolvedPath {
                path: sep.to_string(),
                outcome: PathOutcome::Resolved,
            }
        } else {
            self.cache
                .get(&record)
                .cloned()
                .unwrap_or(ResolvedPath {
                    path: base,
                    outcome,
                })
        };
        self.cache.entry(record).or_insert_with(|| resolved.clone());
        resolved
    }

    /// Whether `record` is present and carries the in-use sequence given.
    pub fn entry_sequence(&self, record: u64) -> Option<u16> {
        self.entries.get(&record).map(|e| e.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PathBuilder {
        let mut b = PathBuilder::new('\\', DEFAULT_MAX_DEPTH);
        b.add_entry(ROOT_RECORD, 1, ROOT_RECORD, 1, ".".into());
        b
    }

    #[test]
    fn root_is_a_single_separator() {
        let mut b = builder();
        let resolved = b.resolve(ROOT_RECORD);
        assert_eq!(resolved.path, "\\");
        assert_eq!(resolved.outcome, PathOutcome::Resolved);
    }

    #[test]
    fn file_directly_under_root() {
        let mut b = builder();
        b.add_entry(0, 1, ROOT_RECORD, 1, "$MFT".into());
        assert_eq!(b.resolve(0).path, "\\$MFT");
    }

    #[test]
    fn nested_directories() {
        let mut b = builder();
        b.add_entry(64, 1, ROOT_RECORD, 1, "Windows".into());
        b.add_entry(65, 1, 64, 1, "System32".into());
        b.add_entry(66, 1, 65, 1, "cmd.exe".into());
        assert_eq!(b.resolve(66).path, "\\Windows\\System32\\cmd.exe");
        // Ancestors got cached on the way.
        assert_eq!(b.resolve(65).path, "\\Windows\\System32");
    }

    #[test]
    fn forward_slash_separator() {
        let mut b = PathBuilder::new('/', DEFAULT_MAX_DEPTH);
        b.add_entry(ROOT_RECORD, 1, ROOT_RECORD, 1, ".".into());
        b.add_entry(70, 1, ROOT_RECORD, 1, "tmp".into());
        b.add_entry(71, 1, 70, 1, "a.txt".into());
        assert_eq!(b.resolve(71).path, "/tmp/a.txt");
    }

    #[test]
    fn two_record_cycle() {
        let mut b = builder();
        b.add_entry(100, 1, 101, 1, "a".into());
        b.add_entry(101, 1, 100, 1, "b".into());
        let ra = b.resolve(100);
        let rb = b.resolve(101);
        assert_eq!(ra.outcome, PathOutcome::Cycle);
        assert!(ra.path.starts_with("<cycle>\\"));
        assert!(rb.path.starts_with("<cycle>\\"));
    }

    #[test]
    fn missing_parent_is_an_orphan() {
        let mut b = builder();
        b.add_entry(200, 1, 9999, 1, "lost.txt".into());
        let r = b.resolve(200);
        assert_eq!(r.outcome, PathOutcome::Orphan);
        assert_eq!(r.path, "<orphan>\\lost.txt");
    }

    #[test]
    fn reallocated_parent_is_an_orphan() {
        let mut b = builder();
        // Child expects parent sequence 2, parent has moved on to 5.
        b.add_entry(300, 1, 301, 2, "old.txt".into());
        b.add_entry(301, 5, ROOT_RECORD, 1, "newdir".into());
        let r = b.resolve(300);
        assert_eq!(r.outcome, PathOutcome::Orphan);
        assert_eq!(r.path, "<orphan>\\old.txt");
    }

    #[test]
    fn depth_cap_terminates() {
        let mut b = PathBuilder::new('\\', 10);
        b.add_entry(ROOT_RECORD, 1, ROOT_RECORD, 1, ".".into());
        for i in 0..40u64 {
            b.add_entry(1000 + i, 1, 1000 + i + 1, 1, format!("d{i}"));
        }
        b.add_entry(1040, 1, ROOT_RECORD, 1, "top".into());
        let r = b.resolve(1000);
        assert_eq!(r.outcome, PathOutcome::Deep);
    }

    #[test]
    fn resolution_is_memoized() {
        let mut b = builder();
        b.add_entry(400, 1, ROOT_RECORD, 1, "f".into());
        let first = b.resolve(400);
        let second = b.resolve(400);
        assert_eq!(first.path, second.path);
        assert!(b.cache.contains_key(&400));
    }
}

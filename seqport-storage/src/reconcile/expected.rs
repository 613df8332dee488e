/// Names the catalog asserts should exist below one directory
use std::collections::BTreeMap;
use std::path::{Component, Path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedEntry {
    /// A file; `required` files are catalog-referenced and reported when absent, optional ones
    /// (sidecars) are merely kept
    File { required: bool },
    /// Kept with everything beneath it, never inspected
    Whole,
    /// A directory whose children are checked against their own set
    Directory(ExpectedSet),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSet {
    entries: BTreeMap<String, ExpectedEntry>,
}

impl ExpectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a file at `relative`, creating intermediate directory entries
    pub fn insert_file(&mut self, relative: &Path, required: bool) {
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some(name) = parts.pop() else { return };

        let mut set = self;
        for dir in parts {
            set = set.directory(&dir);
        }
        // a required reference wins over an optional sidecar of the same name
        match set.entries.get_mut(&name) {
            Some(ExpectedEntry::File { required: existing }) => *existing |= required,
            Some(_) => {}
            None => {
                set.entries.insert(name, ExpectedEntry::File { required });
            }
        }
    }

    pub fn insert_whole(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), ExpectedEntry::Whole);
    }

    /// The set for subdirectory `name`, created empty if needed
    pub fn directory(&mut self, name: &str) -> &mut ExpectedSet {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| ExpectedEntry::Directory(ExpectedSet::new()));
        if !matches!(entry, ExpectedEntry::Directory(_)) {
            *entry = ExpectedEntry::Directory(ExpectedSet::new());
        }
        match entry {
            ExpectedEntry::Directory(set) => set,
            _ => unreachable!("entry was just made a directory"),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExpectedEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExpectedEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! In-memory view of the Salesforce sources found in one run.

use crate::artifact::{ArtifactKind, Subtype};
use crate::file::DiscoveredFile;
use std::collections::BTreeMap;

/// Files of one bundle directory, keyed by their role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentBundle {
    /// Primary file for each subtype
    pub files: BTreeMap<Subtype, DiscoveredFile>,

    /// Further files of an already occupied subtype (e.g. a second `.js` module)
    pub extras: Vec<DiscoveredFile>,
}

impl ComponentBundle {
    fn insert(&mut self, name: &str, subtype: Subtype, file: DiscoveredFile) {
        match self.files.remove(&subtype) {
            None => {
                self.files.insert(subtype, file);
            }
            Some(existing) => {
                // The file named after its bundle is the primary one.
                let (primary, extra) = if is_named_after(&file, name) && !is_named_after(&existing, name) {
                    (file, existing)
                } else {
                    (existing, file)
                };
                self.files.insert(subtype, primary);
                self.extras.push(extra);
                self.extras.sort_by(|a, b| a.path.cmp(&b.path));
            }
        }
    }

    /// Returns every file in the bundle, primary files first.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.files.values().chain(self.extras.iter())
    }

    /// Returns the number of files in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len() + self.extras.len()
    }

    /// Returns true if the bundle holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.extras.is_empty()
    }
}

fn is_named_after(file: &DiscoveredFile, name: &str) -> bool {
    file.file_name().split('.').next() == Some(name)
}

/// Component bundles of one grouped kind, keyed by component name.
pub type ComponentGroup = BTreeMap<String, ComponentBundle>;

/// Files discovered for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactFiles {
    /// Standalone files, sorted by path
    Flat(Vec<DiscoveredFile>),
    /// Bundles keyed by component name
    Grouped(ComponentGroup),
}

impl ArtifactFiles {
    /// Returns the total number of files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        match self {
            Self::Flat(files) => files.len(),
            Self::Grouped(group) => group.values().map(ComponentBundle::len).sum(),
        }
    }

    /// Returns the total size of all files in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.iter_files().map(|f| f.size_bytes).sum()
    }

    /// Iterates over every file regardless of shape.
    pub fn iter_files(&self) -> Box<dyn Iterator<Item = &DiscoveredFile> + '_> {
        match self {
            Self::Flat(files) => Box::new(files.iter()),
            Self::Grouped(group) => Box::new(group.values().flat_map(ComponentBundle::iter)),
        }
    }

    /// Returns the logical component names, in order.
    #[must_use]
    pub fn component_names(&self, kind: ArtifactKind) -> Vec<String> {
        match self {
            Self::Flat(files) => files
                .iter()
                .map(|f| kind.component_name(&f.path_buf()))
                .collect(),
            Self::Grouped(group) => group.keys().cloned().collect(),
        }
    }

    /// Returns the first component name, used to title the document.
    #[must_use]
    pub fn primary_name(&self, kind: ArtifactKind) -> Option<String> {
        match self {
            Self::Flat(files) => files.first().map(|f| kind.component_name(&f.path_buf())),
            Self::Grouped(group) => group.keys().next().cloned(),
        }
    }
}

/// Everything discovered in the scan root, keyed by artifact kind.
///
/// Kinds without any matching file are absent rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySnapshot {
    entries: BTreeMap<ArtifactKind, ArtifactFiles>,
}

impl RepositorySnapshot {
    /// Creates a builder for assembling a snapshot.
    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Returns the files of a kind, if any were found.
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactFiles> {
        self.entries.get(&kind)
    }

    /// Iterates over the present kinds in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &ArtifactFiles)> {
        self.entries.iter().map(|(kind, files)| (*kind, files))
    }

    /// Returns true if no files were discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of kinds present.
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the total number of files across all kinds.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.values().map(ArtifactFiles::file_count).sum()
    }

    /// Returns the total size of all files in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(ArtifactFiles::total_bytes).sum()
    }
}

/// Incrementally assembles a [`RepositorySnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    entries: BTreeMap<ArtifactKind, ArtifactFiles>,
}

impl SnapshotBuilder {
    /// Adds a standalone file of a flat kind.
    pub fn add_flat(&mut self, kind: ArtifactKind, file: DiscoveredFile) -> &mut Self {
        let entry = self
            .entries
            .entry(kind)
            .or_insert_with(|| ArtifactFiles::Flat(Vec::new()));

        if let ArtifactFiles::Flat(files) = entry {
            files.push(file);
        }
        self
    }

    /// Adds a bundle file of a grouped kind.
    pub fn add_grouped(
        &mut self,
        kind: ArtifactKind,
        component: impl Into<String>,
        subtype: Subtype,
        file: DiscoveredFile,
    ) -> &mut Self {
        let component = component.into();
        let entry = self
            .entries
            .entry(kind)
            .or_insert_with(|| ArtifactFiles::Grouped(ComponentGroup::new()));

        if let ArtifactFiles::Grouped(group) = entry {
            group
                .entry(component.clone())
                .or_default()
                .insert(&component, subtype, file);
        }
        self
    }

    /// Finishes the snapshot, sorting flat file lists by path.
    #[must_use]
    pub fn build(mut self) -> RepositorySnapshot {
        for files in self.entries.values_mut() {
            if let ArtifactFiles::Flat(files) = files {
                files.sort_by(|a, b| a.path.cmp(&b.path));
            }
        }

        RepositorySnapshot {
            entries: self.entries,
        }
    }
}

use crate::{
    artifact::{ArtifactMatcher, Shape},
    error::{Error, Result},
    file::DiscoveredFile,
    snapshot::RepositorySnapshot,
};
use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    /// Files visited by the walker
    pub visited_files: usize,

    /// Files matching an artifact pattern
    pub matched_files: usize,

    /// Matched files read successfully
    pub read_files: usize,

    /// Matched files skipped because they could not be read
    pub unreadable_files: usize,
}

/// Walks the scan root and collects Salesforce sources into a snapshot.
pub struct Scanner {
    root_dir: PathBuf,
    matcher: ArtifactMatcher,
}

impl Scanner {
    /// Creates a scanner rooted at `root_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact patterns fail to compile.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root_dir: root_dir.into(),
            matcher: ArtifactMatcher::new()?,
        })
    }

    /// Scans the root directory.
    ///
    /// Unreadable files are logged and skipped. Kinds with no matching files
    /// do not appear in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing matched.
    pub fn scan(&self) -> Result<(RepositorySnapshot, ScanStats)> {
        let mut builder = RepositorySnapshot::builder();
        let mut stats = ScanStats::default();

        debug!("Starting scan of {}", self.root_dir.display());

        let walker = WalkBuilder::new(&self.root_dir)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .hidden(true)
            .follow_links(false)
            .require_git(false)
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            stats.visited_files += 1;

            let relative = self.relative_path(&entry);
            let Some((kind, subtype)) = self.matcher.classify(&relative) else {
                continue;
            };
            stats.matched_files += 1;

            let relative_str = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            trace!("Matched {} as {:?}", relative_str, kind);

            let file = match DiscoveredFile::read(entry.path(), relative_str) {
                Ok(file) => file,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", entry.path().display(), e);
                    stats.unreadable_files += 1;
                    continue;
                }
            };
            stats.read_files += 1;

            match (kind.shape(), subtype) {
                (Shape::Grouped(_), Some(subtype)) => {
                    let component = kind.component_name(&relative);
                    builder.add_grouped(kind, component, subtype, file);
                }
                _ => {
                    builder.add_flat(kind, file);
                }
            }
        }

        let snapshot = builder.build();

        debug!(
            "Scan complete: {} visited, {} matched, {} read, {} unreadable",
            stats.visited_files, stats.matched_files, stats.read_files, stats.unreadable_files
        );

        if stats.unreadable_files > 0 {
            warn!(
                "Skipped {} unreadable file(s) during scanning (non-fatal)",
                stats.unreadable_files
            );
        }

        if snapshot.is_empty() {
            return Err(Error::no_files(&self.root_dir));
        }

        Ok((snapshot, stats))
    }

    fn relative_path(&self, entry: &DirEntry) -> PathBuf {
        let path = entry.path();
        pathdiff::diff_paths(path, &self.root_dir).unwrap_or_else(|| path.to_path_buf())
    }

    /// Returns the scan root.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactKind, Subtype};
    use crate::snapshot::ArtifactFiles;
    use assert_fs::prelude::*;

    #[test]
    fn test_scanner_groups_lwc_bundle() {
        let temp = assert_fs::TempDir::new().unwrap();
        let base = "force-app/main/default/lwc/orderSummary";
        temp.child(format!("{base}/orderSummary.html")).write_str("<template></template>").unwrap();
        temp.child(format!("{base}/orderSummary.js")).write_str("export default class {}").unwrap();
        temp.child(format!("{base}/orderSummary.css")).write_str(".x {}").unwrap();
        temp.child(format!("{base}/orderSummary.js-meta.xml")).write_str("<LightningComponentBundle/>").unwrap();

        let (snapshot, stats) = Scanner::new(temp.path()).unwrap().scan().unwrap();

        assert_eq!(stats.matched_files, 4);
        assert_eq!(snapshot.kind_count(), 1);
        let ArtifactFiles::Grouped(group) = snapshot.get(ArtifactKind::LightningComponent).unwrap() else {
            panic!("expected grouped files");
        };
        let bundle = &group["orderSummary"];
        assert_eq!(bundle.files.len(), 4);
        assert_eq!(
            bundle.files[&Subtype::Config].path,
            format!("{base}/orderSummary.js-meta.xml")
        );
    }

    #[test]
    fn test_scanner_flat_kinds() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("classes/AccountProcessor.cls").write_str("public class AccountProcessor {}").unwrap();
        temp.child("triggers/AccountTrigger.trigger").write_str("trigger AccountTrigger on Account (before insert) {}").unwrap();
        temp.child("README.md").write_str("# readme").unwrap();

        let (snapshot, stats) = Scanner::new(temp.path()).unwrap().scan().unwrap();

        assert_eq!(stats.matched_files, 2);
        assert_eq!(snapshot.file_count(), 2);
        assert!(snapshot.get(ArtifactKind::ApexClass).is_some());
        assert!(snapshot.get(ArtifactKind::ApexTrigger).is_some());
        assert!(snapshot.get(ArtifactKind::Flow).is_none());
    }

    #[test]
    fn test_scanner_skips_unreadable_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("classes/Good.cls").write_str("public class Good {}").unwrap();
        temp.child("classes/Bad.cls").write_binary(&[0xff, 0xfe, 0x00, 0x81]).unwrap();

        let (snapshot, stats) = Scanner::new(temp.path()).unwrap().scan().unwrap();

        assert_eq!(stats.unreadable_files, 1);
        assert_eq!(snapshot.file_count(), 1);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes.txt").write_str("nothing to see").unwrap();

        let err = Scanner::new(temp.path()).unwrap().scan().unwrap_err();
        assert!(matches!(err, Error::NoFiles { .. }));
    }

    #[test]
    fn test_scanner_respects_gitignore() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored/\n").unwrap();
        temp.child("classes/Kept.cls").write_str("public class Kept {}").unwrap();
        temp.child("ignored/Dropped.cls").write_str("public class Dropped {}").unwrap();

        let (snapshot, _) = Scanner::new(temp.path()).unwrap().scan().unwrap();

        assert_eq!(snapshot.file_count(), 1);
    }
}

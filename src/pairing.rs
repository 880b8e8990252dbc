//! Match tree files of two directories by filename stem.
//!
//! The reference directory only contributes files with a tree extension; the
//! comparison directory contributes every regular entry. A file's stem is the
//! text before its FIRST `.`, so `A.nwk`, `A.newick` and `A.tree.gz` all pair
//! under `A`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, TreeDistError};

/// Extensions recognised as tree files in the reference directory.
pub const TREE_EXTENSIONS: [&str; 3] = ["nwk", "nw", "newick"];

/// One pair of tree files to compare, identified by their shared stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonUnit {
    pub id: String,
    pub reference: PathBuf,
    pub comparison: PathBuf,
}

/// A file that found no partner in the other directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedEntry {
    pub stem: String,
    pub path: PathBuf,
    /// Directory in which no counterpart was found.
    pub missing_from: PathBuf,
}

/// Result of pairing two directories.
#[derive(Debug, Clone, Default)]
pub struct Pairing {
    /// Fully paired units, sorted by id.
    pub units: Vec<ComparisonUnit>,
    /// Every entry left without a partner, in discovery order.
    pub unmatched: Vec<UnmatchedEntry>,
}

impl Pairing {
    /// Log one warning per unmatched entry.
    pub fn warn_unmatched(&self) {
        for entry in &self.unmatched {
            warn!(stem = %entry.stem, "{}", TreeDistError::UnmatchedEntry(entry.clone()));
        }
    }
}

/// Pair the tree files of `reference_dir` with the files of `comparison_dir`.
///
/// # Errors
/// [`TreeDistError::ReadDir`] if either directory cannot be listed. Entries
/// without a partner are NOT errors; they are returned in
/// [`Pairing::unmatched`].
pub fn resolve_pairs<P, Q>(reference_dir: P, comparison_dir: Q) -> Result<Pairing>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let reference_dir = reference_dir.as_ref();
    let comparison_dir = comparison_dir.as_ref();
    let mut unmatched = Vec::new();

    let mut pending: BTreeMap<String, (PathBuf, Option<PathBuf>)> = BTreeMap::new();
    for name in list_files(reference_dir)? {
        if !has_tree_extension(&name) {
            continue;
        }
        let path = reference_dir.join(&name);
        let stem = file_stem(&name).to_string();
        if pending.contains_key(&stem) {
            // Same stem twice in one directory: keep the first file.
            unmatched.push(UnmatchedEntry {
                stem,
                path,
                missing_from: comparison_dir.to_path_buf(),
            });
            continue;
        }
        pending.insert(stem, (path, None));
    }

    for name in list_files(comparison_dir)? {
        let path = comparison_dir.join(&name);
        let stem = file_stem(&name).to_string();
        match pending.get_mut(&stem) {
            Some((_, partner @ None)) => *partner = Some(path),
            _ => unmatched.push(UnmatchedEntry {
                stem,
                path,
                missing_from: reference_dir.to_path_buf(),
            }),
        }
    }

    let mut units = Vec::with_capacity(pending.len());
    for (stem, (reference, comparison)) in pending {
        match comparison {
            Some(comparison) => units.push(ComparisonUnit {
                id: stem,
                reference,
                comparison,
            }),
            None => unmatched.push(UnmatchedEntry {
                stem,
                path: reference,
                missing_from: comparison_dir.to_path_buf(),
            }),
        }
    }

    Ok(Pairing { units, unmatched })
}

/// Names of the non-directory entries of `dir`, sorted.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    let read_err = |source| TreeDistError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_type().map_err(read_err)?.is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

fn has_tree_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TREE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "(A,B);").unwrap();
    }

    #[test]
    fn stems_and_extensions() {
        assert_eq!(file_stem("A.nwk"), "A");
        assert_eq!(file_stem("A.tree.newick"), "A");
        assert_eq!(file_stem("noext"), "noext");
        assert!(has_tree_extension("A.nwk"));
        assert!(has_tree_extension("A.tree.newick"));
        assert!(!has_tree_extension("A.txt"));
        assert!(!has_tree_extension("nwk"));
    }

    #[test]
    fn pairs_by_stem_and_reports_each_unmatched_entry() {
        let real = tempfile::tempdir().unwrap();
        let pred = tempfile::tempdir().unwrap();
        touch(real.path(), "A.nwk");
        touch(real.path(), "B.nwk");
        touch(pred.path(), "A.newick");
        touch(pred.path(), "B.nw");
        touch(pred.path(), "C.nw");

        let pairing = resolve_pairs(real.path(), pred.path()).unwrap();

        let ids: Vec<_> = pairing.units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(pairing.units[0].reference, real.path().join("A.nwk"));
        assert_eq!(pairing.units[0].comparison, pred.path().join("A.newick"));

        assert_eq!(
            pairing.unmatched,
            vec![UnmatchedEntry {
                stem: "C".into(),
                path: pred.path().join("C.nw"),
                missing_from: real.path().to_path_buf(),
            }]
        );
    }

    #[test]
    fn every_unmatched_entry_is_kept() {
        let real = tempfile::tempdir().unwrap();
        let pred = tempfile::tempdir().unwrap();
        touch(real.path(), "A.nwk");
        touch(real.path(), "R.nwk");
        touch(real.path(), "notes.txt");
        touch(pred.path(), "A.nwk");
        touch(pred.path(), "X.nwk");
        touch(pred.path(), "Y.txt");
        fs::create_dir(pred.path().join("Z")).unwrap();

        let pairing = resolve_pairs(real.path(), pred.path()).unwrap();

        assert_eq!(pairing.units.len(), 1);
        let stems: Vec<_> = pairing.unmatched.iter().map(|e| e.stem.as_str()).collect();
        assert_eq!(stems, ["X", "Y", "R"]);
        assert_eq!(pairing.unmatched[2].missing_from, pred.path());
    }

    #[test]
    fn duplicate_stems_keep_the_first_file() {
        let real = tempfile::tempdir().unwrap();
        let pred = tempfile::tempdir().unwrap();
        touch(real.path(), "A.newick");
        touch(real.path(), "A.nwk");
        touch(pred.path(), "A.nw");
        touch(pred.path(), "A.nwk");

        let pairing = resolve_pairs(real.path(), pred.path()).unwrap();

        assert_eq!(pairing.units.len(), 1);
        assert_eq!(pairing.units[0].reference, real.path().join("A.newick"));
        assert_eq!(pairing.units[0].comparison, pred.path().join("A.nw"));
        assert_eq!(pairing.unmatched.len(), 2);
    }

    #[test]
    fn missing_directory_is_fatal() {
        let real = tempfile::tempdir().unwrap();
        let err = resolve_pairs(real.path(), real.path().join("nope")).unwrap_err();
        assert!(matches!(err, TreeDistError::ReadDir { .. }));
    }
}

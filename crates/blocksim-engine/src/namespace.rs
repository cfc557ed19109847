//! Directory and file metadata seen by the dispatcher
//!
//! The dispatcher only needs to resolve directories, test for files and
//! track which blocks each file owns. [`Namespace`] is that seam;
//! [`MemoryNamespace`] is a flat in-memory implementation keyed by
//! normalized directory path.

use blocksim_common::{BlockAddr, Error, Result};
use std::collections::BTreeMap;

/// Resolved directory, identified by its normalized path
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DirHandle(String);

impl DirHandle {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// Metadata capability consumed by the dispatch loop
pub trait Namespace: Send {
    /// Resolve `path` to a directory, or `None` if it does not exist
    fn resolve_directory(&self, path: &str) -> Option<DirHandle>;

    fn file_exists(&self, dir: &DirHandle, file: &str) -> bool;

    /// Blocks owned by `file`, in allocation order
    fn file_blocks(&self, dir: &DirHandle, file: &str) -> Option<Vec<BlockAddr>>;

    /// Record a new file; replaces any existing entry of the same name
    fn insert_file(&mut self, dir: &DirHandle, file: &str, blocks: Vec<BlockAddr>);

    /// Forget `file`, returning the blocks it owned
    fn remove_file(&mut self, dir: &DirHandle, file: &str) -> Option<Vec<BlockAddr>>;

    /// Every known file name with its block list
    fn all_files(&self) -> Vec<(String, Vec<BlockAddr>)>;

    /// Drop everything except the root directory
    fn clear(&mut self);
}

/// In-memory namespace; the root directory `/` always exists
#[derive(Clone, Debug)]
pub struct MemoryNamespace {
    dirs: BTreeMap<String, BTreeMap<String, Vec<BlockAddr>>>,
}

impl Default for MemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNamespace {
    pub const ROOT: &'static str = "/";

    #[must_use]
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(Self::ROOT.to_string(), BTreeMap::new());
        Self { dirs }
    }

    /// Create `name` under `parent`
    ///
    /// Creating a directory that already exists returns its handle.
    pub fn create_directory(&mut self, parent: &str, name: &str) -> Result<DirHandle> {
        let name = name.trim_matches('/');
        if name.is_empty() || name.contains('/') {
            return Err(Error::invalid_argument(format!(
                "invalid directory name: {name:?}"
            )));
        }
        let parent = self
            .resolve_directory(parent)
            .ok_or_else(|| Error::TargetNotFound {
                path: parent.to_string(),
                file: name.to_string(),
            })?;

        let path = if parent.path() == Self::ROOT {
            format!("/{name}")
        } else {
            format!("{}/{name}", parent.path())
        };
        self.dirs.entry(path.clone()).or_default();
        Ok(DirHandle(path))
    }

    /// Number of files directly inside `path`
    #[must_use]
    pub fn directory_size(&self, path: &str) -> Option<usize> {
        self.dirs.get(&normalize(path)).map(BTreeMap::len)
    }
}

/// Collapse repeated and trailing separators; empty means root
fn normalize(path: &str) -> String {
    let parts: Vec<_> = path.split('/').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        MemoryNamespace::ROOT.to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

impl Namespace for MemoryNamespace {
    fn resolve_directory(&self, path: &str) -> Option<DirHandle> {
        let path = normalize(path);
        self.dirs.contains_key(&path).then_some(DirHandle(path))
    }

    fn file_exists(&self, dir: &DirHandle, file: &str) -> bool {
        self.dirs
            .get(dir.path())
            .is_some_and(|files| files.contains_key(file))
    }

    fn file_blocks(&self, dir: &DirHandle, file: &str) -> Option<Vec<BlockAddr>> {
        self.dirs.get(dir.path())?.get(file).cloned()
    }

    fn insert_file(&mut self, dir: &DirHandle, file: &str, blocks: Vec<BlockAddr>) {
        self.dirs
            .entry(dir.path().to_string())
            .or_default()
            .insert(file.to_string(), blocks);
    }

    fn remove_file(&mut self, dir: &DirHandle, file: &str) -> Option<Vec<BlockAddr>> {
        self.dirs.get_mut(dir.path())?.remove(file)
    }

    fn all_files(&self) -> Vec<(String, Vec<BlockAddr>)> {
        self.dirs
            .values()
            .flat_map(|files| {
                files
                    .iter()
                    .map(|(name, blocks)| (name.clone(), blocks.clone()))
            })
            .collect()
    }

    fn clear(&mut self) {
        self.dirs.clear();
        self.dirs.insert(Self::ROOT.to_string(), BTreeMap::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_always_resolves() {
        let ns = MemoryNamespace::new();
        assert_eq!(ns.resolve_directory("/").unwrap().path(), "/");
        assert_eq!(ns.resolve_directory("").unwrap().path(), "/");
        assert!(ns.resolve_directory("/missing").is_none());
    }

    #[test]
    fn test_create_directory() {
        let mut ns = MemoryNamespace::new();
        let docs = ns.create_directory("/", "docs").unwrap();
        assert_eq!(docs.path(), "/docs");

        let nested = ns.create_directory("/docs/", "2024").unwrap();
        assert_eq!(nested.path(), "/docs/2024");
        assert!(ns.resolve_directory("//docs//2024/").is_some());

        assert!(ns.create_directory("/nope", "x").unwrap_err().is_not_found());
        assert!(ns.create_directory("/", "").is_err());
        assert!(ns.create_directory("/", "a/b").is_err());
    }

    #[test]
    fn test_file_lifecycle() {
        let mut ns = MemoryNamespace::new();
        let root = ns.resolve_directory("/").unwrap();

        assert!(!ns.file_exists(&root, "a.txt"));
        ns.insert_file(&root, "a.txt", vec![4, 1, 7]);
        assert!(ns.file_exists(&root, "a.txt"));
        assert_eq!(ns.file_blocks(&root, "a.txt"), Some(vec![4, 1, 7]));
        assert_eq!(ns.directory_size("/"), Some(1));

        assert_eq!(ns.remove_file(&root, "a.txt"), Some(vec![4, 1, 7]));
        assert!(ns.remove_file(&root, "a.txt").is_none());
        assert!(ns.file_blocks(&root, "a.txt").is_none());
    }

    #[test]
    fn test_all_files_and_clear() {
        let mut ns = MemoryNamespace::new();
        let root = ns.resolve_directory("/").unwrap();
        let docs = ns.create_directory("/", "docs").unwrap();
        ns.insert_file(&root, "a.txt", vec![1]);
        ns.insert_file(&docs, "b.txt", vec![2, 3]);

        let mut files = ns.all_files();
        files.sort();
        assert_eq!(
            files,
            vec![("a.txt".to_string(), vec![1]), ("b.txt".to_string(), vec![2, 3])]
        );

        ns.clear();
        assert!(ns.all_files().is_empty());
        assert!(ns.resolve_directory("/docs").is_none());
        assert!(ns.resolve_directory("/").is_some());
    }
}

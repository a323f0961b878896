//! Working-tree interface consumed by `AddCommand`, `CommitCommand --all`,
//! and `CheckoutCommand`.
//!
//! Mirrors the filesystem surface the teacher's merge/conflict code already
//! writes through (`git_merge::conflict::write_conflict_markers`), lifted
//! into a small trait so commands can be exercised against a plain
//! filesystem tree without depending on a particular layout beyond "files
//! under a root path".

use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_object::{FileMode, Object};
use git_odb::ObjectDatabase;

/// Errors from working-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("no working tree for bare repository")]
    NoWorkTree,

    #[error("path escapes the working tree: {0}")]
    PathEscapesRoot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),
}

/// A single entry yielded by [`Worktree::walk`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: BString,
    pub mode: FileMode,
    pub size: u64,
    pub is_directory: bool,
}

/// Options for writing content into the working tree.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub executable: bool,
}

/// Result of materializing a tree into the working tree.
#[derive(Debug, Clone, Default)]
pub struct CheckoutReport {
    pub updated: Vec<BString>,
    pub removed: Vec<BString>,
    pub conflicts: Vec<BString>,
    pub failed: Vec<BString>,
}

/// The working-tree abstraction per the external interface contract: walk,
/// stat, read/write content, and bulk checkout of a tree or a path subset.
pub trait Worktree {
    fn walk(&self) -> Result<Vec<WalkEntry>, WorktreeError>;
    fn exists(&self, path: &BStr) -> bool;
    fn is_ignored(&self, path: &BStr) -> bool;
    fn read_content(&self, path: &BStr) -> Result<Vec<u8>, WorktreeError>;
    fn write_content(
        &self,
        path: &BStr,
        content: &[u8],
        opts: &WriteOptions,
    ) -> Result<(), WorktreeError>;
    fn remove(&self, path: &BStr) -> Result<(), WorktreeError>;
    fn mkdir(&self, path: &BStr) -> Result<(), WorktreeError>;

    /// Materialize an entire tree into the working tree, overwriting any
    /// existing content at the paths it touches.
    fn checkout_tree(
        &self,
        odb: &ObjectDatabase,
        tree_id: &ObjectId,
    ) -> Result<CheckoutReport, WorktreeError>;

    /// Materialize only the given paths from a tree.
    fn checkout_paths(
        &self,
        odb: &ObjectDatabase,
        tree_id: &ObjectId,
        paths: &[BString],
    ) -> Result<CheckoutReport, WorktreeError>;
}

/// Plain-filesystem working tree rooted at a directory.
pub struct FsWorktree {
    root: PathBuf,
}

impl FsWorktree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &BStr) -> Result<PathBuf, WorktreeError> {
        let s = path
            .to_str()
            .map_err(|_| WorktreeError::PathEscapesRoot(path.to_string()))?;
        let rel = Path::new(s);
        if rel.is_absolute() || rel.components().any(|c| c == std::path::Component::ParentDir) {
            return Err(WorktreeError::PathEscapesRoot(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn walk_dir(&self, dir: &Path, prefix: &[u8], out: &mut Vec<WalkEntry>) -> Result<(), WorktreeError> {
        let mut children: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        children.sort_by_key(|e| e.file_name());

        for child in children {
            let name = child.file_name();
            if name == ".git" && prefix.is_empty() {
                continue;
            }
            let meta = child.metadata()?;
            let mut path = prefix.to_vec();
            if !path.is_empty() {
                path.push(b'/');
            }
            path.extend_from_slice(name.to_string_lossy().as_bytes());

            if meta.is_dir() {
                out.push(WalkEntry {
                    path: BString::from(path.clone()),
                    mode: FileMode::Tree,
                    size: 0,
                    is_directory: true,
                });
                self.walk_dir(&child.path(), &path, out)?;
            } else {
                let executable = is_executable(&meta);
                out.push(WalkEntry {
                    path: BString::from(path),
                    mode: if executable {
                        FileMode::Executable
                    } else {
                        FileMode::Regular
                    },
                    size: meta.len(),
                    is_directory: false,
                });
            }
        }
        Ok(())
    }

    fn write_blob_to(&self, odb: &ObjectDatabase, dest: &Path, oid: &ObjectId, mode: FileMode) -> Result<(), WorktreeError> {
        let obj = odb.read(oid)?.ok_or(git_odb::OdbError::NotFound(*oid))?;
        let content = match obj {
            Object::Blob(b) => b.data,
            _ => return Ok(()),
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &content)?;
        #[cfg(unix)]
        if mode == FileMode::Executable {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dest)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dest, perms)?;
        }
        let _ = mode;
        Ok(())
    }

    fn checkout_entries(
        &self,
        odb: &ObjectDatabase,
        tree_id: &ObjectId,
        filter: Option<&[BString]>,
    ) -> Result<CheckoutReport, WorktreeError> {
        let mut report = CheckoutReport::default();
        let mut entries = Vec::new();
        collect_tree_paths(odb, tree_id, b"", &mut entries)?;

        for (path, oid, mode) in entries {
            if let Some(paths) = filter {
                if !paths.iter().any(|p| p.as_slice() == path) {
                    continue;
                }
            }
            let dest = self.resolve(BStr::new(&path))?;
            match self.write_blob_to(odb, &dest, &oid, mode) {
                Ok(()) => report.updated.push(BString::from(path)),
                Err(_) => report.failed.push(BString::from(path)),
            }
        }

        Ok(report)
    }
}

fn collect_tree_paths(
    odb: &ObjectDatabase,
    tree_id: &ObjectId,
    prefix: &[u8],
    out: &mut Vec<(Vec<u8>, ObjectId, FileMode)>,
) -> Result<(), WorktreeError> {
    let obj = odb.read(tree_id)?.ok_or(git_odb::OdbError::NotFound(*tree_id))?;
    let tree = match obj {
        Object::Tree(t) => t,
        _ => return Ok(()),
    };
    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !path.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        if entry.mode.is_tree() {
            collect_tree_paths(odb, &entry.oid, &path, out)?;
        } else {
            out.push((path, entry.oid, entry.mode));
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

impl Worktree for FsWorktree {
    fn walk(&self) -> Result<Vec<WalkEntry>, WorktreeError> {
        let mut out = Vec::new();
        self.walk_dir(&self.root, b"", &mut out)?;
        Ok(out)
    }

    fn exists(&self, path: &BStr) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_ignored(&self, path: &BStr) -> bool {
        // No .gitignore evaluation in this core; only the always-ignored
        // `.git` directory itself is treated as ignored.
        path.as_bytes() == b".git" || path.starts_with(b".git/")
    }

    fn read_content(&self, path: &BStr) -> Result<Vec<u8>, WorktreeError> {
        let full = self.resolve(path)?;
        Ok(std::fs::read(full)?)
    }

    fn write_content(
        &self,
        path: &BStr,
        content: &[u8],
        opts: &WriteOptions,
    ) -> Result<(), WorktreeError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, content)?;
        #[cfg(unix)]
        if opts.executable {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&full)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&full, perms)?;
        }
        let _ = opts;
        Ok(())
    }

    fn remove(&self, path: &BStr) -> Result<(), WorktreeError> {
        let full = self.resolve(path)?;
        if full.is_file() {
            std::fs::remove_file(&full)?;
        }
        Ok(())
    }

    fn mkdir(&self, path: &BStr) -> Result<(), WorktreeError> {
        let full = self.resolve(path)?;
        std::fs::create_dir_all(full)?;
        Ok(())
    }

    fn checkout_tree(
        &self,
        odb: &ObjectDatabase,
        tree_id: &ObjectId,
    ) -> Result<CheckoutReport, WorktreeError> {
        self.checkout_entries(odb, tree_id, None)
    }

    fn checkout_paths(
        &self,
        odb: &ObjectDatabase,
        tree_id: &ObjectId,
        paths: &[BString],
    ) -> Result<CheckoutReport, WorktreeError> {
        self.checkout_entries(odb, tree_id, Some(paths))
    }
}

//! `RmCommand`: removes index entries matching a pathspec.

use bstr::BString;
use git_index::{Pathspec, Stage};
use git_repository::Repository;

use crate::worktree::Worktree;
use crate::CommandError;

/// Removes matching paths from the index (and, unless `cached`, the
/// working tree).
pub struct RmCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    patterns: Vec<String>,
    cached: bool,
}

impl<'r> RmCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            patterns: Vec::new(),
            cached: false,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    pub fn pathspec(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Leave the working tree alone; only update the index.
    pub fn cached(&mut self, cached: bool) -> &mut Self {
        self.cached = cached;
        self
    }

    pub fn call(&mut self) -> Result<Vec<BString>, CommandError> {
        self.check_not_called()?;
        self.called = true;

        if self.patterns.is_empty() {
            return Err(CommandError::NoFilepattern);
        }

        let pattern_refs: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        let pathspec = Pathspec::parse(&pattern_refs).map_err(|e| {
            CommandError::Index(git_index::IndexError::InvalidPathspec(e.to_string()))
        })?;

        let matching: Vec<BString> = self
            .repo
            .index()?
            .iter()
            .filter(|e| e.stage == Stage::Normal && pathspec.matches(e.path.as_ref(), false))
            .map(|e| e.path.clone())
            .collect();

        let work_tree = self.repo.work_tree().map(|p| p.to_path_buf());

        for path in &matching {
            self.repo.index_mut()?.remove(path.as_ref(), Stage::Normal);
            if !self.cached {
                if let Some(ref root) = work_tree {
                    let wt = crate::worktree::FsWorktree::new(root);
                    wt.remove(path.as_ref())?;
                }
            }
        }

        self.repo.write_index()?;

        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;
    use git_index::IndexEntry;
    use git_object::{FileMode, ObjectType};

    fn init_repo_with_file() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let oid = repo.odb().write_raw(ObjectType::Blob, b"hello").unwrap();
        repo.index_mut().unwrap().add(IndexEntry {
            path: BString::from("a.txt"),
            oid,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: Default::default(),
            flags: Default::default(),
        });
        (dir, repo)
    }

    #[test]
    fn removes_from_index_and_worktree() {
        let (dir, mut repo) = init_repo_with_file();
        let removed = RmCommand::new(&mut repo).pathspec("a.txt").call().unwrap();
        assert_eq!(removed, vec![BString::from("a.txt")]);
        assert!(repo
            .index_mut()
            .unwrap()
            .get(BStr::new(b"a.txt"), Stage::Normal)
            .is_none());
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn cached_leaves_worktree_alone() {
        let (dir, mut repo) = init_repo_with_file();
        RmCommand::new(&mut repo)
            .pathspec("a.txt")
            .cached(true)
            .call()
            .unwrap();
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn nonmatching_pattern_returns_empty() {
        let (_dir, mut repo) = init_repo_with_file();
        let removed = RmCommand::new(&mut repo)
            .pathspec("nothing-here.txt")
            .call()
            .unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo_with_file();
        let mut cmd = RmCommand::new(&mut repo);
        cmd.pathspec("a.txt");
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}

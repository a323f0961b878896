//! `AddCommand`: stages working-tree content matching a pathspec into the
//! index.

use bstr::{BStr, BString};
use git_index::{EntryFlags, IndexEntry, Pathspec, Stage};
use git_object::{FileMode, ObjectType};
use git_repository::Repository;

use crate::worktree::Worktree;
use crate::CommandError;

/// Stages matching paths from the working tree.
pub struct AddCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    patterns: Vec<String>,
    update: bool,
    all: bool,
    force: bool,
    intent_to_add: bool,
}

impl<'r> AddCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            patterns: Vec::new(),
            update: false,
            all: false,
            force: false,
            intent_to_add: false,
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

    /// Only stage files already tracked (skip new files).
    pub fn update(&mut self, update: bool) -> &mut Self {
        self.update = update;
        self
    }

    /// Stage deletions of tracked files that no longer exist in the worktree.
    pub fn all(&mut self, all: bool) -> &mut Self {
        self.all = all;
        self
    }

    /// Stage files that would otherwise be ignored.
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    /// Record a placeholder entry (empty OID, size 0) instead of blob content.
    pub fn intent_to_add(&mut self, intent: bool) -> &mut Self {
        self.intent_to_add = intent;
        self
    }

    pub fn call(&mut self) -> Result<usize, CommandError> {
        self.check_not_called()?;
        self.called = true;

        if self.patterns.is_empty() {
            return Err(CommandError::NoFilepattern);
        }

        let pattern_refs: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        let pathspec = Pathspec::parse(&pattern_refs).map_err(|e| {
            CommandError::Index(git_index::IndexError::InvalidPathspec(e.to_string()))
        })?;

        let work_tree = self
            .repo
            .work_tree()
            .map(|p| p.to_path_buf())
            .ok_or(CommandError::NoFilepattern)?;
        let wt = crate::worktree::FsWorktree::new(&work_tree);

        let mut staged = 0usize;

        // Stage matching files present in the worktree (new or modified).
        let entries = wt.walk()?;
        for entry in &entries {
            if entry.is_directory {
                continue;
            }
            let path = entry.path.as_ref();
            if !pathspec.matches(path, false) {
                continue;
            }
            if !self.force && wt.is_ignored(path) {
                continue;
            }

            let already_tracked = self
                .repo
                .index()?
                .get(path, Stage::Normal)
                .is_some();
            if self.update && !already_tracked {
                continue;
            }

            let index_entry = if self.intent_to_add && !already_tracked {
                IndexEntry {
                    path: BString::from(path.to_vec()),
                    oid: git_hash::ObjectId::NULL_SHA1,
                    mode: entry.mode,
                    stage: Stage::Normal,
                    stat: Default::default(),
                    flags: EntryFlags {
                        intent_to_add: true,
                        ..Default::default()
                    },
                }
            } else {
                let content = wt.read_content(path)?;
                let oid = self.repo.odb().write_raw(ObjectType::Blob, &content)?;
                IndexEntry {
                    path: BString::from(path.to_vec()),
                    oid,
                    mode: entry.mode,
                    stage: Stage::Normal,
                    stat: Default::default(),
                    flags: Default::default(),
                }
            };

            self.repo.index_mut()?.add(index_entry);
            staged += 1;
        }

        // Stage deletions of tracked files the pathspec covers but that no
        // longer exist in the worktree.
        if self.all || self.update {
            let tracked_paths: Vec<BString> = self
                .repo
                .index()?
                .iter()
                .filter(|e| e.stage == Stage::Normal)
                .map(|e| e.path.clone())
                .collect();
            for path in tracked_paths {
                let path_ref: &BStr = path.as_ref();
                if !pathspec.matches(path_ref, false) {
                    continue;
                }
                if !wt.exists(path_ref) {
                    if self.repo.index_mut()?.remove(path_ref, Stage::Normal) {
                        staged += 1;
                    }
                }
            }
        }

        self.repo.write_index()?;

        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn stages_new_file() {
        let (dir, mut repo) = init_repo();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let staged = AddCommand::new(&mut repo).pathspec("a.txt").call().unwrap();
        assert_eq!(staged, 1);
        assert!(repo
            .index_mut()
            .unwrap()
            .get(BStr::new(b"a.txt"), Stage::Normal)
            .is_some());
    }

    #[test]
    fn update_skips_new_files() {
        let (dir, mut repo) = init_repo();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let staged = AddCommand::new(&mut repo)
            .pathspec("a.txt")
            .update(true)
            .call()
            .unwrap();
        assert_eq!(staged, 0);
    }

    #[test]
    fn intent_to_add_creates_placeholder() {
        let (dir, mut repo) = init_repo();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        AddCommand::new(&mut repo)
            .pathspec("a.txt")
            .intent_to_add(true)
            .call()
            .unwrap();

        let entry = repo
            .index_mut()
            .unwrap()
            .get(BStr::new(b"a.txt"), Stage::Normal)
            .unwrap();
        assert!(entry.flags.intent_to_add);
        assert!(entry.oid.is_null());
    }

    #[test]
    fn no_pattern_is_an_error() {
        let (_dir, mut repo) = init_repo();
        let err = AddCommand::new(&mut repo).call().unwrap_err();
        assert!(matches!(err, CommandError::NoFilepattern));
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (dir, mut repo) = init_repo();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let mut cmd = AddCommand::new(&mut repo);
        cmd.pathspec("a.txt");
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}

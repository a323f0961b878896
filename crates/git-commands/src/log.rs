//! `LogCommand`: walks commit ancestry from a starting point, newest first.

use bstr::BString;
use git_diff::tree::diff_trees;
use git_diff::DiffOptions;
use git_hash::ObjectId;
use git_object::Object;
use git_repository::Repository;
use git_revwalk::{resolve_revision, RevWalk, SortOrder, WalkOptions};

use crate::CommandError;

/// Builds and runs a commit-history walk.
pub struct LogCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    start: Option<String>,
    options: WalkOptions,
    path: Option<BString>,
    first_parent_only: bool,
}

impl<'r> LogCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            start: None,
            options: WalkOptions::default(),
            path: None,
            first_parent_only: false,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    /// Starting point, rev-parse syntax. Defaults to HEAD.
    pub fn start(&mut self, rev: impl Into<String>) -> &mut Self {
        self.start = Some(rev.into());
        self
    }

    pub fn max_count(&mut self, n: usize) -> &mut Self {
        self.options.max_count = Some(n);
        self
    }

    pub fn skip(&mut self, n: usize) -> &mut Self {
        self.options.skip = Some(n);
        self
    }

    pub fn since(&mut self, secs: i64) -> &mut Self {
        self.options.since = Some(secs);
        self
    }

    pub fn until(&mut self, secs: i64) -> &mut Self {
        self.options.until = Some(secs);
        self
    }

    /// Only follow the first parent of each merge commit.
    pub fn first_parent(&mut self, first_parent_only: bool) -> &mut Self {
        self.first_parent_only = first_parent_only;
        self
    }

    /// Only include commits that touch this path.
    pub fn path(&mut self, path: impl Into<BString>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    pub fn call(&mut self) -> Result<Vec<ObjectId>, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let start_oid = match &self.start {
            Some(rev) => resolve_revision(self.repo, rev)?,
            None => match self.repo.head_oid()? {
                Some(oid) => oid,
                None => return Ok(Vec::new()),
            },
        };

        let mut walk = RevWalk::new(self.repo)?;
        walk.push(start_oid)?;
        walk.set_sort(SortOrder::Chronological);
        let mut options = self.options.clone();
        options.first_parent_only = self.first_parent_only;
        walk.set_options(options);

        let mut walked = Vec::new();
        for oid in walk {
            walked.push(oid?);
        }

        let mut results = Vec::new();
        for oid in walked {
            if let Some(ref path) = self.path {
                if !touches_path(self.repo, &oid, path)? {
                    continue;
                }
            }
            results.push(oid);
        }

        Ok(results)
    }
}

/// Whether `commit_oid`'s tree differs from its first parent's at `path`
/// (or, for a root commit, whether the path exists at all).
fn touches_path(repo: &Repository, commit_oid: &ObjectId, path: &bstr::BStr) -> Result<bool, CommandError> {
    let commit = match repo.odb().read(commit_oid)? {
        Some(Object::Commit(c)) => c,
        _ => return Ok(false),
    };

    let parent_tree = match commit.parents.first() {
        Some(parent_oid) => match repo.odb().read(parent_oid)? {
            Some(Object::Commit(p)) => Some(p.tree),
            _ => None,
        },
        None => None,
    };

    let diff_opts = DiffOptions {
        pathspec: Some(vec![path.to_owned()]),
        ..DiffOptions::default()
    };
    let result = diff_trees(repo.odb(), parent_tree.as_ref(), Some(&commit.tree), &diff_opts)?;
    Ok(!result.files.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitCommand;
    use git_index::{IndexEntry, Stage};
    use git_object::{FileMode, ObjectType};

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_with_file(repo: &mut Repository, name: &str, content: &[u8], msg: &str) -> ObjectId {
        let blob = repo.odb().write_raw(ObjectType::Blob, content).unwrap();
        repo.index_mut().unwrap().add(IndexEntry {
            path: BString::from(name),
            oid: blob,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: Default::default(),
            flags: Default::default(),
        });
        CommitCommand::new(repo).message(msg).call().unwrap()
    }

    #[test]
    fn walks_newest_first() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        let second = commit_with_file(&mut repo, "b.txt", b"two", "second");

        let commits = LogCommand::new(&mut repo).call().unwrap();
        assert_eq!(commits, vec![second, first]);
    }

    #[test]
    fn respects_max_count() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one", "first");
        commit_with_file(&mut repo, "b.txt", b"two", "second");

        let commits = LogCommand::new(&mut repo).max_count(1).call().unwrap();
        assert_eq!(commits.len(), 1);
    }

    #[test]
    fn path_filter_skips_unrelated_commits() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        commit_with_file(&mut repo, "b.txt", b"two", "second");

        let commits = LogCommand::new(&mut repo).path("a.txt").call().unwrap();
        assert_eq!(commits, vec![first]);
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one", "first");
        let mut cmd = LogCommand::new(&mut repo);
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}

//! `BlameCommand`: attributes each line of a file to the commit that
//! introduced it.

use bstr::{BStr, BString};
use git_diff::algorithm::{diff_edits, split_lines, Edit, EditOp};
use git_diff::DiffAlgorithm;
use git_hash::ObjectId;
use git_object::Object;
use git_odb::ObjectDatabase;
use git_repository::Repository;
use git_revwalk::{resolve_revision, RevWalk, WalkOptions};

use crate::CommandError;

/// One line of blame output.
#[derive(Debug, Clone)]
pub struct BlameLine {
    /// 1-based line number in the final content.
    pub line_number: usize,
    /// Line content, without trailing newline.
    pub content: BString,
    /// Commit that introduced this line.
    pub commit: ObjectId,
}

/// Builds and runs a blame of a single file's line history.
pub struct BlameCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    path: Option<BString>,
    start: Option<String>,
}

impl<'r> BlameCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            path: None,
            start: None,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    pub fn path(&mut self, path: impl Into<BString>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    /// Start walking from this revision. Defaults to HEAD.
    pub fn start_commit(&mut self, rev: impl Into<String>) -> &mut Self {
        self.start = Some(rev.into());
        self
    }

    pub fn call(&mut self) -> Result<Vec<BlameLine>, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let path = self
            .path
            .clone()
            .ok_or_else(|| CommandError::NoFilepattern)?;

        let start_oid = match &self.start {
            Some(rev) => resolve_revision(self.repo, rev)?,
            None => self
                .repo
                .head_oid()?
                .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?,
        };

        // Walk the file's first-parent ancestry, newest first.
        let mut walk = RevWalk::new(self.repo)?;
        walk.push(start_oid)?;
        walk.set_options(WalkOptions {
            first_parent_only: true,
            ..WalkOptions::default()
        });

        let mut newest_first = Vec::new();
        for oid in walk {
            newest_first.push(oid?);
        }
        newest_first.reverse(); // oldest first

        // Keep only the commits that actually changed this path's content.
        let mut touching = Vec::new();
        let mut prev_content: Option<Vec<u8>> = None;
        for commit_oid in newest_first {
            let content = find_blob_in_commit(self.repo.odb(), &commit_oid, path.as_ref())?;
            if content.is_some() && content != prev_content {
                touching.push((commit_oid, content.clone().unwrap()));
            }
            prev_content = content;
        }

        // Apportion lines forward: each iteration's Insert lines are
        // attributed to that commit, Equal lines carry their prior
        // attribution along.
        let mut blame_of_line: Vec<ObjectId> = Vec::new();
        let mut current_content: Vec<u8> = Vec::new();

        for (commit_oid, content) in &touching {
            let edits = diff_edits(&current_content, content, DiffAlgorithm::Myers);
            let new_line_count = split_lines(content).len();
            let mut new_blame = vec![*commit_oid; new_line_count];
            for edit in &edits {
                if let Edit {
                    op: EditOp::Equal,
                    old_index,
                    new_index,
                } = edit
                {
                    new_blame[*new_index] = blame_of_line[*old_index];
                }
            }
            blame_of_line = new_blame;
            current_content = content.clone();
        }

        let lines = split_lines(&current_content);
        Ok(lines
            .iter()
            .enumerate()
            .zip(blame_of_line.iter())
            .map(|((idx, line), commit)| BlameLine {
                line_number: idx + 1,
                content: BString::from(line.to_vec()),
                commit: *commit,
            })
            .collect())
    }
}

/// Resolve `path` to blob bytes within the tree of `commit_oid`, or `None`
/// if the path doesn't exist there.
fn find_blob_in_commit(
    odb: &ObjectDatabase,
    commit_oid: &ObjectId,
    path: &BStr,
) -> Result<Option<Vec<u8>>, CommandError> {
    let obj = odb
        .read(commit_oid)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing commit {commit_oid}")))?;
    let tree_oid = match obj {
        Object::Commit(c) => c.tree,
        Object::Tree(_) => *commit_oid,
        other => {
            return Err(CommandError::CorruptObject(format!(
                "expected commit or tree, got {}",
                other.object_type()
            )))
        }
    };
    let Some((blob_oid, _mode)) = find_in_tree(odb, &tree_oid, path)? else {
        return Ok(None);
    };
    match odb.read(&blob_oid)? {
        Some(Object::Blob(b)) => Ok(Some(b.data)),
        _ => Ok(None),
    }
}

fn find_in_tree(
    odb: &ObjectDatabase,
    tree_id: &ObjectId,
    target: &BStr,
) -> Result<Option<(ObjectId, git_object::FileMode)>, CommandError> {
    let obj = odb
        .read(tree_id)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing tree {tree_id}")))?;
    let tree = match obj {
        Object::Tree(t) => t,
        _ => return Ok(None),
    };
    find_in_tree_entries(odb, &tree, b"", target)
}

fn find_in_tree_entries(
    odb: &ObjectDatabase,
    tree: &git_object::Tree,
    prefix: &[u8],
    target: &BStr,
) -> Result<Option<(ObjectId, git_object::FileMode)>, CommandError> {
    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !path.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        if path == target.as_bytes() && !entry.mode.is_tree() {
            return Ok(Some((entry.oid, entry.mode)));
        }
        if entry.mode.is_tree() && target.starts_with(&path) {
            if let Some(Object::Tree(sub)) = odb.read(&entry.oid)? {
                if let Some(found) = find_in_tree_entries(odb, &sub, &path, target)? {
                    return Ok(Some(found));
                }
            }
        }
    }
    Ok(None)
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
    fn attributes_lines_to_introducing_commits() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one\ntwo\n", "first");
        let second = commit_with_file(&mut repo, "a.txt", b"one\nTWO\nthree\n", "second");

        let lines = BlameCommand::new(&mut repo).path("a.txt").call().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].content, BString::from("one"));
        assert_eq!(lines[0].commit, first);
        assert_eq!(lines[1].content, BString::from("TWO"));
        assert_eq!(lines[1].commit, second);
        assert_eq!(lines[2].content, BString::from("three"));
        assert_eq!(lines[2].commit, second);
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one\n", "first");
        let mut cmd = BlameCommand::new(&mut repo);
        cmd.path("a.txt");
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}

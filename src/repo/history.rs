//! Commit history of the checked-out repository.
//!
//! Read-only access through libgit2. CI checkouts are often shallow, so a
//! history of a single commit is normal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use git2::{Commit, DiffOptions, Repository, Sort};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub short_id: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub summary: String,
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.short_id,
            self.date.format("%Y-%m-%d"),
            self.author,
            self.summary
        )
    }
}

/// Open the repository containing `root`.
pub fn open(root: &Path) -> Result<Repository> {
    Repository::discover(root)
        .with_context(|| format!("No git repository found at {}", root.display()))
}

/// Most recent commits reachable from HEAD, newest first.
///
/// With `path`, only commits that changed that path (relative to `root`)
/// are returned.
pub fn recent_commits(root: &Path, path: Option<&str>, max_count: usize) -> Result<Vec<CommitSummary>> {
    let repo = open(root)?;

    let pathspec = match path.map(str::trim).filter(|p| !p.is_empty() && *p != ".") {
        Some(p) => Some(workdir_relative(&repo, root, p)?),
        None => None,
    };

    let mut revwalk = repo.revwalk().context("Failed to walk history")?;
    revwalk.push_head().context("Repository has no HEAD commit")?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    let mut commits = Vec::new();
    for oid in revwalk {
        if commits.len() >= max_count {
            break;
        }

        let commit = repo.find_commit(oid?)?;

        if let Some(ref spec) = pathspec {
            if !touches_path(&repo, &commit, spec)? {
                continue;
            }
        }

        commits.push(summarize(&commit));
    }

    debug!("Collected {} commits", commits.len());
    Ok(commits)
}

/// Get the current branch name of a repository.
pub fn current_branch(repo: &Repository) -> Option<String> {
    repo.head()
        .ok()
        .and_then(|head| head.shorthand().map(String::from))
}

/// Get the current commit hash (short form).
pub fn current_commit(repo: &Repository) -> Option<String> {
    repo.head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .map(|commit| short_id(&commit))
}

fn short_id(commit: &Commit<'_>) -> String {
    commit.id().to_string()[..8].to_string()
}

fn summarize(commit: &Commit<'_>) -> CommitSummary {
    let author = commit.author();
    CommitSummary {
        short_id: short_id(commit),
        author: author.name().unwrap_or("unknown").to_string(),
        date: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
        summary: commit.summary().unwrap_or("").to_string(),
    }
}

/// Map a root-relative path onto the repository's working directory.
fn workdir_relative(repo: &Repository, root: &Path, path: &str) -> Result<PathBuf> {
    let Some(workdir) = repo.workdir() else {
        return Ok(PathBuf::from(path));
    };

    let workdir = std::fs::canonicalize(workdir).unwrap_or_else(|_| workdir.to_path_buf());
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    let prefix = root.strip_prefix(&workdir).unwrap_or(Path::new(""));
    Ok(prefix.join(path))
}

/// Whether `commit` changed anything under `pathspec` relative to its first parent.
fn touches_path(repo: &Repository, commit: &Commit<'_>, pathspec: &Path) -> Result<bool> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };

    let mut opts = DiffOptions::new();
    opts.pathspec(pathspec);

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
    Ok(diff.deltas().len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, root: &Path, name: &str, content: &str, message: &str) {
        let file = root.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file, content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = Signature::now("Test Author", "author@example.com").unwrap();
        let parents: Vec<Commit<'_>> = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    fn fixture() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, dir.path(), "README.md", "# Demo\n", "Add readme");
        commit_file(&repo, dir.path(), "src/lib.rs", "pub fn a() {}\n", "Add library");
        commit_file(&repo, dir.path(), "README.md", "# Demo\nMore.\n", "Expand readme");
        (dir, repo)
    }

    #[test]
    fn test_recent_commits_newest_first() {
        let (dir, _repo) = fixture();
        let commits = recent_commits(dir.path(), None, 10).unwrap();

        assert_eq!(commits.len(), 3);
        let summaries: Vec<_> = commits.iter().map(|c| c.summary.as_str()).collect();
        assert!(summaries.contains(&"Expand readme"));
        assert!(summaries.contains(&"Add readme"));
        assert_eq!(commits[0].author, "Test Author");
        assert_eq!(commits[0].short_id.len(), 8);
    }

    #[test]
    fn test_recent_commits_limit() {
        let (dir, _repo) = fixture();
        assert_eq!(recent_commits(dir.path(), None, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_recent_commits_path_filter() {
        let (dir, _repo) = fixture();

        let commits = recent_commits(dir.path(), Some("src"), 10).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].summary, "Add library");

        let commits = recent_commits(dir.path(), Some("README.md"), 10).unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn test_current_branch_and_commit() {
        let (_dir, repo) = fixture();
        assert!(current_branch(&repo).is_some());
        assert_eq!(current_commit(&repo).unwrap().len(), 8);
    }

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        assert!(recent_commits(dir.path(), None, 5).is_err());
    }

    #[test]
    fn test_commit_display() {
        let commit = CommitSummary {
            short_id: "abcdef12".to_string(),
            author: "Ada".to_string(),
            date: DateTime::from_timestamp(0, 0).unwrap(),
            summary: "Initial".to_string(),
        };
        assert_eq!(commit.to_string(), "abcdef12 1970-01-01 Ada: Initial");
    }
}

//! Read-only view over the repository checkout.
//!
//! Every path the agent's tools touch goes through [`FileScanner`], which
//! keeps access inside the repository root and applies the configured
//! excludes and size limit. Excludes hold in both directions: excluded
//! entries are never listed or walked, and a path with an excluded
//! component is never resolved.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8000;
/// Longest line echoed back in search results.
const MAX_MATCH_LINE_CHARS: usize = 200;

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Name globs to skip (e.g., ["node_modules", ".env*"])
    pub excludes: Vec<String>,
    /// Maximum file size in bytes for reading and searching
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&crate::config::ToolsConfig::default())
    }
}

impl From<&crate::config::ToolsConfig> for ScanConfig {
    fn from(config: &crate::config::ToolsConfig) -> Self {
        Self {
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: String,
    pub line_number: usize,
    pub line: String,
}

/// Repository-rooted file access.
pub struct FileScanner {
    config: ScanConfig,
    repo_root: PathBuf,
    exclude_patterns: Vec<Regex>,
}

impl FileScanner {
    /// Create a new file scanner.
    pub fn new(repo_root: PathBuf, config: ScanConfig) -> Self {
        let repo_root = fs::canonicalize(&repo_root).unwrap_or(repo_root);
        let exclude_patterns = config
            .excludes
            .iter()
            .filter_map(|pattern| glob_to_regex(pattern).ok())
            .collect();

        Self {
            config,
            repo_root,
            exclude_patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.repo_root
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Resolve a root-relative path to an existing location inside the root.
    ///
    /// Paths with an excluded component are refused, both as written and
    /// after symlinks are followed.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = relative.trim();
        if self.has_excluded_component(Path::new(relative)) {
            return Err(anyhow!("Access denied: {} is excluded", relative));
        }

        let joined = if relative.is_empty() {
            self.repo_root.clone()
        } else {
            self.repo_root.join(relative)
        };

        let canonical =
            fs::canonicalize(&joined).map_err(|_| anyhow!("Path not found: {}", relative))?;

        let Ok(inside) = canonical.strip_prefix(&self.repo_root) else {
            return Err(anyhow!("Access denied: path outside repository"));
        };

        if self.has_excluded_component(inside) {
            return Err(anyhow!("Access denied: {} is excluded", relative));
        }

        Ok(canonical)
    }

    /// Path relative to the root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.repo_root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// List a directory, directories suffixed with `/`.
    pub fn list_directory(&self, relative_dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve(relative_dir)?;

        if !dir_path.is_dir() {
            return Err(anyhow!("Not a directory: {}", relative_dir));
        }

        let mut entries = Vec::new();
        let dir_entries = fs::read_dir(&dir_path)
            .with_context(|| format!("Cannot read directory: {}", relative_dir))?;

        for entry in dir_entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();

            if self.is_excluded(&name) {
                continue;
            }

            let suffix = if entry.path().is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", name, suffix));
        }

        entries.sort();
        Ok(entries)
    }

    /// Find files whose name (or relative path, if the pattern has a `/`)
    /// matches a `*`/`?` glob.
    pub fn find_files(&self, pattern: &str, max_results: usize) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let match_path = pattern.contains('/');

        let mut found = Vec::new();
        for path in self.walk_files(&self.repo_root) {
            let rel = self.relative(&path);
            let candidate = if match_path {
                rel.as_str()
            } else {
                path.file_name().and_then(|n| n.to_str()).unwrap_or("")
            };

            if matcher.is_match(candidate) {
                if found.len() >= max_results {
                    break;
                }
                found.push(rel);
            }
        }

        found.sort();
        Ok(found)
    }

    /// Regex search over text files under `relative_dir` (or a single file).
    pub fn search(
        &self,
        pattern: &str,
        relative_dir: &str,
        max_results: usize,
    ) -> Result<Vec<SearchMatch>> {
        let regex = Regex::new(pattern).with_context(|| format!("Invalid pattern: {}", pattern))?;
        let start = self.resolve(relative_dir)?;

        let mut matches = Vec::new();
        for path in self.walk_files(&start) {
            let Some(content) = self.read_text(&path) else {
                continue;
            };

            for (index, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() >= max_results {
                        return Ok(matches);
                    }
                    matches.push(SearchMatch {
                        path: self.relative(&path),
                        line_number: index + 1,
                        line: line.trim().chars().take(MAX_MATCH_LINE_CHARS).collect(),
                    });
                }
            }
        }

        Ok(matches)
    }

    /// Read a text file, optionally restricted to a 1-based inclusive line range.
    pub fn read_file(
        &self,
        relative: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<String> {
        let path = self.resolve(relative)?;

        if !path.is_file() {
            return Err(anyhow!("Not a file: {}", relative));
        }

        let size = fs::metadata(&path)?.len();
        if size > self.config.max_file_size {
            return Err(anyhow!(
                "File too large ({} bytes, limit {}); use search_for_pattern instead",
                size,
                self.config.max_file_size
            ));
        }

        let bytes = fs::read(&path).with_context(|| format!("Failed to read file: {}", relative))?;
        let content = String::from_utf8_lossy(&bytes);

        if start_line.is_none() && end_line.is_none() {
            return Ok(content.into_owned());
        }

        let start = start_line.unwrap_or(1).max(1);
        let end = end_line.unwrap_or(usize::MAX);
        if end < start {
            return Err(anyhow!("end_line must not be before start_line"));
        }

        Ok(content
            .lines()
            .skip(start - 1)
            .take(end - start + 1)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Check if a name matches exclusion patterns.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_patterns.iter().any(|pattern| pattern.is_match(name))
    }

    fn has_excluded_component(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => name.to_str().map_or(true, |n| self.is_excluded(n)),
            _ => false,
        })
    }

    /// Files under `start`, skipping excluded entries at any depth.
    fn walk_files(&self, start: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        // `start` comes from `resolve`, which already checked its components.
        WalkDir::new(start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || !self.entry_excluded(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
    }

    fn entry_excluded(&self, entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|name| self.is_excluded(name))
            .unwrap_or(true)
    }

    /// Contents of a searchable text file, or `None` if oversized or binary.
    fn read_text(&self, path: &Path) -> Option<String> {
        let size = fs::metadata(path).ok()?.len();
        if size > self.config.max_file_size {
            return None;
        }

        let bytes = fs::read(path).ok()?;
        let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
        if sniff.contains(&0) {
            return None;
        }

        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Compile a `*`/`?` glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern.trim())
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped)).with_context(|| format!("Invalid glob: {}", pattern))
}

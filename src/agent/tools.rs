//! Tool definitions for the question-answering agent.
//!
//! This module defines the read-only tools that the LLM can use to explore
//! the repository. None of them write files, run commands or reach the
//! network.

use crate::models::ToolCall;
use crate::repo;
use crate::scanner::{FileScanner, ScanConfig};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

/// Provider-neutral tool definition. Adapters translate it into each
/// vendor's function-calling format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    /// Text sent back to the model.
    pub fn into_message(self) -> String {
        if self.success {
            if self.output.is_empty() {
                "(no results)".to_string()
            } else {
                self.output
            }
        } else {
            format!("Error: {}", self.error.unwrap_or_default())
        }
    }
}

/// Limits applied to tool output.
#[derive(Debug, Clone)]
pub struct ToolLimits {
    /// Default cap for search and find results.
    pub max_results: usize,
    /// Default number of commits returned by git_log.
    pub max_log_entries: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_results: 20,
            max_log_entries: 10,
        }
    }
}

impl From<&crate::config::ToolsConfig> for ToolLimits {
    fn from(config: &crate::config::ToolsConfig) -> Self {
        Self {
            max_results: config.max_results,
            max_log_entries: config.max_log_entries,
        }
    }
}

/// The tools executor that handles tool calls.
pub struct ToolExecutor {
    /// Root directory of the repository being explored.
    repo_root: PathBuf,
    scanner: FileScanner,
    limits: ToolLimits,
}

impl ToolExecutor {
    /// Create a new tool executor for the given repository.
    pub fn new(repo_root: PathBuf, scan_config: ScanConfig, limits: ToolLimits) -> Self {
        let scanner = FileScanner::new(repo_root, scan_config);
        Self {
            repo_root: scanner.root().to_path_buf(),
            scanner,
            limits,
        }
    }

    /// Execute a tool call and return the result.
    pub fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        let name = &tool_call.name;
        let args = &tool_call.arguments;

        debug!("Executing tool: {} with args: {}", name, args);

        match name.as_str() {
            "list_dir" => self.list_dir(args),
            "find_file" => self.find_file(args),
            "search_for_pattern" => self.search_for_pattern(args),
            "read_file" => self.read_file(args),
            "get_file_info" => self.get_file_info(args),
            "git_log" => self.git_log(args),
            _ => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    /// List files in a directory.
    fn list_dir(&self, args: &Value) -> ToolResult {
        let dir = str_arg(args, "directory").unwrap_or(".");

        match self.scanner.list_directory(dir) {
            Ok(entries) => ToolResult::success(entries.join("\n")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    /// Find files by name glob.
    fn find_file(&self, args: &Value) -> ToolResult {
        let Some(pattern) = str_arg(args, "pattern") else {
            return ToolResult::error("Missing required parameter: pattern".to_string());
        };

        let max = usize_arg(args, "max_results").unwrap_or(self.limits.max_results);

        match self.scanner.find_files(pattern, max) {
            Ok(files) => ToolResult::success(files.join("\n")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    /// Search for a regex in the codebase.
    fn search_for_pattern(&self, args: &Value) -> ToolResult {
        let Some(pattern) = str_arg(args, "pattern") else {
            return ToolResult::error("Missing required parameter: pattern".to_string());
        };

        let path = str_arg(args, "path").unwrap_or(".");
        let max = usize_arg(args, "max_results").unwrap_or(self.limits.max_results);

        match self.scanner.search(pattern, path, max) {
            Ok(matches) => ToolResult::success(
                matches
                    .iter()
                    .map(|m| format!("{}:{}: {}", m.path, m.line_number, m.line))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(e) => ToolResult::error(format!("{:#}", e)),
        }
    }

    /// Read the contents of a file.
    fn read_file(&self, args: &Value) -> ToolResult {
        let Some(path) = str_arg(args, "path") else {
            return ToolResult::error("Missing required parameter: path".to_string());
        };

        let start = usize_arg(args, "start_line");
        let end = usize_arg(args, "end_line");

        match self.scanner.read_file(path, start, end) {
            Ok(content) => ToolResult::success(content),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    /// Get information about a file.
    fn get_file_info(&self, args: &Value) -> ToolResult {
        let Some(path) = str_arg(args, "path") else {
            return ToolResult::error("Missing required parameter: path".to_string());
        };

        let full_path = match self.scanner.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let metadata = match std::fs::metadata(&full_path) {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("Failed to get metadata: {}", e)),
        };

        if metadata.is_dir() {
            return ToolResult::success(format!("directory,0,{}", metadata.len()));
        }

        let language = full_path
            .extension()
            .and_then(|e| e.to_str())
            .map(language_for_extension)
            .unwrap_or("Unknown");

        let line_count = if metadata.len() <= self.scanner.max_file_size() {
            std::fs::read(&full_path)
                .map(|bytes| String::from_utf8_lossy(&bytes).lines().count())
                .unwrap_or(0)
        } else {
            0
        };

        // Minimal format: lang,lines,bytes
        ToolResult::success(format!("{},{},{}", language, line_count, metadata.len()))
    }

    /// Show recent commits, optionally for one path.
    fn git_log(&self, args: &Value) -> ToolResult {
        let path = str_arg(args, "path");
        let max = usize_arg(args, "max_count").unwrap_or(self.limits.max_log_entries);

        if let Some(p) = path {
            if let Err(e) = self.scanner.resolve(p) {
                return ToolResult::error(e.to_string());
            }
        }

        match repo::recent_commits(&self.repo_root, path, max) {
            Ok(commits) => ToolResult::success(
                commits
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(e) => ToolResult::error(format!("{:#}", e)),
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// Integer argument; some models send numbers as strings.
fn usize_arg(args: &Value, key: &str) -> Option<usize> {
    let value = args.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .map(|n| n as usize)
}

fn language_for_extension(ext: &str) -> &str {
    match ext {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" | "cjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "go" => "Go",
        "java" => "Java",
        "c" | "h" => "C",
        "cpp" | "hpp" | "cc" => "C++",
        "rb" => "Ruby",
        "md" => "Markdown",
        "toml" => "TOML",
        "yml" | "yaml" => "YAML",
        "json" => "JSON",
        _ => ext,
    }
}

/// Get the tool definitions offered to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_dir".to_string(),
            description: "List files and directories in the repository. Directories end with '/'. Use this to explore the codebase structure.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory path relative to repository root. Use '.' for root."
                    }
                }
            }),
        },
        ToolDefinition {
            name: "find_file".to_string(),
            description: "Find files by name. Supports '*' and '?' wildcards; include a '/' to match against the relative path.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "File name glob, e.g. '*.rs' or 'Cargo.toml'"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results"
                    }
                },
                "required": ["pattern"]
            }),
        },
        ToolDefinition {
            name: "search_for_pattern".to_string(),
            description: "Search file contents with a regular expression. Returns 'path:line: text' for each match.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression to search for"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory or file to restrict the search to (default: repository root)"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of matches"
                    }
                },
                "required": ["pattern"]
            }),
        },
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the contents of a file. Optionally restrict to a 1-based inclusive line range.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file relative to repository root"
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "First line to return"
                    },
                    "end_line": {
                        "type": "integer",
                        "description": "Last line to return"
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: "get_file_info".to_string(),
            description: "Get metadata about a file as 'language,lines,bytes'.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file"
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: "git_log".to_string(),
            description: "Show recent commits (hash, date, author, summary), newest first. Optionally only commits touching a path.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File or directory relative to repository root"
                    },
                    "max_count": {
                        "type": "integer",
                        "description": "Maximum number of commits"
                    }
                }
            }),
        },
    ]
}

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::SourcesConfig;
use crate::sources::{read_file_capped, search_files};
use crate::traits::{SourceError, Tool};

pub struct ReadFileTool {
    root: PathBuf,
    max_bytes: u64,
}

impl ReadFileTool {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self {
            root: PathBuf::from(&sources.files_root),
            max_bytes: sources.max_file_bytes,
        }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a local text file under the configured root"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "read_file",
            "description": "Read the contents of a local file. Supports plain text, markdown, JSON, CSV, etc. Paths are relative to the configured files root.",
            "parameters": {
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File path relative to the files root, e.g. 'notes/todo.md'."}
                },
                "required": ["path"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: ReadFileArgs = serde_json::from_str(arguments)?;
        let root = self.root.clone();
        let max_bytes = self.max_bytes;
        let path = args.path.clone();
        let result =
            tokio::task::spawn_blocking(move || read_file_capped(&root, &path, max_bytes)).await?;
        match result {
            Ok(content) => Ok(content),
            Err(SourceError::PermissionDenied(_)) => Ok(format!(
                "Can't read {}: it's outside the allowed directory.",
                args.path
            )),
            Err(e) => {
                warn!("read_file failed: {e}");
                Ok(format!("Could not read {}: {e}", args.path))
            }
        }
    }
}

pub struct SearchFilesTool {
    root: PathBuf,
    max_files: usize,
}

impl SearchFilesTool {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self {
            root: PathBuf::from(&sources.files_root),
            max_files: sources.max_files_scanned,
        }
    }
}

#[derive(Deserialize)]
struct SearchFilesArgs {
    query: String,
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search local files under the configured root for text content"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "search_files",
            "description": "Search local files for text content (case-insensitive). Returns matching file paths with a preview of the matching line.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to search for."}
                },
                "required": ["query"]
            }
        })
    }

    async fn call(&self, arguments: &str) -> anyhow::Result<String> {
        let args: SearchFilesArgs = serde_json::from_str(arguments)?;
        let root = self.root.clone();
        let max_files = self.max_files;
        let query = args.query.clone();
        let result =
            tokio::task::spawn_blocking(move || search_files(&root, &query, max_files)).await?;

        let matches = match result {
            Ok(m) => m,
            Err(e) => {
                warn!("search_files failed: {e}");
                return Ok(format!("Couldn't search files: {e}"));
            }
        };

        if matches.is_empty() {
            return Ok(format!("No files containing \"{}\" found.", args.query));
        }
        let lines: Vec<String> = matches
            .iter()
            .map(|m| {
                format!(
                    "- {} (line {})\n  Preview: {}",
                    m.path.display(),
                    m.line_number,
                    m.preview
                )
            })
            .collect();
        Ok(format!(
            "Found {} file(s) containing \"{}\":\n{}",
            matches.len(),
            args.query,
            lines.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources_for(dir: &tempfile::TempDir) -> SourcesConfig {
        SourcesConfig {
            files_root: dir.path().to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reads_a_file_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();
        let tool = ReadFileTool::new(&sources_for(&dir));
        let reply = tool
            .call(&json!({"path": "notes.txt"}).to_string())
            .await
            .unwrap();
        assert_eq!(reply, "remember the milk");
    }

    #[tokio::test]
    async fn missing_file_is_an_observation_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(&sources_for(&dir));
        let reply = tool
            .call(&json!({"path": "ghost.txt"}).to_string())
            .await
            .unwrap();
        assert!(reply.starts_with("Could not read ghost.txt"));
    }

    #[tokio::test]
    async fn search_reports_matches_with_previews() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "Q3 roadmap draft").unwrap();
        let tool = SearchFilesTool::new(&sources_for(&dir));
        let reply = tool
            .call(&json!({"query": "roadmap"}).to_string())
            .await
            .unwrap();
        assert!(reply.contains("Found 1 file(s)"));
        assert!(reply.contains("Preview: Q3 roadmap draft"));

        let miss = tool
            .call(&json!({"query": "unicorn"}).to_string())
            .await
            .unwrap();
        assert_eq!(miss, "No files containing \"unicorn\" found.");
    }
}

use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;

/// A text file loaded from a cloned repository.
#[derive(Debug, Clone)]
pub struct RepoDocument {
    pub path: String,
    pub content: String,
}

/// Canonical source URL for an `owner/name` repository key.
pub fn repo_url(repo: &str) -> String {
    format!("https://github.com/{repo}")
}

/// Clone `repo` and return its indexable text files. Blocking: run inside
/// `spawn_blocking`.
///
/// Any previous clone at the target path is removed first so a retried
/// ingestion never reads a stale or half-cloned tree.
pub fn load_repo(config: &Config, repo: &str) -> Result<Vec<RepoDocument>> {
    let url = repo_url(repo);
    let target = config.repos_dir().join(repo.replace('/', "__"));

    if target.exists() {
        std::fs::remove_dir_all(&target)
            .with_context(|| format!("Failed to clear old clone at {}", target.display()))?;
    }

    tracing::info!("Cloning {} into {}", url, target.display());
    git2::Repository::clone(&url, &target).with_context(|| format!("Failed to clone {url}"))?;

    let docs = walk_repo_files(&target);
    tracing::info!("Loaded {} files from {repo}", docs.len());
    Ok(docs)
}

/// Walk all indexable text files in a cloned repo and return their contents.
pub fn walk_repo_files(repo_dir: &Path) -> Vec<RepoDocument> {
    let mut files = Vec::new();

    for entry in WalkDir::new(repo_dir)
        .into_iter()
        .filter_entry(|e| !is_hidden_or_ignored(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();

        if !is_indexable_file(path) {
            continue;
        }

        // Skip very large files (>1MB)
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() > 1_048_576 {
                continue;
            }
        }

        let relative = path
            .strip_prefix(repo_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        match std::fs::read_to_string(path) {
            Ok(content) => files.push(RepoDocument {
                path: relative,
                content,
            }),
            Err(_) => {
                // Skip files that can't be read as UTF-8
                continue;
            }
        }
    }

    // Walk order is platform-dependent; sort for deterministic chunk output.
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn is_hidden_or_ignored(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    // Skip common non-code directories
    matches!(
        name.as_ref(),
        "node_modules"
            | "target"
            | "dist"
            | "build"
            | "__pycache__"
            | "vendor"
            | "venv"
            | "env"
    )
}

fn is_indexable_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if matches!(
        filename.as_ref(),
        "makefile" | "dockerfile" | "cargo.toml" | "package.json" | "readme" | "license"
    ) {
        return true;
    }

    matches!(
        ext.as_str(),
        "rs" | "py"
            | "js"
            | "ts"
            | "tsx"
            | "jsx"
            | "go"
            | "java"
            | "c"
            | "cpp"
            | "h"
            | "rb"
            | "php"
            | "sh"
            | "sql"
            | "html"
            | "css"
            | "json"
            | "yaml"
            | "yml"
            | "toml"
            | "md"
            | "rst"
            | "txt"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_picks_up_code_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg.js"), "junk").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "junk").unwrap();

        let files = walk_repo_files(dir.path());
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.rs", "notes.md"]);
    }

    #[test]
    fn test_walk_order_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.rs"), "b").unwrap();
        std::fs::write(dir.path().join("a.rs"), "a").unwrap();
        let files = walk_repo_files(dir.path());
        assert_eq!(files[0].path, "a.rs");
        assert_eq!(files[1].path, "b.rs");
    }

    #[test]
    fn test_repo_url() {
        assert_eq!(repo_url("vercel/next.js"), "https://github.com/vercel/next.js");
    }
}

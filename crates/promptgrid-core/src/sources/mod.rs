//! Discovery and loading of prompt and test-case texts.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{kind} directory not found: {}", .path.display())]
    MissingDir { kind: &'static str, path: PathBuf },

    #[error("no {kind} files (*.md) found in {}", .path.display())]
    Empty { kind: &'static str, path: PathBuf },

    #[error("unknown {kind} '{id}'")]
    UnknownId { kind: &'static str, id: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the identifiers and texts the engine combines.
///
/// Identifiers are returned sorted; texts are trimmed.
pub trait ExperimentSource: Send + Sync {
    fn prompt_ids(&self) -> Result<Vec<String>, SourceError>;
    fn test_case_ids(&self) -> Result<Vec<String>, SourceError>;
    fn load_prompt(&self, id: &str) -> Result<String, SourceError>;
    fn load_test_case(&self, id: &str) -> Result<String, SourceError>;
}

/// `*.md` files in a prompts directory and a test-cases directory (non-recursive).
/// Identifiers are file names. Discovery is re-run on every call.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    prompts_dir: PathBuf,
    test_cases_dir: PathBuf,
}

impl DirectorySource {
    pub fn open(
        prompts_dir: impl Into<PathBuf>,
        test_cases_dir: impl Into<PathBuf>,
    ) -> Result<Self, SourceError> {
        let source = Self {
            prompts_dir: prompts_dir.into(),
            test_cases_dir: test_cases_dir.into(),
        };
        for (kind, dir) in [
            ("prompt", &source.prompts_dir),
            ("test case", &source.test_cases_dir),
        ] {
            if !dir.is_dir() {
                return Err(SourceError::MissingDir {
                    kind,
                    path: dir.clone(),
                });
            }
            if discover(dir)?.is_empty() {
                return Err(SourceError::Empty {
                    kind,
                    path: dir.clone(),
                });
            }
        }
        Ok(source)
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    pub fn test_cases_dir(&self) -> &Path {
        &self.test_cases_dir
    }
}

impl ExperimentSource for DirectorySource {
    fn prompt_ids(&self) -> Result<Vec<String>, SourceError> {
        discover(&self.prompts_dir)
    }

    fn test_case_ids(&self) -> Result<Vec<String>, SourceError> {
        discover(&self.test_cases_dir)
    }

    fn load_prompt(&self, id: &str) -> Result<String, SourceError> {
        load_entry("prompt", &self.prompts_dir, id)
    }

    fn load_test_case(&self, id: &str) -> Result<String, SourceError> {
        load_entry("test case", &self.test_cases_dir, id)
    }
}

fn discover(dir: &Path) -> Result<Vec<String>, SourceError> {
    let io_err = |source: std::io::Error| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

fn load_entry(kind: &'static str, dir: &Path, id: &str) -> Result<String, SourceError> {
    // ids are bare file names; anything with a separator cannot have been discovered
    if id.is_empty() || id.contains(['/', '\\']) || id == ".." {
        return Err(SourceError::UnknownId {
            kind,
            id: id.to_string(),
        });
    }
    let path = dir.join(id);
    let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => SourceError::UnknownId {
            kind,
            id: id.to_string(),
        },
        _ => SourceError::Io {
            path: path.clone(),
            source,
        },
    })?;
    Ok(decode_text(&bytes).trim().to_string())
}

/// UTF-8, falling back to Latin-1 where every byte maps to the same code point.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn layout() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempdir().unwrap();
        let prompts = root.path().join("prompts");
        let cases = root.path().join("test_cases");
        fs::create_dir_all(&prompts).unwrap();
        fs::create_dir_all(&cases).unwrap();
        (root, prompts, cases)
    }

    #[test]
    fn discovers_sorted_markdown_only() -> anyhow::Result<()> {
        let (_root, prompts, cases) = layout();
        fs::write(prompts.join("B.md"), "b")?;
        fs::write(prompts.join("A.md"), "  a \n")?;
        fs::write(prompts.join("notes.txt"), "skip")?;
        fs::create_dir(prompts.join("nested.md"))?;
        fs::write(cases.join("X.md"), "x")?;

        let source = DirectorySource::open(&prompts, &cases)?;
        assert_eq!(source.prompt_ids()?, vec!["A.md", "B.md"]);
        assert_eq!(source.test_case_ids()?, vec!["X.md"]);
        assert_eq!(source.load_prompt("A.md")?, "a");
        Ok(())
    }

    #[test]
    fn open_rejects_missing_and_empty_dirs() {
        let (root, prompts, cases) = layout();
        fs::write(prompts.join("A.md"), "a").unwrap();

        let err = DirectorySource::open(&prompts, &cases).unwrap_err();
        assert!(matches!(err, SourceError::Empty { kind: "test case", .. }));

        let err = DirectorySource::open(root.path().join("nope"), &cases).unwrap_err();
        assert!(err.to_string().starts_with("prompt directory not found"));
    }

    #[test]
    fn latin1_fallback_on_invalid_utf8() -> anyhow::Result<()> {
        let (_root, prompts, cases) = layout();
        fs::write(prompts.join("A.md"), "a")?;
        fs::write(cases.join("X.md"), b"caf\xe9 \n")?;

        let source = DirectorySource::open(&prompts, &cases)?;
        assert_eq!(source.load_test_case("X.md")?, "café");
        Ok(())
    }

    #[test]
    fn unknown_ids_are_errors() -> anyhow::Result<()> {
        let (_root, prompts, cases) = layout();
        fs::write(prompts.join("A.md"), "a")?;
        fs::write(cases.join("X.md"), "x")?;
        let source = DirectorySource::open(&prompts, &cases)?;

        assert!(matches!(
            source.load_prompt("missing.md"),
            Err(SourceError::UnknownId { .. })
        ));
        assert!(matches!(
            source.load_prompt("../test_cases/X.md"),
            Err(SourceError::UnknownId { .. })
        ));
        Ok(())
    }
}

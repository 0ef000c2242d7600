//! Test-case discovery
//!
//! Test cases live exactly four levels below `<root>/test-cases/`
//! (`test-cases/<cloud>/<service>/<rule>/<case>/`). A leaf directory is a
//! test case only when it contains the provisioner's root file.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Directory under the repository root holding all test cases
pub const TEST_CASES_DIR: &str = "test-cases";

/// Fixed nesting depth of a test case below `TEST_CASES_DIR`
pub const CASE_DEPTH: usize = 4;

/// Resolve the repository root from the running executable's location.
///
/// The caller's working directory is never consulted.
pub fn resolve_repo_root() -> Result<PathBuf> {
    let exe = std::env::current_exe()?.canonicalize()?;
    Ok(repo_root_from(&exe))
}

/// Nearest ancestor of `program` holding a `test-cases` directory. Falls back
/// to the program's grandparent (`<root>/<tool dir>/<program>`).
pub fn repo_root_from(program: &Path) -> PathBuf {
    program
        .ancestors()
        .skip(1)
        .find(|dir| dir.join(TEST_CASES_DIR).is_dir())
        .or_else(|| program.parent().and_then(Path::parent))
        .unwrap_or(program)
        .to_path_buf()
}

/// Enumerates test-case directories under a repository root
#[derive(Debug, Clone)]
pub struct Locator {
    root: PathBuf,
    root_file: String,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>, root_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            root_file: root_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root.join(TEST_CASES_DIR)
    }

    /// Absolute paths of every test case. Order is unspecified.
    pub fn locate(&self) -> Result<Vec<PathBuf>> {
        let cases_dir = self.cases_dir();
        if !cases_dir.is_dir() {
            return Ok(Vec::new());
        }
        let cases_dir = cases_dir.canonicalize()?;

        let walker = WalkDir::new(&cases_dir)
            .min_depth(CASE_DEPTH)
            .max_depth(CASE_DEPTH)
            .follow_links(true);

        let mut cases = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() && entry.path().join(&self.root_file).is_file() {
                cases.push(entry.into_path());
            }
        }

        Ok(cases)
    }

    /// Name of a test case relative to `test-cases/`, e.g. `aws/s3/public/case_1`
    pub fn case_id(&self, case: &Path) -> String {
        let cases_dir = self.cases_dir();
        let relative = cases_dir
            .canonicalize()
            .ok()
            .and_then(|base| case.strip_prefix(base).ok().map(Path::to_path_buf))
            .or_else(|| case.strip_prefix(&cases_dir).ok().map(Path::to_path_buf))
            .unwrap_or_else(|| case.to_path_buf());
        relative.to_string_lossy().into_owned()
    }
}

/// Base name of a test-case directory, used as log context
pub fn case_name(case: &Path) -> String {
    case.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| case.display().to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_case(root: &Path, rel: &str, with_marker: bool) -> PathBuf {
        let dir = root.join(TEST_CASES_DIR).join(rel);
        fs::create_dir_all(&dir).unwrap();
        if with_marker {
            fs::write(dir.join("main.tf"), "").unwrap();
        }
        dir
    }

    #[test]
    fn test_locate_missing_cases_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let locator = Locator::new(temp.path(), "main.tf");
        assert!(locator.locate().unwrap().is_empty());
    }

    #[test]
    fn test_locate_returns_absolute_paths() {
        let temp = TempDir::new().unwrap();
        make_case(temp.path(), "aws/s3/public/case_1", true);

        let cases = Locator::new(temp.path(), "main.tf").locate().unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].is_absolute());
        assert!(cases[0].ends_with("aws/s3/public/case_1"));
    }

    #[test]
    fn test_marker_must_be_a_file() {
        let temp = TempDir::new().unwrap();
        let dir = make_case(temp.path(), "aws/s3/public/case_1", false);
        fs::create_dir(dir.join("main.tf")).unwrap();

        assert!(Locator::new(temp.path(), "main.tf").locate().unwrap().is_empty());
    }

    #[test]
    fn test_case_id_and_name() {
        let temp = TempDir::new().unwrap();
        make_case(temp.path(), "azure/storage/encryption/case_2", true);

        let locator = Locator::new(temp.path(), "main.tf");
        let cases = locator.locate().unwrap();
        assert_eq!(locator.case_id(&cases[0]), "azure/storage/encryption/case_2");
        assert_eq!(case_name(&cases[0]), "case_2");
    }

    #[test]
    fn test_repo_root_from_finds_test_cases_ancestor() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(TEST_CASES_DIR)).unwrap();
        let exe = root.join("target/release/tool-runner");

        assert_eq!(repo_root_from(&exe), root);
    }

    #[test]
    fn test_repo_root_from_falls_back_to_grandparent() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tool_runner/tool-runner");

        assert_eq!(repo_root_from(&exe), temp.path());
    }
}

//! Integration tests for test-case discovery
//!
//! Builds throwaway `test-cases/` trees and checks which leaves the locator
//! reports.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tool_runner::discovery::{Locator, TEST_CASES_DIR};

fn case_dir(root: &Path, rel: &str) -> PathBuf {
    let dir = root.join(TEST_CASES_DIR).join(rel);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn with_marker(root: &Path, rel: &str) -> PathBuf {
    let dir = case_dir(root, rel);
    fs::write(dir.join("main.tf"), "resource \"null_resource\" \"x\" {}\n").unwrap();
    dir.canonicalize().unwrap()
}

fn located(root: &Path) -> HashSet<PathBuf> {
    Locator::new(root, "main.tf")
        .locate()
        .expect("Discovery should succeed")
        .into_iter()
        .collect()
}

#[test]
fn test_finds_every_marked_leaf() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let expected: HashSet<PathBuf> = [
        "aws/s3/public_bucket/case_1",
        "aws/s3/public_bucket/case_2",
        "aws/iam/wildcard/case_1",
        "azure/storage/https_only/case_1",
    ]
    .iter()
    .map(|rel| with_marker(root, rel))
    .collect();

    assert_eq!(located(root), expected);
}

#[test]
fn test_unmarked_leaves_are_excluded() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let marked = with_marker(root, "aws/s3/public_bucket/case_1");
    case_dir(root, "aws/s3/public_bucket/case_2");
    // Marker with a different name does not count
    let other = case_dir(root, "aws/s3/public_bucket/case_3");
    fs::write(other.join("variables.tf"), "").unwrap();

    let found = located(root);
    assert_eq!(found.len(), 1);
    assert!(found.contains(&marked));
}

#[test]
fn test_only_depth_four_is_considered() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let leaf = with_marker(root, "gcp/compute/public_ip/case_1");
    with_marker(root, "gcp/compute/public_ip");
    with_marker(root, "gcp/compute/public_ip/case_1/nested");
    with_marker(root, "gcp/compute/public_ip/case_1/nested/deeper");
    fs::write(root.join(TEST_CASES_DIR).join("main.tf"), "").unwrap();

    let found = located(root);
    assert_eq!(found, HashSet::from([leaf]));
}

#[test]
fn test_no_test_cases_dir() {
    let temp = TempDir::new().unwrap();
    assert!(located(temp.path()).is_empty());
}

#[test]
fn test_located_paths_are_absolute_and_ids_relative() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let leaf = with_marker(root, "aws/ec2/imdsv2/case_1");

    let locator = Locator::new(root, "main.tf");
    let cases = locator.locate().unwrap();

    assert_eq!(cases, vec![leaf.clone()]);
    assert!(cases[0].is_absolute());
    assert_eq!(locator.case_id(&leaf), "aws/ec2/imdsv2/case_1");
}

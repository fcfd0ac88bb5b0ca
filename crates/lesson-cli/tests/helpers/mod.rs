use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
    teacher: Uuid,
}

#[allow(dead_code)]
impl CliTestHarness {
    /// Create a new test harness with a temporary database and a default teacher
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            temp_dir,
            db_path,
            teacher: Uuid::now_v7(),
        }
    }

    pub fn teacher(&self) -> Uuid {
        self.teacher
    }

    /// Get a Command instance configured for testing, without a default user
    pub fn bare_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("lessons").expect("Failed to find lessons binary");

        // Run inside the temp dir so no stray lessons.toml is picked up
        cmd.current_dir(self.temp_dir.path());
        cmd.env("LESSONS_DATABASE_PATH", &self.db_path);
        cmd.env_remove("LESSONS_DEFAULT_USER");
        cmd.env_remove("RUST_LOG");

        cmd
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = self.bare_command();
        cmd.env("LESSONS_DEFAULT_USER", self.teacher.to_string());
        cmd
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs a command that must succeed and returns the first id after `marker`
    pub fn run_for_id(&self, args: &[&str], marker: &str) -> Uuid {
        let output = self.run_success(args).get_output().stdout.clone();
        let stdout = strip_ansi(&String::from_utf8_lossy(&output));
        let after = stdout
            .split_once(marker)
            .map(|(_, rest)| rest)
            .unwrap_or_else(|| panic!("'{}' not found in output:\n{}", marker, stdout));

        after
            .split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
            .find_map(|token| Uuid::parse_str(token).ok())
            .unwrap_or_else(|| panic!("No id after '{}' in output:\n{}", marker, stdout))
    }
}

/// Removes terminal colour sequences from captured output
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Common test fixtures
pub struct TestFixtures;

#[allow(dead_code)]
impl TestFixtures {
    /// Weekly Monday/Wednesday lesson starting Monday 2025-03-03 10:00 UTC
    pub fn weekly_lesson_args() -> Vec<&'static str> {
        vec![
            "add", "Piano",
            "--start", "2025-03-03T10:00:00Z",
            "--end", "2025-03-03T10:45:00Z",
            "--every", "weekly",
            "--on", "mon,wed",
            "--count", "10",
        ]
    }

    pub fn one_off_lesson_args() -> Vec<&'static str> {
        vec![
            "add", "Trial lesson",
            "--start", "2025-03-04T15:00:00Z",
            "--end", "2025-03-04T16:00:00Z",
        ]
    }

    /// The two weeks starting at the weekly fixture's anchor
    pub fn two_weeks() -> Vec<&'static str> {
        vec!["list", "--from", "2025-03-03T00:00:00Z", "--to", "2025-03-16T23:59:00Z"]
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    pub fn has_occurrence_table_headers() -> impl Predicate<str> {
        predicate::str::contains("Start")
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Status"))
    }

    pub fn lesson_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("Created lesson").or(predicate::str::contains("Created recurring lesson"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error")
    }
}

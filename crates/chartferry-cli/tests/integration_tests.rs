//! Integration tests for the chartferry binary
//!
//! These cover the failures that happen before any helm, gpg or registry
//! call; helm points at a missing binary so a stray call would show up as a
//! packaging error instead.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const MISSING_HELM: &str = "/nonexistent/chartferry-test/helm";

/// Helper to run chartferry with a request on stdin
fn chartferry(args: &[&str], stdin: &str) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_chartferry"))
        .args(["--helm", MISSING_HELM, "--gpg", MISSING_HELM])
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute chartferry");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn sources_with_chart() -> TempDir {
    let dir = TempDir::new().unwrap();
    let chart = dir.path().join("repo/charts/webapp");
    std::fs::create_dir_all(&chart).unwrap();
    std::fs::write(
        chart.join("Chart.yaml"),
        "apiVersion: v2\nname: webapp\nversion: 0.1.0\n",
    )
    .unwrap();
    dir
}

fn out_request(params: serde_json::Value) -> String {
    serde_json::json!({
        "source": {
            "server_url": "http://127.0.0.1:1",
            "project": "library",
            "chart_name": "webapp",
            "version_range": ">=1.0.0 <2.0.0"
        },
        "params": params
    })
    .to_string()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

mod input {
    use super::*;

    #[test]
    fn test_malformed_json() {
        let sources = sources_with_chart();
        let output = chartferry(&["out", path_arg(sources.path())], "{\"source\": ");

        assert_eq!(output.status.code(), Some(10));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Invalid input"));
    }

    #[test]
    fn test_missing_source_field() {
        let output = chartferry(
            &["check"],
            r#"{"source": {"server_url": "https://h", "project": "p"}}"#,
        );
        assert_eq!(output.status.code(), Some(10));
    }

    #[test]
    fn test_input_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("request.json");
        std::fs::write(&file, "not json").unwrap();

        let output = chartferry(&["check", "--input", path_arg(&file)], "");
        assert_eq!(output.status.code(), Some(10));
    }

    #[test]
    fn test_unknown_subcommand() {
        let output = chartferry(&["publish"], "");
        assert_eq!(output.status.code(), Some(64));
    }
}

mod out_command {
    use super::*;

    #[test]
    fn test_range_violation() {
        let sources = sources_with_chart();
        let output = chartferry(
            &["out", path_arg(sources.path())],
            &out_request(serde_json::json!({
                "chart": "repo/charts/webapp",
                "version": "2.1.0"
            })),
        );

        assert_eq!(output.status.code(), Some(12));
        assert!(output.stdout.is_empty());
        let chart =
            std::fs::read_to_string(sources.path().join("repo/charts/webapp/Chart.yaml")).unwrap();
        assert!(chart.contains("version: 0.1.0"));
    }

    #[test]
    fn test_version_file_outside_range() {
        let sources = sources_with_chart();
        std::fs::create_dir_all(sources.path().join("version")).unwrap();
        std::fs::write(sources.path().join("version/number"), "0.9.0\n").unwrap();

        let output = chartferry(
            &["out", path_arg(sources.path())],
            &out_request(serde_json::json!({
                "chart": "repo/charts/webapp",
                "version": "1.0.0",
                "version_file": "version/number"
            })),
        );

        assert_eq!(output.status.code(), Some(12));
    }

    #[test]
    fn test_missing_chart_directory() {
        let sources = TempDir::new().unwrap();
        let output = chartferry(
            &["out", path_arg(sources.path())],
            &out_request(serde_json::json!({
                "chart": "repo/charts/webapp",
                "version": "1.0.0"
            })),
        );

        assert_eq!(output.status.code(), Some(13));
    }

    #[test]
    fn test_helm_missing_is_packaging_error() {
        let sources = sources_with_chart();
        let output = chartferry(
            &["out", path_arg(sources.path())],
            &out_request(serde_json::json!({
                "chart": "repo/charts/webapp",
                "version": "1.0.0"
            })),
        );

        assert_eq!(output.status.code(), Some(20));
        // The descriptor is rewritten before packaging starts
        let chart =
            std::fs::read_to_string(sources.path().join("repo/charts/webapp/Chart.yaml")).unwrap();
        assert!(chart.contains("version: 1.0.0"));
    }
}

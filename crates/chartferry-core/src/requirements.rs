//! Repository discovery in a chart's `requirements.yaml`
//!
//! The manifest is not parsed as YAML: every line is scanned for an HTTP(S)
//! URL, and the repository is named after the first label of the URL's host
//! (`https://charts.example.com/stable` registers as `charts`).

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::Result;

/// Name of the dependency manifest at the chart root
pub const REQUIREMENTS_FILE: &str = "requirements.yaml";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*",
    )
    .expect("valid regex")
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//([^.]*)").expect("valid regex"));

/// A chart repository the package manager must know before building deps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub name: String,
    pub url: String,
}

/// Scan manifest text, first occurrence of each repository name wins
pub fn scan_repositories(content: &str) -> Vec<RepositoryReference> {
    let mut repositories: Vec<RepositoryReference> = Vec::new();

    for line in content.lines() {
        let Some(url) = URL_PATTERN.find(line).map(|m| m.as_str()) else {
            continue;
        };

        let Some(name) = repository_name(url) else {
            tracing::warn!(url, "cannot derive a repository name");
            continue;
        };

        if repositories.iter().any(|r| r.name == name) {
            tracing::debug!(url, name = %name, "repository already registered");
            continue;
        }

        repositories.push(RepositoryReference {
            name,
            url: url.to_string(),
        });
    }

    repositories
}

/// Read `requirements.yaml` from a chart directory.
///
/// `Ok(None)` when the chart has no manifest.
pub fn load_repositories(chart_dir: &Path) -> Result<Option<Vec<RepositoryReference>>> {
    let file = chart_dir.join(REQUIREMENTS_FILE);
    if !file.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&file)?;
    Ok(Some(scan_repositories(&content)))
}

fn repository_name(url: &str) -> Option<String> {
    NAME_PATTERN
        .captures(url)
        .map(|caps| caps[1].to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
dependencies:
  - name: redis
    version: ~17.0.0
    repository: https://charts.bitnami.com/bitnami
  - name: postgresql
    version: ~12.0.0
    repository: https://charts.bitnami.com/bitnami
  - name: common
    version: 1.x
    repository: https://kubernetes-charts.storage.googleapis.com
  - name: local
    version: 0.1.0
    repository: file://../local
"#;

    #[test]
    fn test_scan_dedups_by_name() {
        let repos = scan_repositories(MANIFEST);
        assert_eq!(
            repos,
            vec![
                RepositoryReference {
                    name: "charts".to_string(),
                    url: "https://charts.bitnami.com/bitnami".to_string(),
                },
                RepositoryReference {
                    name: "kubernetes-charts".to_string(),
                    url: "https://kubernetes-charts.storage.googleapis.com".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_same_name_from_different_urls_registers_once() {
        let manifest = "repository: https://charts.example.com/stable\n\
                        repository: https://charts.other.org/incubator\n";
        let repos = scan_repositories(manifest);
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].url, "https://charts.example.com/stable");
    }

    #[test]
    fn test_scan_ignores_lines_without_urls() {
        assert!(scan_repositories("dependencies: []\n# nothing here\n").is_empty());
    }

    #[test]
    fn test_load_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_repositories(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REQUIREMENTS_FILE), MANIFEST).unwrap();
        let repos = load_repositories(dir.path()).unwrap().unwrap();
        assert_eq!(repos.len(), 2);
    }
}

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Branch used when neither the URL nor the configuration names one.
pub const DEFAULT_BRANCH: &str = "main";

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];

/// A GitHub repository resolved to owner, project name and branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl RepositoryReference {
    /// Parses a repository URL.
    ///
    /// Accepts `https://github.com/<owner>/<repo>`, optionally followed by
    /// `/<branch>` or `/tree/<branch>`. Branch names may contain slashes
    /// (`/tree/feature/login`). A trailing `.git` on the repository name is
    /// dropped. When no branch is present, `default_branch` is used.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::MalformedReference`] if the input is not an
    /// http(s) URL on github.com with at least an owner and a repository.
    pub fn parse(input: &str, default_branch: &str) -> Result<Self, ScanError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| ScanError::malformed(trimmed, format!("not a valid URL: {}", e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScanError::malformed(
                trimmed,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !GITHUB_HOSTS.contains(&host.as_str()) {
            return Err(ScanError::malformed(
                trimmed,
                format!("expected a github.com URL, got host '{}'", host),
            ));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (owner, name) = match segments.as_slice() {
            [owner, name, ..] => (*owner, name.trim_end_matches(".git")),
            _ => {
                return Err(ScanError::malformed(
                    trimmed,
                    "expected https://github.com/<owner>/<repo>[/<branch>]",
                ))
            }
        };

        if name.is_empty() {
            return Err(ScanError::malformed(trimmed, "repository name is empty"));
        }

        let branch = match &segments[2..] {
            [] | ["tree"] => default_branch.to_string(),
            ["tree", rest @ ..] => rest.join("/"),
            rest => rest.join("/"),
        };

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch,
        })
    }

    /// Returns a copy pointing at another branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Builds the raw-content URL of `package.json` under `base_url`.
    pub fn manifest_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}/{}/package.json",
            base_url.trim_end_matches('/'),
            self.owner,
            self.name,
            self.branch
        )
    }
}

impl std::fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_branch() {
        let repo = RepositoryReference::parse("https://github.com/acme/portal", DEFAULT_BRANCH)
            .unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "portal");
        assert_eq!(repo.branch, "main");

        let repo = RepositoryReference::parse("https://github.com/acme/portal/", "main").unwrap();
        assert_eq!(repo.branch, "main");
    }

    #[test]
    fn test_parse_branch_forms() {
        let repo =
            RepositoryReference::parse("https://github.com/acme/portal/develop", "main").unwrap();
        assert_eq!(repo.branch, "develop");

        let repo =
            RepositoryReference::parse("https://github.com/acme/portal/tree/release", "main")
                .unwrap();
        assert_eq!(repo.branch, "release");
    }

    #[test]
    fn test_parse_branch_with_slashes() {
        let repo = RepositoryReference::parse(
            "https://github.com/acme/portal/tree/feature/login-flow",
            "main",
        )
        .unwrap();
        assert_eq!(repo.branch, "feature/login-flow");
        assert_eq!(
            repo.manifest_url("https://raw.githubusercontent.com"),
            "https://raw.githubusercontent.com/acme/portal/feature/login-flow/package.json"
        );

        let repo =
            RepositoryReference::parse("https://github.com/acme/portal/tree/", "develop").unwrap();
        assert_eq!(repo.branch, "develop");
    }

    #[test]
    fn test_parse_strips_git_suffix() {
        let repo =
            RepositoryReference::parse("https://www.github.com/acme/portal.git", "main").unwrap();
        assert_eq!(repo.name, "portal");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "not a url",
            "ftp://github.com/acme/portal",
            "https://gitlab.com/acme/portal",
            "https://github.com/acme",
            "https://github.com/",
            "github.com/acme/portal",
        ] {
            let err = RepositoryReference::parse(input, "main").unwrap_err();
            assert_eq!(err.kind(), "malformed-reference", "input: {input:?}");
        }
    }

    #[test]
    fn test_manifest_url() {
        let repo = RepositoryReference::parse("https://github.com/acme/portal", "main").unwrap();
        assert_eq!(
            repo.manifest_url("https://raw.githubusercontent.com/"),
            "https://raw.githubusercontent.com/acme/portal/main/package.json"
        );
    }

    #[test]
    fn test_with_branch() {
        let repo = RepositoryReference::parse("https://github.com/acme/portal", "main")
            .unwrap()
            .with_branch("hotfix");
        assert_eq!(repo.to_string(), "acme/portal@hotfix");
    }
}

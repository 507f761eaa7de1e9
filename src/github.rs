//! GitHub API helpers: list the files a pull request changed, and post the
//! coverage report as a pull request comment.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use tracing::info;

use crate::report::PR_IDENTIFIER;

const API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

/// Resolved GitHub Actions context, read from environment variables.
pub struct Context {
    token: String,
    repo: String,
    pr_number: u64,
    server_url: String,
    pub sha: Option<String>,
}

impl Context {
    /// Build a context from standard GitHub Actions environment variables
    /// (`GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_REF`, `GITHUB_SHA`,
    /// `GITHUB_SERVER_URL`, `GITHUB_EVENT_PATH`).
    ///
    /// The commit is the pull request's head from the event payload;
    /// `GITHUB_SHA` is the merge commit on `pull_request` events and is only
    /// used when the payload has no head.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;
        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY environment variable is required")?;
        let github_ref = std::env::var("GITHUB_REF").unwrap_or_default();
        let pr_number = pr_number_from_ref(&github_ref)
            .context("could not determine PR number from GITHUB_REF")?;
        let server_url = std::env::var("GITHUB_SERVER_URL")
            .unwrap_or_else(|_| "https://github.com".to_string());
        let sha = std::env::var("GITHUB_EVENT_PATH")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|event| head_sha_from_event(&event))
            .or_else(|| std::env::var("GITHUB_SHA").ok());
        Ok(Self {
            token,
            repo,
            pr_number,
            server_url,
            sha,
        })
    }

    /// Web URL of the repository, used for commit links.
    pub fn repo_url(&self) -> String {
        format!("{}/{}", self.server_url.trim_end_matches('/'), self.repo)
    }

    /// Fetch the paths of every file the pull request changed.
    pub fn fetch_pr_files(&self) -> Result<Vec<String>> {
        info!(repo = %self.repo, pr = self.pr_number, "fetching pull request files");
        let files = fetch_pr_files(&self.token, &self.repo, self.pr_number)?;
        info!(files = files.len(), "fetched pull request files");
        Ok(files)
    }

    /// Create or update the coverage comment on the pull request.
    pub fn post_comment(&self, body: &str) -> Result<()> {
        post_comment(&self.token, &self.repo, self.pr_number, body)?;
        info!(repo = %self.repo, pr = self.pr_number, "comment posted");
        Ok(())
    }
}

/// Extract PR number from GITHUB_REF (e.g. "refs/pull/42/merge" → 42).
fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse().ok()
    } else {
        None
    }
}

/// `pull_request.head.sha` from a webhook event payload.
fn head_sha_from_event(event: &str) -> Option<String> {
    let event: serde_json::Value = serde_json::from_str(event).ok()?;
    event
        .pointer("/pull_request/head/sha")
        .and_then(|sha| sha.as_str())
        .map(str::to_string)
}

fn get(url: &str, token: &str) -> ureq::Request {
    ureq::get(url)
        .set("Authorization", &format!("Bearer {}", token))
        .set("Accept", "application/vnd.github+json")
        .set("User-Agent", "covdelta")
        .set("X-GitHub-Api-Version", "2022-11-28")
}

#[derive(Deserialize)]
struct PrFile {
    filename: String,
}

fn fetch_pr_files(token: &str, repo: &str, pr_number: u64) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut page = 1u32;
    loop {
        let url = format!(
            "{}/repos/{}/pulls/{}/files?per_page={}&page={}",
            API_URL, repo, pr_number, PER_PAGE, page
        );
        let resp = get(&url, token)
            .call()
            .context("Failed to list pull request files")?;
        let batch: Vec<PrFile> = resp
            .into_json()
            .context("Failed to parse pull request files JSON")?;
        let done = batch.len() < PER_PAGE as usize;
        files.extend(batch.into_iter().map(|f| f.filename));
        if done {
            break;
        }
        page += 1;
    }
    Ok(files)
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

/// Find an existing covdelta comment on a PR (by our hidden marker).
fn find_existing_comment(token: &str, repo: &str, pr_number: u64) -> Result<Option<u64>> {
    let mut page = 1u32;
    loop {
        let url = format!(
            "{}/repos/{}/issues/{}/comments?per_page={}&page={}",
            API_URL, repo, pr_number, PER_PAGE, page
        );
        let resp = get(&url, token)
            .call()
            .context("Failed to list PR comments")?;

        let comments: Vec<Comment> = resp.into_json().context("Failed to parse comments JSON")?;
        if comments.is_empty() {
            break;
        }
        let found = comments
            .iter()
            .find(|c| c.body.as_deref().is_some_and(|b| b.contains(PR_IDENTIFIER)));
        if let Some(c) = found {
            return Ok(Some(c.id));
        }
        page += 1;
    }
    Ok(None)
}

/// Create or update the covdelta comment on a PR.
fn post_comment(token: &str, repo: &str, pr_number: u64, body: &str) -> Result<()> {
    let body = if body.contains(PR_IDENTIFIER) {
        body.to_string()
    } else {
        format!("{}\n{}", PR_IDENTIFIER, body)
    };

    let (request, action) = match find_existing_comment(token, repo, pr_number)? {
        Some(comment_id) => {
            let url = format!("{}/repos/{}/issues/comments/{}", API_URL, repo, comment_id);
            (ureq::patch(&url), "updating")
        }
        None => {
            let url = format!("{}/repos/{}/issues/{}/comments", API_URL, repo, pr_number);
            (ureq::post(&url), "creating")
        }
    };

    let resp = request
        .set("Authorization", &format!("Bearer {}", token))
        .set("Accept", "application/vnd.github+json")
        .set("User-Agent", "covdelta")
        .set("X-GitHub-Api-Version", "2022-11-28")
        .send_json(serde_json::json!({ "body": body }));
    match resp {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            bail!("GitHub API error {} comment (HTTP {}): {}", action, code, body)
        }
        Err(e) => bail!("Failed {} comment: {}", action, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_number_from_ref() {
        assert_eq!(pr_number_from_ref("refs/pull/42/merge"), Some(42));
        assert_eq!(pr_number_from_ref("refs/heads/main"), None);
        assert_eq!(pr_number_from_ref("refs/pull/abc/merge"), None);
        assert_eq!(pr_number_from_ref(""), None);
    }

    #[test]
    fn test_head_sha_from_event() {
        let event = r#"{
            "action": "synchronize",
            "pull_request": { "number": 7, "head": { "sha": "deadbeefcafe", "ref": "feature" } }
        }"#;
        assert_eq!(head_sha_from_event(event).as_deref(), Some("deadbeefcafe"));
        assert_eq!(head_sha_from_event(r#"{ "ref": "refs/heads/main" }"#), None);
        assert_eq!(head_sha_from_event("not json"), None);
    }
}

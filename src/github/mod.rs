//! GitHub 수집 모듈 - 커밋/이슈 JSON 다운로드
//!
//! REST API 페이지를 순서대로 가져와 원본 배열 그대로 저장합니다.
//! 실패 응답이나 빈 페이지에서 멈추며 재시도는 하지 않습니다.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

use crate::config::GithubConfig;

/// 토큰 환경변수 (없으면 비인증 요청)
pub const TOKEN_ENV: &str = "GITHUB_API_TOKEN";

const API_BASE: &str = "https://api.github.com/";
const PAGE_DELAY: Duration = Duration::from_secs(1);

/// GitHub REST 클라이언트
pub struct GithubClient {
    client: reqwest::Client,
    base: Url,
    repo: String,
    token: Option<String>,
    per_page: u32,
}

impl GithubClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `repo` - `owner/name`
    /// * `token` - 개인 액세스 토큰 (선택)
    pub fn new(repo: &str, token: Option<String>, per_page: u32) -> Result<Self> {
        validate_repo(repo)?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("minerva-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base: Url::parse(API_BASE).context("Invalid GitHub API base URL")?,
            repo: repo.to_string(),
            token: token.filter(|t| !t.is_empty()),
            per_page: per_page.clamp(1, 100),
        })
    }

    /// 설정 + `GITHUB_API_TOKEN`으로 생성
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).ok();
        if token.is_none() {
            tracing::warn!("{} not set, using unauthenticated requests", TOKEN_ENV);
        }
        Self::new(&config.repo, token, config.per_page)
    }

    /// 최근 커밋 (최대 `pages` 페이지)
    pub async fn fetch_commits(&self, pages: u32) -> Result<Vec<Value>> {
        self.fetch_pages("commits", &[], pages).await
    }

    /// 최근 이슈 (열림/닫힘 모두, 최대 `pages` 페이지)
    pub async fn fetch_issues(&self, pages: u32) -> Result<Vec<Value>> {
        self.fetch_pages("issues", &[("state", "all")], pages).await
    }

    async fn fetch_pages(
        &self,
        resource: &str,
        params: &[(&str, &str)],
        pages: u32,
    ) -> Result<Vec<Value>> {
        let mut records = Vec::new();

        for page in 1..=pages {
            if page > 1 {
                tokio::time::sleep(PAGE_DELAY).await;
            }

            let url = self.page_url(resource, params, page)?;
            tracing::info!("Fetching {}", url);

            let mut request = self.client.get(url.clone());
            if let Some(ref token) = self.token {
                request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to request {}", url))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!("GitHub API error ({}) on page {}: {}", status, page, body);
                break;
            }

            let body: Value = response
                .json()
                .await
                .with_context(|| format!("Invalid JSON from {}", url))?;

            match body {
                Value::Array(items) if !items.is_empty() => records.extend(items),
                Value::Array(_) => break,
                other => anyhow::bail!("Expected JSON array from {}, got: {}", url, other),
            }
        }

        tracing::info!("Fetched {} {}", records.len(), resource);
        Ok(records)
    }

    /// `repos/{repo}/{resource}?{params}&per_page=..&page=..`
    fn page_url(&self, resource: &str, params: &[(&str, &str)], page: u32) -> Result<Url> {
        let mut url = self
            .base
            .join(&format!("repos/{}/{}", self.repo, resource))
            .context("Failed to build GitHub URL")?;

        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", &page.to_string());

        Ok(url)
    }
}

/// 레코드를 JSON 배열 파일로 저장 (상위 디렉토리 생성)
pub fn save_json(path: &Path, records: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .with_context(|| format!("Failed to write JSON: {:?}", path))?;
    writer.flush()?;

    tracing::info!("Saved {} records to {:?}", records.len(), path);
    Ok(())
}

fn validate_repo(repo: &str) -> Result<()> {
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => anyhow::bail!("Repository must be in owner/name form: {}", repo),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        let client = GithubClient::new("python/cpython", None, 100).unwrap();

        let url = client.page_url("commits", &[], 3).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/python/cpython/commits?per_page=100&page=3"
        );

        let url = client.page_url("issues", &[("state", "all")], 1).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/python/cpython/issues?state=all&per_page=100&page=1"
        );
    }

    #[test]
    fn test_per_page_clamped() {
        let client = GithubClient::new("a/b", Some(String::new()), 500).unwrap();
        assert_eq!(client.per_page, 100);
        assert!(client.token.is_none());
    }

    #[test]
    fn test_invalid_repo_rejected() {
        assert!(GithubClient::new("cpython", None, 100).is_err());
        assert!(GithubClient::new("python/", None, 100).is_err());
        assert!(GithubClient::new("a/b/c", None, 100).is_err());
    }

    #[test]
    fn test_save_json_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("json").join("git_commits.json");
        let records = vec![serde_json::json!({"sha": "abc"})];

        save_json(&path, &records).unwrap();

        let loaded: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, records);
    }
}

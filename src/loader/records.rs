//! GitHub 커밋/이슈 JSON 로더
//!
//! `github` 모듈(또는 외부 스크립트)이 저장한 REST API 응답 배열을 읽어
//! 레코드 하나당 문서 하나로 변환합니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::Document;

// ============================================================================
// Record Types (필요한 필드만)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CommitRecord {
    sha: Option<String>,
    commit: Option<CommitDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitDetail {
    message: Option<String>,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IssueRecord {
    title: Option<String>,
    body: Option<String>,
    number: Option<Value>,
    user: Option<IssueUser>,
    created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IssueUser {
    login: Option<String>,
}

// ============================================================================
// Loaders
// ============================================================================

/// 커밋 JSON 로드
///
/// content = 커밋 메시지, metadata = {sha, author, date}
pub fn load_github_commits_json(path: &Path) -> Result<Vec<Document>> {
    let commits: Vec<CommitRecord> = read_json_array(path)?;

    let documents: Vec<Document> = commits
        .into_iter()
        .map(|record| {
            let detail = record.commit.unwrap_or_default();
            let author = detail.author.unwrap_or_default();

            let mut metadata = Map::new();
            metadata.insert("sha".to_string(), Value::String(record.sha.unwrap_or_default()));
            metadata.insert(
                "author".to_string(),
                Value::String(author.name.unwrap_or_default()),
            );
            metadata.insert(
                "date".to_string(),
                Value::String(author.date.unwrap_or_default()),
            );

            Document::new(detail.message.unwrap_or_default(), metadata)
        })
        .collect();

    tracing::info!("Loaded {} commits from {:?}", documents.len(), path);
    Ok(documents)
}

/// 이슈 JSON 로드
///
/// content = "{title}\n\n{body}", metadata = {issue_number, author, date}
pub fn load_github_issues_json(path: &Path) -> Result<Vec<Document>> {
    let issues: Vec<IssueRecord> = read_json_array(path)?;

    let documents: Vec<Document> = issues
        .into_iter()
        .map(|record| {
            let content = format!(
                "{}\n\n{}",
                record.title.unwrap_or_default(),
                record.body.unwrap_or_default()
            );

            let mut metadata = Map::new();
            metadata.insert(
                "issue_number".to_string(),
                record.number.unwrap_or(Value::Null),
            );
            metadata.insert(
                "author".to_string(),
                Value::String(record.user.unwrap_or_default().login.unwrap_or_default()),
            );
            metadata.insert(
                "date".to_string(),
                Value::String(record.created_at.unwrap_or_default()),
            );

            Document::new(content, metadata)
        })
        .collect();

    tracing::info!("Loaded {} issues from {:?}", documents.len(), path);
    Ok(documents)
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;

    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON file: {:?}", path))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "commits.json",
            r#"[{"sha":"abc123","commit":{"message":"fix bug","author":{"name":"Dana","date":"2024-01-01"}}}]"#,
        );

        let docs = load_github_commits_json(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "fix bug");
        assert_eq!(
            Value::Object(docs[0].metadata.clone()),
            json!({"sha": "abc123", "author": "Dana", "date": "2024-01-01"})
        );
    }

    #[test]
    fn test_load_commit_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "commits.json", r#"[{"sha":"x","commit":{"author":null}}]"#);

        let docs = load_github_commits_json(&path).unwrap();
        assert_eq!(docs[0].content, "");
        assert_eq!(docs[0].metadata["author"], json!(""));
    }

    #[test]
    fn test_load_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "issues.json",
            r#"[
                {"title":"Crash on start","body":"Steps to reproduce","number":42,
                 "user":{"login":"octo"},"created_at":"2024-02-03T00:00:00Z"},
                {"title":"No body","body":null,"number":43,"user":{"login":"cat"},"created_at":"2024-02-04"}
            ]"#,
        );

        let docs = load_github_issues_json(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Crash on start\n\nSteps to reproduce");
        assert_eq!(
            Value::Object(docs[0].metadata.clone()),
            json!({"issue_number": 42, "author": "octo", "date": "2024-02-03T00:00:00Z"})
        );
        assert_eq!(docs[1].content, "No body\n\n");
    }

    #[test]
    fn test_missing_or_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_github_commits_json(&dir.path().join("none.json")).is_err());

        let path = write(dir.path(), "bad.json", "{not json");
        assert!(load_github_issues_json(&path).is_err());
    }
}

//! 문서 로더 모듈
//!
//! 로컬 폴더의 파일(PDF, TXT, CSV, XLSX, DOCX)과 GitHub 커밋/이슈 JSON을
//! 공통 `Document` (텍스트 + 메타데이터) 형태로 정규화합니다.
//!
//! 파일 하나의 실패(손상, 인코딩 오류 등)는 로그만 남기고 건너뜁니다.
//! 전체 로드를 중단시키지 않습니다.

pub mod office;
pub mod pdf;
pub mod records;
pub mod tabular;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use records::{load_github_commits_json, load_github_issues_json};

// ============================================================================
// Document
// ============================================================================

/// 정규화된 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 본문 텍스트
    pub content: String,
    /// 메타데이터 (source, page, sha, author 등)
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// 메타데이터 없이 생성
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(content, Map::new())
    }
}

/// 파일 경로를 source 메타데이터로
pub(crate) fn source_metadata(path: &Path) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "source".to_string(),
        Value::String(path.display().to_string()),
    );
    metadata
}

// ============================================================================
// Source Kinds
// ============================================================================

/// 지원하는 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 페이지 기반 문서
    Pdf,
    /// 일반 텍스트
    Text,
    /// 구분자 기반 표 (CSV)
    Csv,
    /// 스프레드시트 (XLSX)
    Spreadsheet,
    /// 워드 문서 (DOCX)
    WordDocument,
}

impl SourceKind {
    /// 확장자로 종류 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "txt" => Some(SourceKind::Text),
            "csv" => Some(SourceKind::Csv),
            "xlsx" => Some(SourceKind::Spreadsheet),
            "docx" => Some(SourceKind::WordDocument),
            _ => None,
        }
    }

    /// 파일 경로에서 종류 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 로그용 라벨
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "PDF",
            SourceKind::Text => "TXT",
            SourceKind::Csv => "CSV",
            SourceKind::Spreadsheet => "XLSX",
            SourceKind::WordDocument => "DOCX",
        }
    }
}

// ============================================================================
// Loader Config
// ============================================================================

/// 로더 설정
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: false,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

// ============================================================================
// Directory Loading
// ============================================================================

/// 폴더를 재귀 탐색하여 지원하는 모든 파일을 문서로 로드
///
/// 순회 순서는 파일 이름 정렬로 고정되어 실행마다 같은 순서를 보장합니다.
pub fn load_all_documents(root: &Path, config: &LoaderConfig) -> Result<Vec<Document>> {
    if !root.exists() {
        anyhow::bail!("Directory not found: {:?}", root);
    }
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {:?}", root);
    }

    let files = discover_files(root, config);
    tracing::info!("Found {} supported files under {:?}", files.len(), root);

    let mut documents = Vec::new();

    for (path, kind) in files {
        tracing::debug!("Loading {} file: {:?}", kind.label(), path);

        match load_file(&path, kind) {
            Ok(docs) => {
                tracing::debug!("Loaded {} documents from {:?}", docs.len(), path);
                documents.extend(docs);
            }
            Err(e) => {
                tracing::warn!("Could not load {:?}: {:#}", path, e);
            }
        }
    }

    tracing::info!("Total documents loaded: {}", documents.len());
    Ok(documents)
}

/// 지원 확장자 파일 목록 (정렬된 순회)
fn discover_files(root: &Path, config: &LoaderConfig) -> Vec<(PathBuf, SourceKind)> {
    let walker = WalkBuilder::new(root)
        .hidden(!config.include_hidden)
        .git_ignore(config.respect_gitignore)
        .git_global(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .ignore(config.respect_gitignore)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let Some(kind) = SourceKind::from_path(entry.path()) else {
            continue;
        };

        if config.max_file_size > 0 {
            match entry.metadata() {
                Ok(meta) if meta.len() > config.max_file_size => {
                    tracing::debug!(
                        "Skipping large file: {:?} ({} bytes)",
                        entry.path(),
                        meta.len()
                    );
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to read metadata for {:?}: {}", entry.path(), e);
                    continue;
                }
            }
        }

        files.push((entry.path().to_path_buf(), kind));
    }

    files
}

/// 파일 하나를 문서로 변환
pub fn load_file(path: &Path, kind: SourceKind) -> Result<Vec<Document>> {
    match kind {
        SourceKind::Pdf => pdf::load_pdf(path),
        SourceKind::Text => load_text(path),
        SourceKind::Csv => tabular::load_csv(path),
        SourceKind::Spreadsheet => office::load_xlsx(path),
        SourceKind::WordDocument => office::load_docx(path),
    }
}

/// 텍스트 파일 (UTF-8)
fn load_text(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file: {:?}", path))?;

    Ok(vec![Document::new(text, source_metadata(path))])
}

// ============================================================================
// Corpus
// ============================================================================

/// 인덱스 빌드용 전체 문서 집합 제공자
pub trait Corpus: Send + Sync {
    fn documents(&self) -> Result<Vec<Document>>;
}

/// 파일 폴더 + GitHub 커밋/이슈 JSON으로 구성된 코퍼스
#[derive(Debug, Clone)]
pub struct CorpusSource {
    pub data_dir: PathBuf,
    pub commits_json: PathBuf,
    pub issues_json: PathBuf,
    pub loader: LoaderConfig,
}

impl CorpusSource {
    pub fn from_config(config: &crate::config::RagConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            commits_json: config.commits_json.clone(),
            issues_json: config.issues_json.clone(),
            loader: LoaderConfig {
                max_file_size: config.max_file_size,
                ..Default::default()
            },
        }
    }
}

impl Corpus for CorpusSource {
    /// 파일 문서 + 커밋 + 이슈 (이 순서)
    ///
    /// 커밋/이슈 JSON이 없거나 깨졌으면 문서 집합이 불완전하므로 에러입니다.
    fn documents(&self) -> Result<Vec<Document>> {
        let mut docs = load_all_documents(&self.data_dir, &self.loader)?;
        docs.extend(load_github_commits_json(&self.commits_json)?);
        docs.extend(load_github_issues_json(&self.issues_json)?);

        tracing::info!("Corpus assembled: {} documents", docs.len());
        Ok(docs)
    }
}

impl Corpus for Vec<Document> {
    fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::from_extension("pdf"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_extension("TXT"), Some(SourceKind::Text));
        assert_eq!(SourceKind::from_extension("csv"), Some(SourceKind::Csv));
        assert_eq!(
            SourceKind::from_extension("xlsx"),
            Some(SourceKind::Spreadsheet)
        );
        assert_eq!(
            SourceKind::from_extension("Docx"),
            Some(SourceKind::WordDocument)
        );
        assert_eq!(SourceKind::from_extension("json"), None);
        assert_eq!(SourceKind::from_extension("exe"), None);
    }

    #[test]
    fn test_load_all_documents_deterministic_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "nested").unwrap();
        std::fs::write(dir.path().join("ignored.json"), "[]").unwrap();

        let docs = load_all_documents(dir.path(), &LoaderConfig::default()).unwrap();
        let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "nested"]);

        let source = docs[0].metadata["source"].as_str().unwrap();
        assert!(source.ends_with("a.txt"));

        let again = load_all_documents(dir.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(docs, again);
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "ok").unwrap();
        // 잘못된 UTF-8
        std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        // PDF 확장자지만 내용은 PDF가 아님
        std::fs::write(dir.path().join("fake.pdf"), "not a pdf").unwrap();
        std::fs::write(dir.path().join("fake.docx"), "not a zip").unwrap();

        let docs = load_all_documents(dir.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "ok");
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_all_documents(&dir.path().join("missing"), &LoaderConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_max_file_size_skips_large_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.txt"), "tiny").unwrap();
        std::fs::write(dir.path().join("large.txt"), "x".repeat(100)).unwrap();

        let config = LoaderConfig {
            max_file_size: 10,
            ..Default::default()
        };
        let docs = load_all_documents(dir.path(), &config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "tiny");
    }

    #[test]
    fn test_corpus_source_requires_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "doc").unwrap();

        let corpus = CorpusSource {
            data_dir: dir.path().to_path_buf(),
            commits_json: dir.path().join("missing_commits.json"),
            issues_json: dir.path().join("missing_issues.json"),
            loader: LoaderConfig::default(),
        };
        assert!(corpus.documents().is_err());

        std::fs::write(dir.path().join("commits.json"), "[]").unwrap();
        std::fs::write(dir.path().join("issues.json"), "[]").unwrap();
        let corpus = CorpusSource {
            commits_json: dir.path().join("commits.json"),
            issues_json: dir.path().join("issues.json"),
            ..corpus
        };
        let docs = corpus.documents().unwrap();
        assert_eq!(docs.len(), 1);
    }
}

//! 설정 모듈
//!
//! 기본값 → `minerva.toml` → `MINERVA_*` 환경변수 순으로 병합합니다.
//! 중첩 키는 `__`로 구분합니다 (예: `MINERVA_LLM__MODEL`).
//!
//! API 키/토큰은 설정 파일이 아닌 환경변수에서만 읽습니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 기본 설정 파일 이름
pub const CONFIG_FILE: &str = "minerva.toml";

/// 환경변수 접두사
const ENV_PREFIX: &str = "MINERVA_";

// ============================================================================
// Config Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// 원본 문서 루트 (재귀 탐색)
    pub data_dir: PathBuf,
    /// GitHub 커밋 JSON 경로
    pub commits_json: PathBuf,
    /// GitHub 이슈 JSON 경로
    pub issues_json: PathBuf,
    /// 벡터 인덱스 저장 디렉토리
    pub persist_dir: PathBuf,
    /// 청크 최대 길이 (문자 수)
    pub chunk_size: usize,
    /// 인접 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 기본 검색 결과 수
    pub top_k: usize,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub github: GithubConfig,
}

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// fastembed 로컬 모델
    Fastembed,
    /// 토큰 해싱 (오프라인/테스트용)
    Hash,
}

/// 임베딩 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// 모델 이름 (예: all-MiniLM-L6-v2)
    pub model: String,
    /// 배치 크기
    pub batch_size: usize,
    /// 모델 캐시 디렉토리 (없으면 OS 캐시 디렉토리)
    pub cache_dir: Option<PathBuf>,
    /// hash 프로바이더 차원
    pub hash_dimension: usize,
}

/// LLM 설정 (OpenAI 호환 chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// 생성 호출 타임아웃 (초)
    pub timeout_secs: u64,
}

/// GitHub 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// owner/name
    pub repo: String,
    pub commit_pages: u32,
    pub issue_pages: u32,
    pub per_page: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            commits_json: PathBuf::from("data/json/git_commits.json"),
            issues_json: PathBuf::from("data/json/git_issues.json"),
            persist_dir: PathBuf::from("faiss_store"),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            max_file_size: 50 * 1024 * 1024, // 50MB
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Fastembed,
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 256,
            cache_dir: None,
            hash_dimension: 384,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            model: "openai/gpt-oss-120b".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: "python/cpython".to_string(),
            commit_pages: 20,
            issue_pages: 5,
            per_page: 100,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl RagConfig {
    /// 현재 디렉토리의 `minerva.toml` + 환경변수로 로드
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// 지정 파일 + 환경변수로 로드 (파일이 없으면 기본값 사용)
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load config: {:?}", path))?;
        config.validate()?;

        tracing::debug!("Config loaded: {:?}", config);
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be at least 1");
        }
        Ok(())
    }

    /// 벡터 인덱스 파일 경로
    pub fn index_path(&self) -> PathBuf {
        self.persist_dir.join(crate::knowledge::INDEX_FILE)
    }

    /// 메타데이터 파일 경로
    pub fn metadata_path(&self) -> PathBuf {
        self.persist_dir.join(crate::knowledge::METADATA_FILE)
    }
}

/// 모델 캐시 디렉토리 (~/.cache/minerva-rag/models)
pub fn default_model_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("minerva-rag")
        .join("models")
}

// ============================================================================
// Tests
// ============================================================================

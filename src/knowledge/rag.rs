//! RAG 검색 - 검색 결과를 LLM 요약으로 연결
//!
//! 시작 시 저장소 상태를 확인해 빌드 또는 로드를 결정합니다.
//! - Cold: 인덱스/메타데이터 중 하나라도 없음 → 코퍼스 전체로 새로 빌드
//! - Warm: 둘 다 있음 → 디스크에서 로드
//!
//! 질의: 임베딩 → 검색 → 컨텍스트 조립 → 생성 (타임아웃 적용)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::persist::{INDEX_FILE, METADATA_FILE};
use super::store::VectorStore;
use super::vector::SearchHit;
use crate::config::RagConfig;
use crate::embedding::Embedder;
use crate::llm::TextGenerator;
use crate::loader::{Corpus, CorpusSource};

/// 검색 결과가 비었을 때의 고정 응답
pub const NO_RESULTS_MESSAGE: &str = "No relevant documents found.";

/// 생성 호출 기본 타임아웃
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// StoreState
// ============================================================================

/// 저장소 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// 저장된 인덱스 없음 (빌드 필요)
    Cold,
    /// 인덱스 + 메타데이터 모두 존재 (로드)
    Warm,
}

impl StoreState {
    pub fn from_presence(index_exists: bool, metadata_exists: bool) -> Self {
        if index_exists && metadata_exists {
            StoreState::Warm
        } else {
            StoreState::Cold
        }
    }

    /// 저장 디렉토리의 두 파일 존재 여부로 판단
    pub fn probe(dir: &Path) -> Self {
        Self::from_presence(
            dir.join(INDEX_FILE).is_file(),
            dir.join(METADATA_FILE).is_file(),
        )
    }
}

/// 상태에 따라 저장소를 빌드하거나 로드
pub fn open_store(
    state: StoreState,
    mut store: VectorStore,
    corpus: &dyn Corpus,
) -> Result<VectorStore> {
    match state {
        StoreState::Cold => {
            tracing::info!(
                "No persisted store in {:?}, building from corpus",
                store.persist_dir()
            );
            let documents = corpus.documents().context("Failed to load corpus")?;
            store
                .build_from_documents(&documents)
                .context("Failed to build vector store")?;
        }
        StoreState::Warm => {
            store.load().context("Failed to load vector store")?;
        }
    }
    Ok(store)
}

// ============================================================================
// RagSearch
// ============================================================================

/// 검색 + 요약 오케스트레이터
pub struct RagSearch {
    store: VectorStore,
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl RagSearch {
    /// 상태에 따라 빌드 또는 로드 후 생성
    ///
    /// # Arguments
    /// * `state` - Cold면 `corpus`로 빌드, Warm이면 로드
    /// * `store` - 비어 있는 저장소 (임베더 주입 완료)
    /// * `corpus` - 빌드용 문서 집합 (Warm이면 사용하지 않음)
    /// * `generator` - 요약 생성기
    pub fn open(
        state: StoreState,
        store: VectorStore,
        corpus: &dyn Corpus,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        Ok(Self {
            store: open_store(state, store, corpus)?,
            generator,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        })
    }

    /// 설정으로 저장소/코퍼스를 구성해 생성
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let store = VectorStore::from_config(config, embedder)?;
        let state = StoreState::probe(&config.persist_dir);
        let corpus = CorpusSource::from_config(config);

        Ok(Self::open(state, store, &corpus, generator)?
            .with_timeout(Duration::from_secs(config.llm.timeout_secs)))
    }

    /// 생성 호출 타임아웃 지정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// 검색만 수행 (생성 없음)
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.store.query(query, top_k)?)
    }

    /// 검색 후 요약
    ///
    /// 컨텍스트가 비면 생성기를 호출하지 않고 `NO_RESULTS_MESSAGE` 반환.
    pub async fn search_and_summarize(&self, query: &str, top_k: usize) -> Result<String> {
        let hits = self.retrieve(query, top_k)?;

        let context = assemble_context(&hits);
        if context.is_empty() {
            tracing::info!("No context retrieved for: '{}'", query);
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        let prompt = build_prompt(query, &context);
        tracing::debug!(
            "Sending prompt to {} ({} hits, {} chars)",
            self.generator.name(),
            hits.len(),
            prompt.len()
        );

        tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .with_context(|| format!("Generation timed out after {:?}", self.timeout))?
            .context("Generation failed")
    }
}

// ============================================================================
// Prompt Assembly
// ============================================================================

/// 검색 결과의 `text` 필드를 빈 줄로 연결
fn assemble_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .filter_map(SearchHit::text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Summarize the following context for the query: '{}'\n\nContext:\n{}\n\nSummary:",
        query, context
    )
}

// ============================================================================
// Tests
// ============================================================================

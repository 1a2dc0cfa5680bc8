//! Vector Store - 청킹/임베딩/인덱스/영속화를 묶는 저장소
//!
//! 인덱스와 메타데이터를 변경할 수 있는 유일한 컴포넌트입니다.
//! 추가(append)와 전체 재빌드만 지원하며 수정/삭제는 없습니다.
//!
//! 저장 위치: `<persist_dir>/vectors.index`, `<persist_dir>/metadata.json`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::chunker::{recursive_chunker, ChunkConfig, Chunker};
use super::persist;
use super::vector::{FlatIndex, IndexEntry, Metadata, SearchHit};
use crate::config::RagConfig;
use crate::embedding::{embed_texts, Embedder};
use crate::error::{StoreError, StoreResult};
use crate::loader::Document;

/// 기본 임베딩 배치 크기
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub persist_dir: PathBuf,
}

// ============================================================================
// VectorStore
// ============================================================================

/// 벡터 저장소
///
/// 임베딩 모델은 외부에서 주입받아 청크/쿼리 임베딩에 같이 사용합니다.
pub struct VectorStore {
    persist_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    chunker: Box<dyn Chunker>,
    batch_size: usize,
    /// 첫 추가 시 벡터 차원에 맞춰 생성
    index: Option<FlatIndex>,
}

impl VectorStore {
    /// 저장소 생성 (디렉토리가 없으면 만듭니다)
    pub fn new(
        persist_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        chunk_config: ChunkConfig,
    ) -> Result<Self> {
        let persist_dir = persist_dir.into();
        std::fs::create_dir_all(&persist_dir)
            .with_context(|| format!("Failed to create store directory: {:?}", persist_dir))?;

        Ok(Self {
            persist_dir,
            embedder,
            chunker: recursive_chunker(chunk_config),
            batch_size: DEFAULT_BATCH_SIZE,
            index: None,
        })
    }

    /// 설정의 저장 경로/청크/배치 크기로 생성
    pub fn from_config(config: &RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let chunk_config = ChunkConfig::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self::new(&config.persist_dir, embedder, chunk_config)?
            .with_batch_size(config.embedding.batch_size))
    }

    /// 임베딩 배치 크기 지정
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// 벡터 수 (= 메타데이터 수)
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, FlatIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 인덱스 차원 (아직 생성 전이면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.index.as_ref().map(FlatIndex::dimension)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            vector_count: self.len(),
            dimension: self.dimension().unwrap_or(0),
            persist_dir: self.persist_dir.clone(),
        }
    }

    /// 문서 집합으로 빌드: 청킹 → 임베딩 → 추가 → 저장
    ///
    /// 이미 벡터가 있으면 그 뒤에 추가됩니다.
    /// 추가된 청크 수를 반환합니다.
    pub fn build_from_documents(&mut self, documents: &[Document]) -> Result<usize> {
        tracing::info!(
            "Building vector store from {} raw documents...",
            documents.len()
        );
        if !self.is_empty() {
            tracing::warn!(
                "Store already holds {} vectors; new chunks will be appended",
                self.len()
            );
        }

        let chunks = self.chunker.chunk_documents(documents);
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = embed_texts(self.embedder.as_ref(), &texts, self.batch_size)
            .context("Failed to embed chunks")?;

        let metadatas: Vec<Metadata> = chunks
            .iter()
            .map(|chunk| {
                let mut metadata = chunk.metadata.clone();
                metadata.insert("text".to_string(), Value::String(chunk.content.clone()));
                metadata
            })
            .collect();

        let added = embeddings.len();
        self.add_embeddings(embeddings, Some(metadatas))?;
        self.save()?;

        tracing::info!(
            "Vector store built and saved to {:?} ({} vectors)",
            self.persist_dir,
            self.len()
        );
        Ok(added)
    }

    /// 벡터(+메타데이터) 추가
    ///
    /// - 인덱스가 없으면 첫 벡터 차원으로 생성
    /// - `metadatas`가 있으면 개수가 벡터 수와 같아야 함 (다르면 아무것도 추가하지 않음)
    pub fn add_embeddings(
        &mut self,
        vectors: Vec<Vec<f32>>,
        metadatas: Option<Vec<Metadata>>,
    ) -> StoreResult<()> {
        if let Some(ref metadatas) = metadatas {
            if metadatas.len() != vectors.len() {
                return Err(StoreError::MetadataCountMismatch {
                    vectors: vectors.len(),
                    metadatas: metadatas.len(),
                });
            }
        }

        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Ok(());
        };

        let count = vectors.len();
        let entries: Vec<IndexEntry> = match metadatas {
            Some(metadatas) => vectors
                .into_iter()
                .zip(metadatas)
                .map(|(vector, metadata)| IndexEntry {
                    vector,
                    metadata: Some(metadata),
                })
                .collect(),
            None => vectors
                .into_iter()
                .map(|vector| IndexEntry {
                    vector,
                    metadata: None,
                })
                .collect(),
        };

        match self.index {
            Some(ref mut index) => index.extend(entries)?,
            None => {
                let mut index = FlatIndex::new(dimension);
                index.extend(entries)?;
                self.index = Some(index);
            }
        }

        tracing::info!("Added {} vectors to index (total {})", count, self.len());
        Ok(())
    }

    /// 인덱스 + 메타데이터 저장
    pub fn save(&self) -> StoreResult<()> {
        persist::save_index(&self.persist_dir, self.index.as_ref())?;
        tracing::info!("Saved index and metadata to {:?}", self.persist_dir);
        Ok(())
    }

    /// 저장된 인덱스 + 메타데이터 로드 (현재 내용은 교체)
    pub fn load(&mut self) -> StoreResult<()> {
        let index = persist::load_index(&self.persist_dir)?;

        if let Some(ref index) = index {
            let model_dim = self.embedder.dimension();
            if index.dimension() != model_dim {
                return Err(StoreError::DimensionMismatch {
                    expected: model_dim,
                    actual: index.dimension(),
                });
            }
        }

        self.index = index;
        tracing::info!(
            "Loaded index and metadata from {:?} ({} vectors)",
            self.persist_dir,
            self.len()
        );
        Ok(())
    }

    /// 쿼리 벡터로 최근접 `top_k`개 검색
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
        match self.index {
            Some(ref index) => index.search(query_embedding, top_k),
            None => Ok(Vec::new()),
        }
    }

    /// 텍스트 쿼리: 코퍼스와 같은 모델로 임베딩 후 검색
    pub fn query(&self, query_text: &str, top_k: usize) -> StoreResult<Vec<SearchHit>> {
        tracing::info!("Querying vector store for: '{}'", query_text);
        let query_embedding = self.embedder.embed(query_text)?;
        self.search(&query_embedding, top_k)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 코퍼스 청크와 쿼리는 반드시 같은 모델/같은 차원으로 임베딩해야 합니다.
//! 모델은 프로세스당 한 번만 로드하고 `Arc<dyn Embedder>`로 공유합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = FastEmbedder::new("all-MiniLM-L6-v2", None)?;
//! let vectors = embedder.embed_batch(&["Hello, world!"])?;
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::error::{StoreError, StoreResult};

// ============================================================================
// Embedder Trait
// ============================================================================

/// 임베딩 트레이트
///
/// 같은 입력에 대해 항상 같은 벡터를 반환해야 하며,
/// 출력 순서는 입력 순서와 같아야 합니다.
pub trait Embedder: Send + Sync {
    /// 배치 임베딩
    fn embed_batch(&self, texts: &[&str]) -> StoreResult<Vec<Vec<f32>>>;

    /// 단일 텍스트 임베딩
    fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| StoreError::EmbeddingFailed("empty embedding output".to_string()))
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 이름
    fn name(&self) -> &str;
}

/// 배치 단위로 임베딩 (순서 유지, 개수/차원 검증)
pub fn embed_texts(
    embedder: &dyn Embedder,
    texts: &[&str],
    batch_size: usize,
) -> StoreResult<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let dimension = embedder.dimension();
    let total_batches = texts.len().div_ceil(batch_size);
    let mut vectors = Vec::with_capacity(texts.len());

    tracing::info!(
        "Generating embeddings for {} chunks with {} ({} batches)",
        texts.len(),
        embedder.name(),
        total_batches
    );

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        tracing::debug!("Embedding batch {}/{}", i + 1, total_batches);

        let embeddings = embedder.embed_batch(batch)?;
        if embeddings.len() != batch.len() {
            return Err(StoreError::EmbeddingFailed(format!(
                "model returned {} vectors for {} texts",
                embeddings.len(),
                batch.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        vectors.extend(embeddings);
    }

    Ok(vectors)
}

// ============================================================================
// FastEmbed (로컬 ONNX 모델)
// ============================================================================

/// fastembed 기반 로컬 임베딩
///
/// 기본 모델: all-MiniLM-L6-v2 (384차원)
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedder {
    /// 모델 로드 (최초 실행 시 다운로드)
    ///
    /// 로드 실패는 복구 불가능한 시작 에러입니다.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (model_kind, dimension) = resolve_model(model_name)?;
        let cache_dir = cache_dir.unwrap_or_else(crate::config::default_model_cache_dir);

        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind)
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(false),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| {
            format!(
                "Failed to load embedding model '{}' (cache: {:?})",
                model_name, cache_dir
            )
        })?;

        tracing::info!("Loaded embedding model: {} ({} dims)", model_name, dimension);

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

/// 모델 이름 → fastembed 모델 + 차원
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let resolved = match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            (EmbeddingModel::AllMiniLML6V2, 384)
        }
        "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => {
            (EmbeddingModel::AllMiniLML12V2, 384)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        _ => anyhow::bail!(
            "Unsupported embedding model: {}. \
             Supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5",
            name
        ),
    };
    Ok(resolved)
}

impl Embedder for FastEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> StoreResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();

        self.model
            .lock()
            .map_err(|_| StoreError::EmbeddingFailed("embedding model lock poisoned".to_string()))?
            .embed(owned, None)
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

// ============================================================================
// Hash Embedding (오프라인/테스트)
// ============================================================================

/// 토큰 해싱 임베딩
///
/// 소문자 영숫자 토큰을 SHA-256으로 버킷에 배정해 빈도를 세고 L2 정규화합니다.
/// 모델 다운로드 없이 결정적인 벡터가 필요할 때 사용합니다.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            vector[idx] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> StoreResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProviderKind::Fastembed => {
            Arc::new(FastEmbedder::new(&config.model, config.cache_dir.clone())?)
        }
        EmbeddingProviderKind::Hash => {
            tracing::info!("Using hash embedding (dimension: {})", config.hash_dimension);
            Arc::new(HashEmbedder::new(config.hash_dimension))
        }
    };
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 항상 고정 개수만 돌려주는 잘못된 임베더
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn embed_batch(&self, _texts: &[&str]) -> StoreResult<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 4]])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[test]
    fn test_hash_embedding_deterministic() {
        let embedder = HashEmbedder::new(384);
        let a = embedder.embed("Alice wrote the parser.").unwrap();
        let b = embedder.embed("Alice wrote the parser.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_case_insensitive() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(
            embedder.embed("Parser BUG").unwrap(),
            embedder.embed("parser bug").unwrap()
        );
    }

    #[test]
    fn test_hash_embedding_empty_text() {
        let embedder = HashEmbedder::new(16);
        assert_eq!(embedder.embed("").unwrap(), vec![0.0; 16]);
    }

    #[test]
    fn test_embed_texts_preserves_order_across_batches() {
        let embedder = HashEmbedder::new(128);
        let texts = ["one", "two", "three", "four", "five"];

        let batched = embed_texts(&embedder, &texts, 2).unwrap();
        assert_eq!(batched.len(), 5);
        for (text, vector) in texts.iter().zip(&batched) {
            assert_eq!(vector, &embedder.embed(text).unwrap());
        }
    }

    #[test]
    fn test_embed_texts_rejects_count_mismatch() {
        let result = embed_texts(&ShortEmbedder, &["a", "b"], 8);
        assert!(matches!(result, Err(StoreError::EmbeddingFailed(_))));
    }

    #[test]
    fn test_resolve_model() {
        assert_eq!(resolve_model("all-MiniLM-L6-v2").unwrap().1, 384);
        assert_eq!(resolve_model("bge-base-en-v1.5").unwrap().1, 768);
        assert!(resolve_model("unknown-model").is_err());
    }

    #[test]
    fn test_create_hash_embedder() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderKind::Hash,
            hash_dimension: 32,
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.name(), "hash");
    }
}

//! 에러 타입
//!
//! 벡터 스토어/임베딩 파이프라인에서 호출자가 구분해야 하는 에러들입니다.
//! 그 외 애플리케이션 흐름은 `anyhow::Result`를 사용합니다.

use std::path::PathBuf;

use thiserror::Error;

/// 벡터 스토어 에러
#[derive(Debug, Error)]
pub enum StoreError {
    /// 청킹 파라미터 오류 (0 <= overlap < size 위반)
    #[error("Invalid chunk config: chunk_size={chunk_size}, chunk_overlap={chunk_overlap}")]
    InvalidChunkConfig {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    /// 벡터 차원 불일치
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 벡터 수와 메타데이터 수 불일치 (인덱스 위치 정렬이 깨지는 상황)
    #[error("Metadata count mismatch: {vectors} vectors, {metadatas} metadata records")]
    MetadataCountMismatch { vectors: usize, metadatas: usize },

    /// 저장된 인덱스 파일이 손상되었거나 서로 맞지 않음
    #[error("Index corrupted at {path:?}: {reason}")]
    IndexCorrupted { path: PathBuf, reason: String },

    /// 임베딩 생성 실패
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::MetadataCountMismatch {
            vectors: 3,
            metadatas: 2,
        };
        assert_eq!(
            err.to_string(),
            "Metadata count mismatch: 3 vectors, 2 metadata records"
        );

        let err = StoreError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert!(err.to_string().contains("expected 384"));
    }
}

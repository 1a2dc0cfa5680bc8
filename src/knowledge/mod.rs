//! Knowledge 모듈 - 벡터 검색 지식 저장소
//!
//! - Chunker: 재귀 문자 분할 (문단 → 줄 → 단어 → 문자)
//! - FlatIndex: 전수 비교 유클리드 검색
//! - Persist: 인덱스 바이너리 + 메타데이터 JSON 쌍
//! - VectorStore: 청킹/임베딩/추가/저장/로드/질의
//! - RagSearch: 빌드-또는-로드 + 검색 결과 요약

mod chunker;
mod persist;
mod rag;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    recursive_chunker, Chunk, ChunkConfig, Chunker, RecursiveCharacterSplitter,
    DEFAULT_SEPARATORS,
};
pub use persist::{load_index, read_header, save_index, IndexHeader, INDEX_FILE, METADATA_FILE};
pub use rag::{open_store, RagSearch, StoreState, NO_RESULTS_MESSAGE};
pub use store::{StoreStats, VectorStore, DEFAULT_BATCH_SIZE};
pub use vector::{euclidean_distance, FlatIndex, IndexEntry, Metadata, SearchHit};

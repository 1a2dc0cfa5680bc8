//! minerva-rag - 문서 + GitHub 기록 기반 RAG 어시스턴트
//!
//! 로컬 문서(PDF, TXT, CSV, XLSX, DOCX)와 GitHub 커밋/이슈를 청킹·임베딩해
//! 유클리드 거리 벡터 인덱스에 저장하고, 검색 결과를 LLM으로 요약합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod github;
pub mod knowledge;
pub mod llm;
pub mod loader;

// Re-exports
pub use config::RagConfig;
pub use embedding::{create_embedder, Embedder, FastEmbedder, HashEmbedder};
pub use error::{StoreError, StoreResult};
pub use knowledge::{
    ChunkConfig, Chunker, FlatIndex, RagSearch, RecursiveCharacterSplitter, SearchHit,
    StoreState, VectorStore, NO_RESULTS_MESSAGE,
};
pub use llm::{get_api_key, has_api_key, GroqChat, TextGenerator};
pub use loader::{load_all_documents, Corpus, CorpusSource, Document};

//! Text Chunking Module
//!
//! 재귀 경계 탐색 분할을 제공합니다.
//! 문단(`\n\n`) → 줄(`\n`) → 공백(` `) → 문자 단위 순으로 구분자를 시도하여
//! 의미 경계를 최대한 유지하면서 `chunk_size` 이하의 청크로 나눕니다.
//!
//! 길이는 모두 문자(char) 수 기준입니다.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::loader::Document;

/// 기본 구분자 (우선순위 순)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// `0 <= chunk_overlap < chunk_size` 를 만족해야 합니다.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> StoreResult<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(StoreError::InvalidChunkConfig {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 문서에서 잘라낸 청크 (임베딩/인덱싱 단위)
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    /// 원본 문서 메타데이터 사본
    pub metadata: Map<String, Value>,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 문서 목록을 청크 목록으로 (문서 순서 유지, 메타데이터 복사)
    fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.chunk(&doc.content)
                    .into_iter()
                    .map(move |content| Chunk {
                        content,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect();

        tracing::info!(
            "Split {} documents into {} chunks ({})",
            documents.len(),
            chunks.len(),
            self.name()
        );
        chunks
    }
}

// ============================================================================
// RecursiveCharacterSplitter
// ============================================================================

/// 재귀 문자 분할기
///
/// - 텍스트에 존재하는 가장 우선순위 높은 구분자로 분할
/// - `chunk_size` 이상인 조각만 다음 구분자로 재귀 분할
/// - 작은 조각들은 구분자로 다시 이어붙여 `chunk_size` 이하 창으로 병합
/// - 다음 창은 이전 창 끝의 최대 `chunk_overlap` 문자 분량 조각으로 시작
pub struct RecursiveCharacterSplitter {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// 설정으로 생성 (기본 구분자)
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 기본 설정으로 생성 (1000 / 200)
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // 텍스트에 존재하는 첫 구분자 선택 (빈 문자열은 항상 가능)
        let (separator, rest) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
        {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in splits {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }

            if rest.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, rest));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }

        chunks
    }

    /// 작은 조각들을 창 단위로 병합 (오버랩 유지)
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if !window.is_empty() && total + len + sep_len > size {
                push_trimmed(&mut chunks, &window, separator);

                // 오버랩 분량만 남기고 앞에서부터 제거
                while total > overlap || (total > 0 && total + len + sep_len > size) {
                    let Some((_, front_len)) = window.pop_front() else {
                        break;
                    };
                    total -= front_len + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back((piece, len));
        }

        push_trimmed(&mut chunks, &window, separator);
        chunks
    }
}

impl Chunker for RecursiveCharacterSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        // 이미 충분히 짧으면 원문 그대로 한 청크
        if char_len(text) <= self.config.chunk_size {
            return vec![text.to_string()];
        }

        self.split_recursive(text, &self.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveCharacterSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    if window.is_empty() {
        return;
    }
    let text = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let text = text.trim();
    if !text.is_empty() {
        chunks.push(text.to_string());
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정 지정 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(RecursiveCharacterSplitter::new(config))
}

// ============================================================================
// Tests
// ============================================================================

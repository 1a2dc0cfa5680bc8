//! Flat Vector Index - 전수 비교 최근접 이웃 검색
//!
//! 벡터와 메타데이터를 `IndexEntry` 하나로 묶어 한 `Vec`에 보관합니다.
//! 위치 i의 메타데이터는 항상 위치 i의 벡터를 설명합니다.
//!
//! 거리: 정규화하지 않은 원본 벡터 간 유클리드 거리 (작을수록 유사).
//! 코퍼스가 커지면 이 타입을 근사 인덱스(HNSW, IVF-PQ 등)로 교체하는 것이
//! 첫 번째 확장 지점입니다. `search` 계약은 그대로 유지합니다.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// 청크 메타데이터 레코드 (최소 `text` 필드 포함)
pub type Metadata = Map<String, Value>;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 엔트리 (벡터 + 메타데이터 쌍)
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub metadata: Option<Metadata>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 인덱스 위치 (추가된 순서)
    pub index: usize,
    /// 유클리드 거리 (작을수록 유사)
    pub distance: f32,
    /// 메타데이터 (없으면 None)
    pub metadata: Option<Metadata>,
}

impl SearchHit {
    /// 메타데이터의 `text` 필드
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("text"))
            .and_then(Value::as_str)
    }
}

// ============================================================================
// FlatIndex
// ============================================================================

/// 고정 차원 전수 비교 인덱스
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// 엔트리 추가
    ///
    /// 하나라도 차원이 맞지 않으면 아무것도 추가하지 않습니다.
    pub fn extend(&mut self, entries: Vec<IndexEntry>) -> StoreResult<()> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        self.entries.extend(entries);
        Ok(())
    }

    /// 최근접 `top_k`개 검색 (거리 오름차순, 동일 거리는 위치 순)
    ///
    /// 엔트리가 `top_k`보다 적으면 전부 반환합니다.
    pub fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, euclidean_distance(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(index, distance)| SearchHit {
                index,
                distance,
                metadata: self.entries[index].metadata.clone(),
            })
            .collect())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 유클리드 거리
///
/// 길이가 다르면 짧은 쪽 기준으로 계산합니다 (호출 전에 차원 검증 필요).
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector: Vec<f32>, text: &str) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert("text".to_string(), Value::from(text));
        IndexEntry {
            vector,
            metadata: Some(metadata),
        }
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(euclidean_distance(&[], &[]), 0.0);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatIndex::new(2);
        index
            .extend(vec![
                entry(vec![10.0, 0.0], "far"),
                entry(vec![1.0, 0.0], "near"),
                entry(vec![3.0, 0.0], "middle"),
            ])
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].text(), Some("near"));
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].index, 2);
    }

    #[test]
    fn test_search_returns_all_when_fewer_than_top_k() {
        let mut index = FlatIndex::new(1);
        index
            .extend(vec![entry(vec![5.0], "b"), entry(vec![2.0], "a")])
            .unwrap();

        let hits = index.search(&[0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].index, 1);
    }

    #[test]
    fn test_ties_break_by_position() {
        let mut index = FlatIndex::new(1);
        index
            .extend(vec![entry(vec![1.0], "x"), entry(vec![-1.0], "y")])
            .unwrap();

        let hits = index.search(&[0.0], 2).unwrap();
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
    }

    #[test]
    fn test_dimension_checks() {
        let mut index = FlatIndex::new(3);
        let result = index.extend(vec![
            entry(vec![1.0, 2.0, 3.0], "ok"),
            entry(vec![1.0, 2.0], "bad"),
        ]);
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(index.is_empty());

        assert!(index.search(&[0.0], 1).is_err());
    }

    #[test]
    fn test_hit_without_metadata() {
        let mut index = FlatIndex::new(1);
        index
            .extend(vec![IndexEntry {
                vector: vec![0.0],
                metadata: None,
            }])
            .unwrap();

        let hits = index.search(&[0.0], 1).unwrap();
        assert!(hits[0].metadata.is_none());
        assert!(hits[0].text().is_none());
    }
}

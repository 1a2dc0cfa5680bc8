//! 인덱스 영속화
//!
//! 저장 디렉토리 하나에 두 파일을 한 쌍으로 기록합니다.
//!
//! - `vectors.index`: 리틀엔디언 바이너리
//!   - 헤더 (20 bytes): magic `MVEC`, version(u32), dimension(u32), count(u64)
//!   - 본문: count × dimension 개의 f32
//! - `metadata.json`: 벡터 순서와 같은 JSON 배열 (객체 또는 null)
//!
//! 각 파일은 임시 파일에 쓴 뒤 rename 합니다.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::vector::{FlatIndex, IndexEntry, Metadata};
use crate::error::{StoreError, StoreResult};

/// 벡터 파일 이름
pub const INDEX_FILE: &str = "vectors.index";
/// 메타데이터 파일 이름
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC_BYTES: &[u8; 4] = b"MVEC";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;
const BYTES_PER_F32: usize = 4;

/// 벡터 파일 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub dimension: usize,
    pub count: usize,
}

// ============================================================================
// Save
// ============================================================================

/// 인덱스 저장 (비어 있으면 dimension 0, count 0)
pub fn save_index(dir: &Path, index: Option<&FlatIndex>) -> StoreResult<()> {
    std::fs::create_dir_all(dir)?;

    let (dimension, entries) = match index {
        Some(index) => (index.dimension(), index.entries()),
        None => (0, &[][..]),
    };

    write_atomically(&dir.join(INDEX_FILE), |w| {
        write_vectors(w, dimension, entries)
    })?;

    let metadata: Vec<Option<&Metadata>> = entries.iter().map(|e| e.metadata.as_ref()).collect();
    write_atomically(&dir.join(METADATA_FILE), |w| {
        serde_json::to_writer(&mut *w, &metadata).map_err(std::io::Error::from)
    })?;

    tracing::debug!("Saved {} vectors ({} dims) to {:?}", entries.len(), dimension, dir);
    Ok(())
}

fn write_vectors(w: &mut impl Write, dimension: usize, entries: &[IndexEntry]) -> std::io::Result<()> {
    w.write_all(MAGIC_BYTES)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&(dimension as u32).to_le_bytes())?;
    w.write_all(&(entries.len() as u64).to_le_bytes())?;

    for entry in entries {
        for value in &entry.vector {
            w.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_atomically<F>(path: &Path, write: F) -> StoreResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let tmp_path = tmp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Load
// ============================================================================

/// 인덱스 로드
///
/// 벡터 수와 메타데이터 수가 다르면 `IndexCorrupted`.
/// 벡터가 하나도 없으면 `None`.
pub fn load_index(dir: &Path) -> StoreResult<Option<FlatIndex>> {
    let index_path = dir.join(INDEX_FILE);
    let metadata_path = dir.join(METADATA_FILE);

    let bytes = std::fs::read(&index_path)?;
    let header = parse_header(&index_path, &bytes)?;
    let vectors = parse_vectors(&index_path, header, &bytes[HEADER_SIZE..])?;

    let raw = std::fs::read(&metadata_path)?;
    let metadata: Vec<Option<Metadata>> =
        serde_json::from_slice(&raw).map_err(|e| StoreError::IndexCorrupted {
            path: metadata_path.clone(),
            reason: format!("invalid metadata JSON: {}", e),
        })?;

    if metadata.len() != vectors.len() {
        return Err(StoreError::IndexCorrupted {
            path: dir.to_path_buf(),
            reason: format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                metadata.len()
            ),
        });
    }

    if vectors.is_empty() {
        return Ok(None);
    }

    let mut index = FlatIndex::new(header.dimension);
    index.extend(
        vectors
            .into_iter()
            .zip(metadata)
            .map(|(vector, metadata)| IndexEntry { vector, metadata })
            .collect(),
    )?;

    Ok(Some(index))
}

/// 헤더만 읽기 (상태 확인용)
pub fn read_header(path: &Path) -> StoreResult<IndexHeader> {
    use std::io::Read;

    let mut buf = [0u8; HEADER_SIZE];
    File::open(path)?.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            corrupted(path, "file too small to contain header")
        } else {
            StoreError::Io(e)
        }
    })?;
    parse_header(path, &buf)
}

fn parse_header(path: &Path, bytes: &[u8]) -> StoreResult<IndexHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupted(path, "file too small to contain header"));
    }

    if &bytes[0..4] != MAGIC_BYTES {
        return Err(corrupted(path, "invalid magic bytes"));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(corrupted(
            path,
            &format!("unsupported version {} (expected {})", version, FORMAT_VERSION),
        ));
    }

    let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count) as usize;

    if count > 0 && dimension == 0 {
        return Err(corrupted(path, "non-empty index with zero dimension"));
    }

    Ok(IndexHeader { dimension, count })
}

fn parse_vectors(path: &Path, header: IndexHeader, body: &[u8]) -> StoreResult<Vec<Vec<f32>>> {
    let expected = header
        .count
        .checked_mul(header.dimension)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .ok_or_else(|| corrupted(path, "vector count overflow"))?;

    if body.len() != expected {
        return Err(corrupted(
            path,
            &format!("expected {} bytes of vectors, found {}", expected, body.len()),
        ));
    }

    if header.count == 0 {
        return Ok(Vec::new());
    }

    Ok(body
        .chunks_exact(header.dimension * BYTES_PER_F32)
        .map(|vector| {
            vector
                .chunks_exact(BYTES_PER_F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect())
}

fn corrupted(path: &Path, reason: &str) -> StoreError {
    StoreError::IndexCorrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

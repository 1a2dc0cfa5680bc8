//! CSV 로더
//!
//! 첫 행을 헤더로 보고, 데이터 행 하나당 `헤더: 값` 줄들로 된 문서 하나를 만듭니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::{source_metadata, Document};

/// CSV 파일을 행 단위 문서로 로드
///
/// 메타데이터: source, row (0부터 시작, 헤더 제외)
pub fn load_csv(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CSV file: {:?}", path))?;
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut records = parse_csv(raw)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(vec![]);
    };

    let documents = records
        .enumerate()
        .map(|(row, fields)| {
            let content = header
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    let value = fields.get(i).map(String::as_str).unwrap_or("");
                    format!("{}: {}", key.trim(), value.trim())
                })
                .collect::<Vec<_>>()
                .join("\n");

            let mut metadata = source_metadata(path);
            metadata.insert("row".to_string(), Value::from(row));
            Document::new(content, metadata)
        })
        .collect();

    Ok(documents)
}

/// RFC 4180 파싱 (쌍따옴표 이스케이프, 필드 내 줄바꿈 지원)
fn parse_csv(input: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record.clear();
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        anyhow::bail!("Unterminated quoted field");
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_quotes() {
        let records = parse_csv("a,b\n\"x, y\",\"he said \"\"hi\"\"\"\r\n1,\"multi\nline\"\n").unwrap();
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "he said \"hi\"".to_string()],
                vec!["1".to_string(), "multi\nline".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_csv_skips_blank_lines() {
        let records = parse_csv("a,b\n\n1,2").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_csv_unterminated() {
        assert!(parse_csv("a,\"b\n").is_err());
    }

    #[test]
    fn test_load_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name, team\nAlice, parser\nBob,infra\n").unwrap();

        let docs = load_csv(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "name: Alice\nteam: parser");
        assert_eq!(docs[1].content, "name: Bob\nteam: infra");
        assert_eq!(docs[1].metadata["row"], Value::from(1));
    }

    #[test]
    fn test_load_csv_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "a,b\n").unwrap();
        assert!(load_csv(&path).unwrap().is_empty());
    }
}

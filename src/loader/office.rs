//! Office 문서 추출 모듈 (DOCX, XLSX)
//!
//! 두 형식 모두 ZIP 컨테이너 안의 XML이므로 zip 크레이트로 엔트리를 읽고
//! 필요한 태그만 정규식으로 뽑아냅니다.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use zip::ZipArchive;

use super::{source_metadata, Document};

// ============================================================================
// DOCX
// ============================================================================

/// DOCX 파일을 문서 하나로 로드 (문단은 빈 줄로 구분)
pub fn load_docx(path: &Path) -> Result<Vec<Document>> {
    let mut archive = open_archive(path)?;
    let xml = read_entry(&mut archive, "word/document.xml")
        .with_context(|| format!("Not a word document: {:?}", path))?;

    let text = docx_xml_to_text(&xml);
    Ok(vec![Document::new(text, source_metadata(path))])
}

/// `word/document.xml`에서 본문 텍스트 추출
fn docx_xml_to_text(xml: &str) -> String {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let token_re = TOKEN_RE.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>")
            .expect("valid docx token regex")
    });

    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for cap in token_re.captures_iter(xml) {
        if let Some(text) = cap.get(1) {
            current.push_str(&unescape_xml(text.as_str()));
            continue;
        }

        let token = &cap[0];
        if token.starts_with("<w:tab") {
            current.push('\t');
        } else if token.starts_with("<w:br") {
            current.push('\n');
        } else {
            // </w:p>
            let para = std::mem::take(&mut current);
            if !para.trim().is_empty() {
                paragraphs.push(para);
            }
        }
    }

    if !current.trim().is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

// ============================================================================
// XLSX
// ============================================================================

/// XLSX 파일을 문서 하나로 로드
///
/// 시트마다 시트 이름 줄 + 행 단위 텍스트(셀은 탭 구분)를 만듭니다.
pub fn load_xlsx(path: &Path) -> Result<Vec<Document>> {
    let mut archive = open_archive(path)?;

    let shared_strings = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse_shared_strings(&xml),
        Err(_) => Vec::new(), // 문자열 셀이 없는 통합문서
    };

    let sheet_names = read_entry(&mut archive, "xl/workbook.xml")
        .map(|xml| parse_sheet_names(&xml))
        .unwrap_or_default();

    let mut sheet_entries: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| sheet_number(name).map(|n| (n, name.to_string())))
        .collect();
    sheet_entries.sort();

    if sheet_entries.is_empty() {
        anyhow::bail!("No worksheets found in {:?}", path);
    }

    let mut sections = Vec::with_capacity(sheet_entries.len());

    for (i, (number, entry)) in sheet_entries.iter().enumerate() {
        let xml = read_entry(&mut archive, entry)?;
        let rows = sheet_xml_to_rows(&xml, &shared_strings);
        if rows.is_empty() {
            continue;
        }

        let name = sheet_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", number));
        sections.push(format!("{}\n{}", name, rows.join("\n")));
    }

    Ok(vec![Document::new(
        sections.join("\n\n"),
        source_metadata(path),
    )])
}

/// `xl/worksheets/sheetN.xml` → N
fn sheet_number(entry: &str) -> Option<u32> {
    entry
        .strip_prefix("xl/worksheets/sheet")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// 공유 문자열 테이블 (`<si>` 순서대로)
fn parse_shared_strings(xml: &str) -> Vec<String> {
    static SI_RE: OnceLock<Regex> = OnceLock::new();
    let si_re = SI_RE.get_or_init(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("valid si regex"));

    si_re
        .captures_iter(xml)
        .map(|cap| collect_text_runs(&cap[1]))
        .collect()
}

fn parse_sheet_names(xml: &str) -> Vec<String> {
    static SHEET_RE: OnceLock<Regex> = OnceLock::new();
    let sheet_re = SHEET_RE
        .get_or_init(|| Regex::new(r#"<sheet\b[^>]*?\bname="([^"]*)""#).expect("valid sheet regex"));

    sheet_re
        .captures_iter(xml)
        .map(|cap| unescape_xml(&cap[1]))
        .collect()
}

/// 시트 XML → 행 문자열 목록
fn sheet_xml_to_rows(xml: &str, shared_strings: &[String]) -> Vec<String> {
    static ROW_RE: OnceLock<Regex> = OnceLock::new();
    static CELL_RE: OnceLock<Regex> = OnceLock::new();
    static VALUE_RE: OnceLock<Regex> = OnceLock::new();

    let row_re =
        ROW_RE.get_or_init(|| Regex::new(r"(?s)<row\b[^>]*>(.*?)</row>").expect("valid row regex"));
    let cell_re = CELL_RE.get_or_init(|| {
        Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("valid cell regex")
    });
    let value_re =
        VALUE_RE.get_or_init(|| Regex::new(r"<v>([^<]*)</v>").expect("valid value regex"));

    let mut rows = Vec::new();

    for row in row_re.captures_iter(xml) {
        let mut cells = Vec::new();

        for cell in cell_re.captures_iter(&row[1]) {
            let attrs = cell.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = cell.get(2).map(|m| m.as_str()).unwrap_or("");

            let value = if attrs.contains(r#"t="s""#) {
                value_re
                    .captures(body)
                    .and_then(|v| v[1].trim().parse::<usize>().ok())
                    .and_then(|idx| shared_strings.get(idx).cloned())
                    .unwrap_or_default()
            } else if attrs.contains(r#"t="inlineStr""#) {
                collect_text_runs(body)
            } else {
                value_re
                    .captures(body)
                    .map(|v| unescape_xml(&v[1]))
                    .unwrap_or_default()
            };

            cells.push(value);
        }

        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        if !cells.is_empty() {
            rows.push(cells.join("\t"));
        }
    }

    rows
}

/// `<t>` 런들을 이어붙인 텍스트
fn collect_text_runs(xml: &str) -> String {
    static T_RE: OnceLock<Regex> = OnceLock::new();
    let t_re =
        T_RE.get_or_init(|| Regex::new(r"<t(?:\s[^>]*)?>([^<]*)</t>").expect("valid text regex"));

    t_re.captures_iter(xml)
        .map(|cap| unescape_xml(&cap[1]))
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    ZipArchive::new(file).with_context(|| format!("Not a valid office archive: {:?}", path))
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("Missing archive entry: {}", name))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .with_context(|| format!("Failed to read archive entry: {}", name))?;
    Ok(xml)
}

/// XML 엔티티 해제
fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp; b"), "a & b");
        assert_eq!(unescape_xml("&lt;tag&gt; &#65;&#x42;"), "<tag> AB");
        assert_eq!(unescape_xml("AT&T"), "AT&T");
        assert_eq!(unescape_xml("&unknown; x"), "&unknown; x");
    }

    #[test]
    fn test_docx_xml_to_text() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
              <w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p></w:p>
            <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
        </w:body></w:document>"#;

        assert_eq!(docx_xml_to_text(xml), "Hello world\n\nA\tB & C");
    }

    #[test]
    fn test_load_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                "<w:document><w:body><w:p><w:r><w:t>Quarterly report</w:t></w:r></w:p></w:body></w:document>",
            )],
        );

        let docs = load_docx(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Quarterly report");
        assert!(docs[0].metadata["source"]
            .as_str()
            .unwrap()
            .ends_with("report.docx"));
    }

    #[test]
    fn test_load_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.xlsx");
        write_zip(
            &path,
            &[
                (
                    "xl/workbook.xml",
                    r#"<workbook><sheets><sheet name="Members" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                ),
                (
                    "xl/sharedStrings.xml",
                    r#"<sst><si><t>Name</t></si><si><t>Role</t></si><si><r><t>Ali</t></r><r><t>ce</t></r></si></sst>"#,
                ),
                (
                    "xl/worksheets/sheet1.xml",
                    r#"<worksheet><sheetData>
                        <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
                        <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>42</v></c><c r="C2"/></row>
                        <row r="3"><c r="A3" t="inlineStr"><is><t>Bob</t></is></c></row>
                    </sheetData></worksheet>"#,
                ),
            ],
        );

        let docs = load_xlsx(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Members\nName\tRole\nAlice\t42\nBob");
    }

    #[test]
    fn test_sheet_number() {
        assert_eq!(sheet_number("xl/worksheets/sheet1.xml"), Some(1));
        assert_eq!(sheet_number("xl/worksheets/sheet12.xml"), Some(12));
        assert_eq!(sheet_number("xl/worksheets/_rels/sheet1.xml.rels"), None);
    }
}

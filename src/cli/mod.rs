//! CLI 모듈
//!
//! minerva-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};

use crate::config::RagConfig;
use crate::embedding::create_embedder;
use crate::github::{save_json, GithubClient};
use crate::knowledge::{open_store, read_header, RagSearch, StoreState, VectorStore};
use crate::llm::{has_api_key, GroqChat, TextGenerator, API_KEY_ENV};
use crate::loader::CorpusSource;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "minerva-rag")]
#[command(version, about = "문서 + GitHub 기록 기반 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ./minerva.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 코퍼스 전체로 인덱스를 새로 빌드
    Build,

    /// 질문에 대해 검색 후 요약 답변
    Ask {
        /// 질문
        query: String,

        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 검색 결과만 출력 (LLM 호출 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 상태 확인
    Status,

    /// GitHub 커밋/이슈 JSON 다운로드
    Fetch {
        /// owner/name (기본: 설정값)
        #[arg(short, long)]
        repo: Option<String>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => RagConfig::load_from(path)?,
        None => RagConfig::load()?,
    };

    match cli.command {
        Commands::Build => cmd_build(config).await,
        Commands::Ask { query, top_k } => {
            let top_k = top_k.unwrap_or(config.top_k);
            cmd_ask(config, &query, top_k).await
        }
        Commands::Search { query, top_k } => {
            let top_k = top_k.unwrap_or(config.top_k);
            cmd_search(config, &query, top_k).await
        }
        Commands::Status => cmd_status(&config),
        Commands::Fetch { repo } => cmd_fetch(config, repo).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 빌드 명령어 (build)
///
/// 기존 저장 파일과 관계없이 코퍼스 전체를 다시 임베딩해 덮어씁니다.
async fn cmd_build(config: RagConfig) -> Result<()> {
    println!("[*] 인덱스 빌드 중: {}", config.persist_dir.display());

    let store = init_store(config, Some(StoreState::Cold)).await?;

    println!(
        "[OK] 빌드 완료: {} 벡터 ({} 차원)",
        store.len(),
        store.dimension().unwrap_or(0)
    );
    Ok(())
}

/// 질문 명령어 (ask)
///
/// 저장소가 없으면 먼저 빌드하고, 검색 결과를 LLM으로 요약합니다.
async fn cmd_ask(config: RagConfig, query: &str, top_k: usize) -> Result<()> {
    let generator: Arc<dyn TextGenerator> = Arc::new(GroqChat::from_env(&config.llm)?);

    let rag = match tokio::task::spawn_blocking(move || -> Result<RagSearch> {
        let embedder = create_embedder(&config.embedding)?;
        RagSearch::from_config(&config, embedder, generator)
    })
    .await
    .context("Initialization task panicked")?
    {
        Ok(rag) => rag,
        Err(e) => {
            println!("[!] 검색 시스템이 준비되지 않았습니다: {:#}", e);
            return Err(e);
        }
    };

    println!("[*] 질문: \"{}\"", query);

    match rag.search_and_summarize(query, top_k).await {
        Ok(answer) => {
            println!();
            println!("{}", answer);
            Ok(())
        }
        Err(e) => {
            println!("[!] \"{}\" 처리 중 오류: {:#}", query, e);
            Err(e)
        }
    }
}

/// 검색 명령어 (search)
async fn cmd_search(config: RagConfig, query: &str, top_k: usize) -> Result<()> {
    let state = StoreState::probe(&config.persist_dir);
    let store = match init_store(config, Some(state)).await {
        Ok(store) => store,
        Err(e) => {
            println!("[!] 검색 시스템이 준비되지 않았습니다: {:#}", e);
            return Err(e);
        }
    };

    println!("[*] 검색 중: \"{}\"", query);

    let hits = match store.query(query, top_k) {
        Ok(hits) => hits,
        Err(e) => {
            println!("[!] \"{}\" 검색 중 오류: {}", query, e);
            return Err(e.into());
        }
    };

    if hits.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [거리: {:.4}] #{}", i + 1, hit.distance, hit.index);

        if let Some(source) = hit
            .metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(|v| v.as_str())
        {
            println!("   출처: {}", source);
        }

        match hit.text() {
            Some(text) => println!("   내용: {}", truncate_text(text, 200)),
            None => println!("   내용: -"),
        }

        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("minerva-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 문서 디렉토리: {}", config.data_dir.display());
    print_file_status("커밋 JSON", &config.commits_json);
    print_file_status("이슈 JSON", &config.issues_json);

    println!("[*] 저장 디렉토리: {}", config.persist_dir.display());
    match StoreState::probe(&config.persist_dir) {
        StoreState::Warm => match read_header(&config.index_path()) {
            Ok(header) => {
                println!(
                    "[OK] 벡터 인덱스: {} 벡터 ({} 차원)",
                    header.count, header.dimension
                );
                print_file_status("인덱스", &config.index_path());
                print_file_status("메타데이터", &config.metadata_path());
            }
            Err(e) => println!("[!] 벡터 인덱스 읽기 실패: {}", e),
        },
        StoreState::Cold => {
            println!("[!] 벡터 인덱스: 없음 (첫 질문 또는 build 시 생성)");
        }
    }

    println!(
        "[*] 임베딩: {:?} / {}",
        config.embedding.provider, config.embedding.model
    );
    println!("[*] LLM: {} @ {}", config.llm.model, config.llm.endpoint);

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export {}=your-key", API_KEY_ENV);
    }

    Ok(())
}

/// 다운로드 명령어 (fetch)
async fn cmd_fetch(config: RagConfig, repo: Option<String>) -> Result<()> {
    let mut github = config.github.clone();
    if let Some(repo) = repo {
        github.repo = repo;
    }

    let client = GithubClient::from_config(&github)?;

    println!("[*] 커밋 다운로드 중: {}", github.repo);
    let commits = client.fetch_commits(github.commit_pages).await?;
    save_json(&config.commits_json, &commits)?;
    println!("[OK] 커밋 {} 건 저장: {}", commits.len(), config.commits_json.display());

    println!("[*] 이슈 다운로드 중: {}", github.repo);
    let issues = client.fetch_issues(github.issue_pages).await?;
    save_json(&config.issues_json, &issues)?;
    println!("[OK] 이슈 {} 건 저장: {}", issues.len(), config.issues_json.display());

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 임베딩 모델 로드 + 저장소 빌드/로드 (블로킹 작업을 별도 스레드에서 실행)
async fn init_store(config: RagConfig, state: Option<StoreState>) -> Result<VectorStore> {
    tokio::task::spawn_blocking(move || {
        let embedder = create_embedder(&config.embedding)?;
        let store = VectorStore::from_config(&config, embedder)?;
        let state = state.unwrap_or_else(|| StoreState::probe(&config.persist_dir));
        open_store(state, store, &CorpusSource::from_config(&config))
    })
    .await
    .context("Initialization task panicked")?
}

/// 파일 존재 여부 + 크기 + 수정 시각 출력
fn print_file_status(label: &str, path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|_| "-".to_string());
            println!(
                "[OK] {}: {} ({}, {})",
                label,
                path.display(),
                format_bytes(meta.len() as usize),
                modified
            );
        }
        Err(_) => println!("[!] {}: 없음 ({})", label, path.display()),
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProviderKind;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["minerva-rag", "ask", "who wrote the parser", "-k", "3"])
            .unwrap();
        match cli.command {
            Commands::Ask { query, top_k } => {
                assert_eq!(query, "who wrote the parser");
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected ask"),
        }

        let cli =
            Cli::try_parse_from(["minerva-rag", "status", "--config", "other.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[tokio::test]
    async fn test_init_store_builds_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(data_dir.join("json")).unwrap();
        std::fs::write(data_dir.join("notes.txt"), "Alice wrote the parser.").unwrap();
        std::fs::write(
            data_dir.join("json").join("git_commits.json"),
            r#"[{"sha":"abc","commit":{"message":"Fix parser bug","author":{"name":"Bob","date":"2024-01-01T00:00:00Z"}}}]"#,
        )
        .unwrap();
        std::fs::write(data_dir.join("json").join("git_issues.json"), "[]").unwrap();

        let mut config = RagConfig {
            data_dir: data_dir.clone(),
            commits_json: data_dir.join("json").join("git_commits.json"),
            issues_json: data_dir.join("json").join("git_issues.json"),
            persist_dir: dir.path().join("store"),
            ..Default::default()
        };
        config.embedding.provider = EmbeddingProviderKind::Hash;

        let built = init_store(config.clone(), None).await.unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(StoreState::probe(&config.persist_dir), StoreState::Warm);

        let loaded = init_store(config, None).await.unwrap();
        assert_eq!(loaded.len(), 2);
    }
}

//! CLI 모듈
//!
//! edubot-rag CLI 명령어 정의 및 구현.
//! 질의/생성 명령은 API 키가 없어도 동작하며, 그 경우 답변 자리에
//! 키 설정 안내 문구가 들어갑니다. 시맨틱 인덱싱(index/search --semantic)만
//! 임베딩 때문에 키가 필수입니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::corpus::{
    get_data_dir, Category, FileType, MaterialStore, NewMaterial, NewTopic, SemanticRetriever,
};
use crate::llm::has_api_key;
use crate::rag::{MaterialKind, RagService};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "edubot-rag")]
#[command(version, about = "교육 자료 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문에 답변 (자료 출처 인용)
    Ask {
        /// 질문
        query: String,

        /// 방글라(বাংলা) 설명 모드
        #[arg(long)]
        bangla: bool,
    },

    /// 학습 자료 생성 (note/code/slide)
    Generate {
        /// 주제
        topic: String,

        /// 자료 종류: note, code, slide
        #[arg(short, long, default_value = "note")]
        kind: String,
    },

    /// 퀴즈 생성 (5문항)
    Quiz {
        /// 주제
        topic: String,
    },

    /// 플래시카드 생성 (6장)
    Flashcards {
        /// 주제 문자열
        #[arg(short, long)]
        topic: Option<String>,

        /// 저장된 토픽 ID (이름을 주제로 사용)
        #[arg(long)]
        topic_id: Option<i64>,
    },

    /// 영상 스크립트/스토리보드 생성
    Video {
        /// 주제
        topic: String,
    },

    /// 자료 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// 시맨틱 검색 사용 (기본: 키워드 검색)
        #[arg(long)]
        semantic: bool,
    },

    /// 자료 추가
    Add {
        /// 제목
        #[arg(short, long)]
        title: String,

        /// 설명
        #[arg(short, long, default_value = "")]
        description: String,

        /// 본문 텍스트 (직접 입력)
        #[arg(long)]
        content: Option<String>,

        /// 본문 텍스트 파일 경로 (추출된 텍스트)
        #[arg(long)]
        file: Option<PathBuf>,

        /// 분류: theory, lab
        #[arg(long, default_value = "theory")]
        category: String,

        /// 파일 유형: slide, pdf, code, note, other
        #[arg(long, default_value = "other")]
        file_type: String,

        /// 토픽 ID
        #[arg(long)]
        topic_id: Option<i64>,

        /// 주차
        #[arg(long)]
        week: Option<u32>,

        /// 쉼표 구분 태그
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// 토픽 추가
    AddTopic {
        /// 토픽 이름
        name: String,

        /// 설명
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// 자료 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// 분류 필터: theory, lab
        #[arg(long)]
        category: Option<String>,
    },

    /// 토픽 목록
    Topics,

    /// 자료 삭제
    Delete {
        /// 삭제할 자료 ID
        id: i64,
    },

    /// 시맨틱 인덱스 재구축
    Index {
        /// 기존 인덱스 비우고 시작
        #[arg(long)]
        clear: bool,

        /// 배치 크기
        #[arg(long, default_value = "50")]
        batch_size: usize,
    },

    /// 샘플 토픽/자료 삽입
    Seed,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask { query, bangla } => cmd_ask(&query, bangla).await,
        Commands::Generate { topic, kind } => cmd_generate(&topic, &kind).await,
        Commands::Quiz { topic } => cmd_quiz(&topic).await,
        Commands::Flashcards { topic, topic_id } => cmd_flashcards(topic, topic_id).await,
        Commands::Video { topic } => cmd_video(&topic).await,
        Commands::Search {
            query,
            limit,
            semantic,
        } => cmd_search(&query, limit, semantic).await,
        Commands::Add {
            title,
            description,
            content,
            file,
            category,
            file_type,
            topic_id,
            week,
            tags,
        } => cmd_add(
            title,
            description,
            content,
            file,
            &category,
            &file_type,
            topic_id,
            week,
            tags,
        ),
        Commands::AddTopic { name, description } => cmd_add_topic(name, description),
        Commands::List { limit, category } => cmd_list(limit, category.as_deref()),
        Commands::Topics => cmd_topics(),
        Commands::Delete { id } => cmd_delete(id).await,
        Commands::Index { clear, batch_size } => cmd_index(clear, batch_size).await,
        Commands::Seed => cmd_seed(),
        Commands::Status => cmd_status().await,
    }
}

fn open_service() -> Result<RagService> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;
    RagService::from_env(store).context("Failed to create RAG service")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 답변 명령어 (ask)
async fn cmd_ask(query: &str, bangla: bool) -> Result<()> {
    let service = open_service()?;

    println!("[*] Asking: \"{}\"", query);

    if bangla {
        let answer = service.answer_in_bangla(query).await?;
        println!("\n{}", answer);
        return Ok(());
    }

    let result = service.answer(query).await?;

    println!("\n{}", result.answer);

    if !result.sources.is_empty() {
        println!("\nSources:");
        for (i, src) in result.sources.iter().enumerate() {
            println!(
                "  {}. [{}] {} (#{})",
                i + 1,
                src.file_type.as_str(),
                src.title,
                src.id
            );
        }
    }

    Ok(())
}

/// 학습 자료 생성 명령어 (generate)
async fn cmd_generate(topic: &str, kind: &str) -> Result<()> {
    let kind = MaterialKind::parse(kind)
        .ok_or_else(|| anyhow::anyhow!("Unknown material kind '{}'. Use note, code, or slide.", kind))?;

    let service = open_service()?;

    println!("[*] Generating {:?} material for: \"{}\"", kind, topic);

    let result = service.generate_material(topic, kind).await?;

    println!("\n{}", result.content);

    if let Some(validation) = result.validation {
        if validation.valid {
            println!("\n[OK] Syntax check passed");
        } else {
            println!("\n[!] Syntax check failed:");
            for error in validation.errors {
                println!("    {}", error);
            }
        }
    }

    Ok(())
}

/// 퀴즈 생성 명령어 (quiz)
async fn cmd_quiz(topic: &str) -> Result<()> {
    let service = open_service()?;

    println!("[*] Generating quiz for: \"{}\"", topic);

    let items = service.generate_quiz(topic).await?;

    if items.is_empty() {
        println!("[!] No quiz generated (AI unavailable or returned malformed output).");
        return Ok(());
    }

    println!("\n[OK] Quiz ({} questions):\n", items.len());

    for (i, item) in items.iter().enumerate() {
        println!("Q{}. {}", i + 1, item.question);
        for (j, option) in item.options.iter().enumerate() {
            let label = (b'A' + j as u8) as char;
            println!("   {}. {}", label, option);
        }
        println!("   Answer: {}", item.answer);
        println!("   Why: {}", item.explanation);
        println!();
    }

    Ok(())
}

/// 플래시카드 생성 명령어 (flashcards)
async fn cmd_flashcards(topic: Option<String>, topic_id: Option<i64>) -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;

    let topic_name = if let Some(id) = topic_id {
        let topic = store
            .get_topic(id)?
            .ok_or_else(|| anyhow::anyhow!("Topic #{} not found", id))?;
        topic.name
    } else if let Some(name) = topic {
        name
    } else {
        bail!("Specify --topic or --topic-id");
    };

    let service = RagService::from_env(store).context("Failed to create RAG service")?;

    println!("[*] Generating flashcards for: \"{}\"", topic_name);

    let cards = service.generate_flashcards(&topic_name).await?;

    if cards.is_empty() {
        println!("[!] No flashcards generated (AI unavailable or returned malformed output).");
        return Ok(());
    }

    println!("\n[OK] Flashcards ({} cards):\n", cards.len());

    for (i, card) in cards.iter().enumerate() {
        println!("{}. Front: {}", i + 1, card.front);
        println!("   Back:  {}", card.back);
        println!();
    }

    Ok(())
}

/// 영상 스크립트 생성 명령어 (video)
async fn cmd_video(topic: &str) -> Result<()> {
    let service = open_service()?;

    println!("[*] Generating video script for: \"{}\"", topic);

    let script = service.generate_video_script(topic).await?;

    println!("\nTitle:    {}", script.title);
    println!("Duration: {}", script.duration);

    for scene in &script.scenes {
        println!();
        println!("[{}]", scene.time);
        println!("  Visual: {}", scene.visual);
        println!("  Audio:  {}", scene.audio);
    }

    if let Some(error) = script.error {
        println!("\n[!] {}", error);
    }

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(query: &str, limit: usize, semantic: bool) -> Result<()> {
    println!("[*] Searching: \"{}\"", query);

    if semantic {
        return cmd_search_semantic(query, limit).await;
    }

    let service = open_service()?;
    let results = service.search(query).await.context("Search failed")?;

    if results.is_empty() {
        println!("\n[!] No matching materials.");
        return Ok(());
    }

    println!("\n[OK] Results ({} materials):\n", results.len());

    for (i, mat) in results.iter().take(limit).enumerate() {
        println!(
            "{}. [{}] [{}] {}",
            i + 1,
            mat.file_type.as_str(),
            mat.category.as_str(),
            mat.title
        );
        println!("   {}", truncate_text(mat.content(), 120));
        println!();
    }

    Ok(())
}

/// 시맨틱 검색 (search --semantic)
async fn cmd_search_semantic(query: &str, limit: usize) -> Result<()> {
    if !has_api_key() {
        bail!(
            "Semantic search requires an API key.\n\
             Set: export GEMINI_API_KEY=your-key"
        );
    }

    let store = MaterialStore::open_default().context("Failed to open material store")?;
    let retriever = SemanticRetriever::open_default(store)
        .await
        .context("Failed to open semantic retriever")?;

    let hits = retriever.search(query, limit, None).await?;

    if hits.is_empty() {
        println!("\n[!] No results. Run `edubot-rag index` first.");
        return Ok(());
    }

    println!("\n[OK] Results ({} hits):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{}] [distance: {:.4}] {} (#{})",
            i + 1,
            hit.file_type,
            hit.distance,
            hit.title,
            hit.material_id
        );
        println!("   Topic: {}", hit.topic_name);
        println!("   {}", truncate_text(&hit.text, 120));
        println!();
    }

    Ok(())
}

/// 자료 추가 명령어 (add)
#[allow(clippy::too_many_arguments)]
fn cmd_add(
    title: String,
    description: String,
    content: Option<String>,
    file: Option<PathBuf>,
    category: &str,
    file_type: &str,
    topic_id: Option<i64>,
    week: Option<u32>,
    tags: String,
) -> Result<()> {
    let category = Category::parse(category)
        .ok_or_else(|| anyhow::anyhow!("Unknown category '{}'. Use theory or lab.", category))?;
    let file_type = FileType::parse(file_type).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown file type '{}'. Use slide, pdf, code, note, or other.",
            file_type
        )
    })?;

    let text_content = if let Some(text) = content {
        text
    } else if let Some(ref path) = file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {:?}", path))?
    } else {
        String::new()
    };

    if text_content.trim().is_empty() && description.trim().is_empty() {
        bail!("Provide --content, --file, or at least a --description");
    }

    let store = MaterialStore::open_default().context("Failed to open material store")?;

    if let Some(id) = topic_id {
        if store.get_topic(id)?.is_none() {
            bail!("Topic #{} not found", id);
        }
    }

    let id = store.add_material(NewMaterial {
        title: title.clone(),
        description,
        text_content,
        category,
        file_type,
        topic_id,
        week,
        tags,
    })?;

    println!("[OK] Material added (ID: {})", id);
    println!("     Title: {}", title);
    println!("     Run `edubot-rag index` to refresh the semantic index.");

    Ok(())
}

/// 토픽 추가 명령어 (add-topic)
fn cmd_add_topic(name: String, description: String) -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;

    let id = store.add_topic(NewTopic {
        name: name.clone(),
        description,
    })?;

    println!("[OK] Topic added (ID: {})", id);
    println!("     Name: {}", name);

    Ok(())
}

/// 자료 목록 명령어 (list)
fn cmd_list(limit: usize, category: Option<&str>) -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;

    let category = match category {
        Some(s) => Some(
            Category::parse(s)
                .ok_or_else(|| anyhow::anyhow!("Unknown category '{}'. Use theory or lab.", s))?,
        ),
        None => None,
    };

    let materials = store.list_materials(limit, category)?;

    if materials.is_empty() {
        println!("[!] No materials stored.");
        return Ok(());
    }

    println!("[OK] Materials ({} entries):\n", materials.len());

    for mat in materials {
        let week = mat
            .week
            .map(|w| format!("week {}", w))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  #{:<4} [{}] [{}] {}",
            mat.id,
            mat.category.as_str(),
            mat.file_type.as_str(),
            truncate_text(&mat.title, 40)
        );
        println!(
            "        {} | {} | {} chars",
            week,
            mat.created_at.format("%Y-%m-%d %H:%M"),
            mat.content().len()
        );
        println!();
    }

    Ok(())
}

/// 토픽 목록 명령어 (topics)
fn cmd_topics() -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;
    let topics = store.list_topics()?;

    if topics.is_empty() {
        println!("[!] No topics stored.");
        return Ok(());
    }

    println!("[OK] Topics ({} entries):\n", topics.len());

    for topic in topics {
        println!("  #{:<4} {}", topic.id, topic.name);
        if !topic.description.is_empty() {
            println!("        {}", truncate_text(&topic.description, 80));
        }
    }

    Ok(())
}

/// 자료 삭제 명령어 (delete)
async fn cmd_delete(id: i64) -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;

    if store.get_material(id)?.is_none() {
        bail!("Material #{} not found", id);
    }

    store.delete_material(id)?;
    println!("[OK] Material #{} deleted", id);

    // 인덱스 엔트리도 정리 (키가 없으면 건너뜀)
    if has_api_key() {
        match SemanticRetriever::open_default(store).await {
            Ok(retriever) => {
                if let Err(e) = retriever.remove(id).await {
                    tracing::debug!("Failed to remove vector entry: {}", e);
                }
            }
            Err(e) => tracing::debug!("Semantic retriever unavailable: {}", e),
        }
    } else {
        println!("     (semantic index entry not removed - no API key)");
    }

    Ok(())
}

/// 인덱스 재구축 명령어 (index)
async fn cmd_index(clear: bool, batch_size: usize) -> Result<()> {
    if !has_api_key() {
        bail!(
            "Indexing requires an API key for embeddings.\n\
             Set: export GEMINI_API_KEY=your-key"
        );
    }

    let store = MaterialStore::open_default().context("Failed to open material store")?;
    let retriever = SemanticRetriever::open_default(store)
        .await
        .context("Failed to open semantic retriever")?;

    if clear {
        println!("[*] Clearing existing index...");
    }
    println!("[*] Indexing materials (batch size {})...", batch_size);

    let indexed = retriever.index_all(clear, batch_size).await?;

    if indexed == 0 {
        println!("[!] No materials to index.");
        return Ok(());
    }

    let stats = retriever.stats().await?;

    println!("[OK] Indexed {} materials", indexed);
    println!("     Total entries:  {}", stats.count);
    println!("     Embedding model: {}", stats.model_name);
    println!("     Dimension:       {}", stats.dimension);

    Ok(())
}

/// 샘플 데이터 삽입 명령어 (seed)
fn cmd_seed() -> Result<()> {
    let store = MaterialStore::open_default().context("Failed to open material store")?;

    if store.stats()?.material_count > 0 {
        println!("[!] Store already has materials, seeding skipped.");
        return Ok(());
    }

    let ds = store.add_topic(NewTopic {
        name: "Data Structures".to_string(),
        description: "Fundamental data structures like arrays, lists, trees, and graphs."
            .to_string(),
    })?;
    let algo = store.add_topic(NewTopic {
        name: "Algorithms".to_string(),
        description: "Sorting, searching, and dynamic programming.".to_string(),
    })?;
    let net = store.add_topic(NewTopic {
        name: "Networking".to_string(),
        description: "OSI layers, protocols, and routing.".to_string(),
    })?;

    store.add_material(NewMaterial {
        title: "Introduction to Linked Lists".to_string(),
        description: "A comprehensive guide to singly and doubly linked lists.".to_string(),
        text_content: "# Linked Lists\n\nLinked lists are linear data structures where \
                       elements are stored in nodes. Each node contains data and a pointer \
                       to the next node.\n\n## Types\n1. Singly Linked List\n2. Doubly \
                       Linked List\n3. Circular Linked List"
            .to_string(),
        category: Category::Theory,
        file_type: FileType::Pdf,
        topic_id: Some(ds),
        week: Some(1),
        tags: "ds, pointers".to_string(),
    })?;

    store.add_material(NewMaterial {
        title: "QuickSort Implementation".to_string(),
        description: "Efficient sorting using divide and conquer.".to_string(),
        text_content: "def quicksort(arr):\n    if len(arr) <= 1: return arr\n    \
                       pivot = arr[len(arr)//2]\n    left = [x for x in arr if x < pivot]\n    \
                       middle = [x for x in arr if x == pivot]\n    \
                       right = [x for x in arr if x > pivot]\n    \
                       return quicksort(left) + middle + quicksort(right)"
            .to_string(),
        category: Category::Lab,
        file_type: FileType::Code,
        topic_id: Some(algo),
        week: Some(2),
        tags: "sorting, recursion".to_string(),
    })?;

    store.add_material(NewMaterial {
        title: "OSI Model Overview".to_string(),
        description: "The seven layers of the OSI reference model.".to_string(),
        text_content: "The OSI model divides network communication into seven layers: \
                       physical, data link, network, transport, session, presentation, \
                       and application."
            .to_string(),
        category: Category::Theory,
        file_type: FileType::Slide,
        topic_id: Some(net),
        week: Some(3),
        tags: "networking, osi".to_string(),
    })?;

    let stats = store.stats()?;
    println!(
        "[OK] Seeded {} topics and {} materials.",
        stats.topic_count, stats.material_count
    );

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("edubot-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] Data directory: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API key: configured");
    } else {
        println!("[!] API key: not set");
        println!("    Set: export GEMINI_API_KEY=your-key");
    }

    match MaterialStore::open_default() {
        Ok(store) => match store.stats() {
            Ok(stats) => {
                println!(
                    "[OK] Materials: {} ({} topics)",
                    stats.material_count, stats.topic_count
                );
                println!(
                    "     Total content: {}",
                    format_bytes(stats.total_content_bytes)
                );

                // 벡터 인덱스 상태 (키가 있을 때만)
                if has_api_key() {
                    match SemanticRetriever::open_default(store).await {
                        Ok(retriever) => match retriever.stats().await {
                            Ok(index_stats) => {
                                println!("[OK] Semantic index: {} entries", index_stats.count);
                            }
                            Err(e) => {
                                tracing::debug!("Failed to read index stats: {}", e);
                            }
                        },
                        Err(e) => {
                            tracing::debug!("Semantic retriever unavailable: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                println!("[!] Failed to read store stats: {}", e);
            }
        },
        Err(e) => {
            println!("[!] Failed to open material store: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

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
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_material_kind_parse() {
        assert_eq!(MaterialKind::parse("code"), Some(MaterialKind::Code));
        assert_eq!(MaterialKind::parse("NOTE"), Some(MaterialKind::Note));
        assert_eq!(MaterialKind::parse("slide"), Some(MaterialKind::Slide));
        assert_eq!(MaterialKind::parse("video"), None);
    }
}

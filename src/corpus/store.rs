//! Material Store - rusqlite 기반 교육 자료 저장소
//!
//! 강의 자료(슬라이드, PDF, 코드, 노트)와 토픽을 저장하고
//! 키워드 부분 일치 검색을 제공합니다.
//! 저장 위치: ~/.edubot-rag/materials.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.edubot-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".edubot-rag")
}

// ============================================================================
// Types
// ============================================================================

/// 자료 분류 (이론/실습)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Theory,
    Lab,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Theory => "THEORY",
            Category::Lab => "LAB",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "THEORY" => Some(Category::Theory),
            "LAB" => Some(Category::Lab),
            _ => None,
        }
    }
}

/// 자료 파일 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Slide,
    Pdf,
    Code,
    Note,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Slide => "SLIDE",
            FileType::Pdf => "PDF",
            FileType::Code => "CODE",
            FileType::Note => "NOTE",
            FileType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SLIDE" => Some(FileType::Slide),
            "PDF" => Some(FileType::Pdf),
            "CODE" => Some(FileType::Code),
            "NOTE" => Some(FileType::Note),
            "OTHER" => Some(FileType::Other),
            _ => None,
        }
    }
}

/// 토픽 (자료 그룹핑 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// 새 토픽 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub name: String,
    pub description: String,
}

/// 저장된 강의 자료
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub text_content: String,
    pub category: Category,
    pub file_type: FileType,
    pub topic_id: Option<i64>,
    pub week: Option<u32>,
    /// 쉼표 구분 태그 문자열
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// 검색/컨텍스트용 본문
    ///
    /// text_content가 비어 있으면 description이 본문을 대신합니다.
    pub fn content(&self) -> &str {
        if self.text_content.trim().is_empty() {
            &self.description
        } else {
            &self.text_content
        }
    }
}

/// 새 자료 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub description: String,
    pub text_content: String,
    pub category: Category,
    pub file_type: FileType,
    pub topic_id: Option<i64>,
    pub week: Option<u32>,
    pub tags: String,
}

impl Default for NewMaterial {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            text_content: String::new(),
            category: Category::Theory,
            file_type: FileType::Other,
            topic_id: None,
            week: None,
            tags: String::new(),
        }
    }
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub material_count: usize,
    pub topic_count: usize,
    pub total_content_bytes: usize,
    pub db_path: PathBuf,
}

/// 키워드 검색 후보 상한 (다운스트림 프롬프트 크기 제한)
pub const MAX_CANDIDATES: usize = 20;

const MATERIAL_COLUMNS: &str = "id, title, description, text_content, category, file_type, \
                                topic_id, week, tags, created_at, updated_at";

// ============================================================================
// MaterialStore
// ============================================================================

/// Material Store - 동기 자료 저장소
///
/// SQLite 기반 저장과 LIKE 부분 일치 검색을 제공합니다.
/// 커넥션은 Arc로 공유되므로 clone은 같은 DB 핸들을 가리킵니다.
#[derive(Clone)]
pub struct MaterialStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl MaterialStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기 (~/.edubot-rag/materials.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("materials.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )",
            [],
        )
        .context("Failed to create topics table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS materials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                text_content TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'THEORY',
                file_type TEXT NOT NULL DEFAULT 'OTHER',
                topic_id INTEGER REFERENCES topics(id) ON DELETE SET NULL,
                week INTEGER,
                tags TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create materials table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_materials_topic ON materials(topic_id)",
            [],
        )
        .context("Failed to create topic index")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_materials_file_type ON materials(file_type)",
            [],
        )
        .context("Failed to create file_type index")?;

        tracing::debug!("Material store initialized at {:?}", self.db_path);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    /// 토픽 추가
    pub fn add_topic(&self, topic: NewTopic) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO topics (name, description) VALUES (?1, ?2)",
            params![topic.name, topic.description],
        )
        .context("Failed to insert topic")?;

        let id = conn.last_insert_rowid();
        tracing::info!("Added topic: {} (id={})", topic.name, id);
        Ok(id)
    }

    /// ID로 토픽 조회
    pub fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, description FROM topics WHERE id = ?1")?;

        let topic = stmt
            .query_row(params![id], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })
            .ok();

        Ok(topic)
    }

    /// 토픽 목록 조회
    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, description FROM topics ORDER BY id")?;

        let topics = stmt
            .query_map([], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(topics)
    }

    // ------------------------------------------------------------------
    // Materials
    // ------------------------------------------------------------------

    /// 자료 추가
    pub fn add_material(&self, mat: NewMaterial) -> Result<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO materials
                (title, description, text_content, category, file_type,
                 topic_id, week, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                mat.title,
                mat.description,
                mat.text_content,
                mat.category.as_str(),
                mat.file_type.as_str(),
                mat.topic_id,
                mat.week,
                mat.tags,
                now,
            ],
        )
        .context("Failed to insert material")?;

        let id = conn.last_insert_rowid();
        tracing::info!("Added material: {} (id={})", mat.title, id);
        Ok(id)
    }

    /// ID로 자료 조회
    pub fn get_material(&self, id: i64) -> Result<Option<Material>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM materials WHERE id = ?1",
            MATERIAL_COLUMNS
        ))?;

        let mat = stmt.query_row(params![id], material_from_row).ok();
        Ok(mat)
    }

    /// 자료 목록 조회
    pub fn list_materials(&self, limit: usize, category: Option<Category>) -> Result<Vec<Material>> {
        let conn = self.lock()?;

        let mats: Vec<Material> = if let Some(cat) = category {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM materials WHERE category = ?1 ORDER BY id DESC LIMIT ?2",
                MATERIAL_COLUMNS
            ))?;
            let rows = stmt.query_map(params![cat.as_str(), limit as i64], material_from_row)?;
            rows.filter_map(|r| r.ok()).collect()
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM materials ORDER BY id DESC LIMIT ?1",
                MATERIAL_COLUMNS
            ))?;
            let rows = stmt.query_map(params![limit as i64], material_from_row)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        Ok(mats)
    }

    /// 전체 자료 조회 (인덱싱용)
    pub fn all_materials(&self) -> Result<Vec<Material>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM materials ORDER BY id",
            MATERIAL_COLUMNS
        ))?;

        let mats = stmt
            .query_map([], material_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(mats)
    }

    /// 자료 삭제
    pub fn delete_material(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM materials WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// 키워드 부분 일치 검색 (OR 결합)
    ///
    /// 어떤 키워드든 title/description/text_content/tags 중 한 필드에
    /// 대소문자 무시 부분 문자열로 나타나면 매칭됩니다.
    /// id 기준 정렬로 결과 순서는 코퍼스가 같으면 항상 동일하며,
    /// 후보는 MAX_CANDIDATES 개로 제한됩니다.
    pub fn find_by_keywords(&self, keywords: &[String]) -> Result<Vec<Material>> {
        if keywords.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.lock()?;

        let clause = "(LOWER(title) LIKE ? OR LOWER(description) LIKE ? \
                      OR LOWER(text_content) LIKE ? OR LOWER(tags) LIKE ?)";
        let where_clause = vec![clause; keywords.len()].join(" OR ");

        let sql = format!(
            "SELECT DISTINCT {} FROM materials WHERE {} ORDER BY id LIMIT {}",
            MATERIAL_COLUMNS, where_clause, MAX_CANDIDATES
        );

        let mut patterns: Vec<String> = Vec::with_capacity(keywords.len() * 4);
        for kw in keywords {
            let pattern = format!("%{}%", escape_like(&kw.to_lowercase()));
            for _ in 0..4 {
                patterns.push(pattern.clone());
            }
        }

        let mut stmt = conn.prepare(&sql)?;
        let mats = stmt
            .query_map(params_from_iter(patterns.iter()), material_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(mats)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let material_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM materials", [], |row| row.get(0))
            .unwrap_or(0);

        let topic_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))
            .unwrap_or(0);

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(text_content) + LENGTH(description)), 0) \
                 FROM materials",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(StoreStats {
            material_count: material_count as usize,
            topic_count: topic_count as usize,
            total_content_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn material_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Material> {
    let category: String = row.get(4)?;
    let file_type: String = row.get(5)?;

    Ok(Material {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        text_content: row.get(3)?,
        category: Category::parse(&category).unwrap_or(Category::Theory),
        file_type: FileType::parse(&file_type).unwrap_or(FileType::Other),
        topic_id: row.get(6)?,
        week: row.get(7)?,
        tags: row.get(8)?,
        created_at: parse_datetime(row.get::<_, String>(9)?),
        updated_at: parse_datetime(row.get::<_, String>(10)?),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// LIKE 와일드카드 문자 제거
///
/// 검색 키워드 안의 % _ 는 패턴이 아니라 입력 노이즈로 취급합니다.
fn escape_like(s: &str) -> String {
    s.replace(['%', '_'], "")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, MaterialStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = MaterialStore::open(&db_path).unwrap();
        (dir, store)
    }

    fn sample_material(title: &str, content: &str) -> NewMaterial {
        NewMaterial {
            title: title.to_string(),
            text_content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_and_get_material() {
        let (_dir, store) = create_test_store();

        let id = store
            .add_material(NewMaterial {
                title: "Introduction to Linked Lists".to_string(),
                description: "A guide to singly and doubly linked lists.".to_string(),
                text_content: "Linked lists are linear data structures.".to_string(),
                category: Category::Theory,
                file_type: FileType::Pdf,
                week: Some(1),
                tags: "ds, pointers".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(id > 0);

        let mat = store.get_material(id).unwrap().unwrap();
        assert_eq!(mat.title, "Introduction to Linked Lists");
        assert_eq!(mat.category, Category::Theory);
        assert_eq!(mat.file_type, FileType::Pdf);
        assert_eq!(mat.week, Some(1));
        assert_eq!(mat.tags, "ds, pointers");
    }

    #[test]
    fn test_content_falls_back_to_description() {
        let (_dir, store) = create_test_store();

        let id = store
            .add_material(NewMaterial {
                title: "Slides only".to_string(),
                description: "OSI layers overview.".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mat = store.get_material(id).unwrap().unwrap();
        assert_eq!(mat.content(), "OSI layers overview.");
    }

    #[test]
    fn test_topics() {
        let (_dir, store) = create_test_store();

        let t1 = store
            .add_topic(NewTopic {
                name: "Data Structures".to_string(),
                description: "Arrays, lists, trees, graphs.".to_string(),
            })
            .unwrap();

        let topic = store.get_topic(t1).unwrap().unwrap();
        assert_eq!(topic.name, "Data Structures");

        assert!(store.get_topic(9999).unwrap().is_none());
        assert_eq!(store.list_topics().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_keywords_matches_any_field() {
        let (_dir, store) = create_test_store();

        store
            .add_material(NewMaterial {
                title: "QuickSort Implementation".to_string(),
                tags: "sorting, recursion".to_string(),
                ..Default::default()
            })
            .unwrap();
        store
            .add_material(NewMaterial {
                title: "Networking Basics".to_string(),
                description: "OSI layers and routing".to_string(),
                ..Default::default()
            })
            .unwrap();

        // title 매칭 (대소문자 무시)
        let hits = store
            .find_by_keywords(&["quicksort".to_string()])
            .unwrap();
        assert_eq!(hits.len(), 1);

        // tags 매칭
        let hits = store.find_by_keywords(&["recursion".to_string()]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "QuickSort Implementation");

        // description 매칭
        let hits = store.find_by_keywords(&["routing".to_string()]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Networking Basics");

        // 불일치
        let hits = store.find_by_keywords(&["compiler".to_string()]).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_find_by_keywords_dedup_and_order() {
        let (_dir, store) = create_test_store();

        store
            .add_material(sample_material(
                "Graph Traversal",
                "BFS and DFS on graphs",
            ))
            .unwrap();
        store
            .add_material(sample_material("Sorting", "Merge sort on arrays"))
            .unwrap();

        // 첫 문서는 두 키워드 모두에 매칭되지만 한 번만 나와야 함
        let hits = store
            .find_by_keywords(&["graph".to_string(), "bfs".to_string()])
            .unwrap();
        assert_eq!(hits.len(), 1);

        // 같은 코퍼스, 같은 질의면 결과 순서도 같아야 함
        let first = store
            .find_by_keywords(&["sort".to_string(), "graph".to_string()])
            .unwrap();
        let second = store
            .find_by_keywords(&["sort".to_string(), "graph".to_string()])
            .unwrap();
        let ids_first: Vec<i64> = first.iter().map(|m| m.id).collect();
        let ids_second: Vec<i64> = second.iter().map(|m| m.id).collect();
        assert_eq!(ids_first, ids_second);
    }

    #[test]
    fn test_find_by_keywords_cap() {
        let (_dir, store) = create_test_store();

        for i in 0..30 {
            store
                .add_material(sample_material(
                    &format!("Lecture {}", i),
                    "recursion practice",
                ))
                .unwrap();
        }

        let hits = store.find_by_keywords(&["recursion".to_string()]).unwrap();
        assert_eq!(hits.len(), MAX_CANDIDATES);
    }

    #[test]
    fn test_find_by_keywords_empty() {
        let (_dir, store) = create_test_store();
        let hits = store.find_by_keywords(&[]).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_list_with_category_filter() {
        let (_dir, store) = create_test_store();

        store
            .add_material(NewMaterial {
                title: "Theory A".to_string(),
                category: Category::Theory,
                ..Default::default()
            })
            .unwrap();
        store
            .add_material(NewMaterial {
                title: "Lab B".to_string(),
                category: Category::Lab,
                file_type: FileType::Code,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.list_materials(10, None).unwrap().len(), 2);

        let labs = store.list_materials(10, Some(Category::Lab)).unwrap();
        assert_eq!(labs.len(), 1);
        assert_eq!(labs[0].title, "Lab B");
    }

    #[test]
    fn test_delete_material() {
        let (_dir, store) = create_test_store();

        let id = store
            .add_material(sample_material("To delete", "bye"))
            .unwrap();
        assert!(store.delete_material(id).unwrap());
        assert!(store.get_material(id).unwrap().is_none());
        assert!(!store.delete_material(id).unwrap());
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = create_test_store();

        store
            .add_topic(NewTopic {
                name: "Algorithms".to_string(),
                description: String::new(),
            })
            .unwrap();
        store
            .add_material(NewMaterial {
                title: "T".to_string(),
                description: "12345".to_string(),
                text_content: "67890".to_string(),
                ..Default::default()
            })
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.material_count, 1);
        assert_eq!(stats.topic_count, 1);
        assert_eq!(stats.total_content_bytes, 10);
    }

    #[test]
    fn test_enum_roundtrip() {
        assert_eq!(Category::parse("lab"), Some(Category::Lab));
        assert_eq!(Category::parse("THEORY"), Some(Category::Theory));
        assert_eq!(Category::parse("bogus"), None);

        assert_eq!(FileType::parse("code"), Some(FileType::Code));
        assert_eq!(FileType::parse("SLIDE").map(|f| f.as_str()), Some("SLIDE"));
        assert_eq!(FileType::parse("unknown"), None);
    }
}

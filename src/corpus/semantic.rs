//! 시맨틱 검색기 - 자료 저장소 + LanceDB + 임베딩 결합
//!
//! 키워드 검색(store::find_by_keywords)의 대체 경로입니다.
//! 자료의 제목/설명/본문을 결합해 임베딩하고, 질의 텍스트와의
//! 거리 기준으로 랭킹된 결과를 반환합니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::embedding::{EmbeddingProvider, GeminiEmbedding};

use super::lance::LanceMaterialIndex;
use super::store::{get_data_dir, Material, MaterialStore};
use super::vector::{SearchHit, VectorEntry, VectorIndex};

/// 인덱싱 배치 기본 크기
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// 인덱싱 대상 최소 텍스트 길이 (미만이면 건너뜀)
const MIN_INDEXABLE_CHARS: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 통계
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    pub model_name: String,
}

// ============================================================================
// SemanticRetriever
// ============================================================================

/// 시맨틱 검색기
pub struct SemanticRetriever {
    store: MaterialStore,
    index: Box<dyn VectorIndex>,
    embedder: Box<dyn EmbeddingProvider>,
}

impl SemanticRetriever {
    /// 구성 요소를 직접 지정하여 생성
    pub fn new(
        store: MaterialStore,
        index: Box<dyn VectorIndex>,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// 기본 데이터 디렉토리(~/.edubot-rag/)에서 열기
    pub async fn open_default(store: MaterialStore) -> Result<Self> {
        Self::open(store, &get_data_dir()).await
    }

    /// 지정된 데이터 디렉토리에서 열기
    pub async fn open(store: MaterialStore, data_dir: &Path) -> Result<Self> {
        let index = LanceMaterialIndex::open(&data_dir.join("vectors.lance"))
            .await
            .context("Failed to open vector index")?;

        let embedder = GeminiEmbedding::from_env().context("Failed to create embedder")?;

        Ok(Self::new(store, Box::new(index), Box::new(embedder)))
    }

    /// 인덱싱용 결합 텍스트 (제목 + 설명 + 본문)
    fn index_text(mat: &Material) -> String {
        let mut text = format!("{}\n\n", mat.title);
        if !mat.description.trim().is_empty() {
            text.push_str(&mat.description);
            text.push_str("\n\n");
        }
        if !mat.text_content.trim().is_empty() {
            text.push_str(&mat.text_content);
        }
        text.trim().to_string()
    }

    fn topic_name_of(&self, mat: &Material) -> String {
        mat.topic_id
            .and_then(|id| self.store.get_topic(id).ok().flatten())
            .map(|t| t.name)
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// 전체 자료 인덱싱
    ///
    /// 자료를 배치로 임베딩하여 인덱스에 저장합니다. 텍스트가 거의 없는
    /// 자료는 건너뜁니다.
    ///
    /// # Returns
    /// 인덱싱된 자료 수
    pub async fn index_all(&self, clear: bool, batch_size: usize) -> Result<usize> {
        if clear {
            self.index.clear().await?;
        }

        let materials = self.store.all_materials()?;
        if materials.is_empty() {
            tracing::warn!("No materials found to index");
            return Ok(0);
        }

        let batch_size = batch_size.max(1);
        let mut pending: Vec<(Material, String)> = Vec::new();
        let mut indexed = 0;

        for mat in materials {
            let text = Self::index_text(&mat);
            if text.chars().count() < MIN_INDEXABLE_CHARS {
                tracing::debug!("Skipping material {} (too little text)", mat.id);
                continue;
            }
            pending.push((mat, text));

            if pending.len() >= batch_size {
                indexed += self.flush_batch(&mut pending).await?;
            }
        }

        if !pending.is_empty() {
            indexed += self.flush_batch(&mut pending).await?;
        }

        tracing::info!("Indexed {} materials", indexed);
        Ok(indexed)
    }

    async fn flush_batch(&self, pending: &mut Vec<(Material, String)>) -> Result<usize> {
        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed batch")?;

        let entries: Vec<VectorEntry> = pending
            .drain(..)
            .zip(embeddings)
            .map(|((mat, text), embedding)| VectorEntry {
                material_id: mat.id,
                text,
                title: mat.title.clone(),
                file_type: mat.file_type.as_str().to_string(),
                topic_name: self.topic_name_of(&mat),
                tags: mat.tags.clone(),
                embedding,
            })
            .collect();

        self.index.insert_batch(&entries).await
    }

    /// 단일 자료 업서트 (기존 엔트리 삭제 후 재삽입)
    pub async fn upsert(&self, mat: &Material) -> Result<()> {
        self.index.delete(mat.id).await?;

        let text = Self::index_text(mat);
        if text.chars().count() < MIN_INDEXABLE_CHARS {
            return Ok(());
        }

        let embedding = self.embedder.embed(&text).await?;
        self.index
            .insert_batch(&[VectorEntry {
                material_id: mat.id,
                text,
                title: mat.title.clone(),
                file_type: mat.file_type.as_str().to_string(),
                topic_name: self.topic_name_of(mat),
                tags: mat.tags.clone(),
                embedding,
            }])
            .await?;

        Ok(())
    }

    /// 텍스트 질의로 시맨틱 검색
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedder.embed(query).await?;
        self.index.search(&query_embedding, limit, file_type).await
    }

    /// material_id로 인덱스 엔트리 삭제
    pub async fn remove(&self, material_id: i64) -> Result<usize> {
        self.index.delete(material_id).await
    }

    /// 인덱스 전체 비우기
    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await
    }

    /// 인덱스 통계
    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            count: self.index.count().await?,
            dimension: self.embedder.dimension(),
            model_name: self.embedder.model_name().to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

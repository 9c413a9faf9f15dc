//! LanceDB Vector Index - 자료 시맨틱 인덱스
//!
//! ANN (Approximate Nearest Neighbor) 검색으로 자료 코퍼스에서
//! 의미 기반 검색을 지원합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{SearchHit, VectorEntry, VectorIndex, EMBEDDING_DIMENSION};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "materials";

// ============================================================================
// LanceMaterialIndex
// ============================================================================

/// LanceDB 기반 자료 인덱스
///
/// Apache Arrow 컬럼 포맷으로 임베딩과 메타데이터(제목, 파일 유형,
/// 토픽, 태그)를 함께 저장합니다.
pub struct LanceMaterialIndex {
    db: Connection,
}

impl LanceMaterialIndex {
    /// 인덱스 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 테이블 스키마 생성
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("material_id", DataType::Int64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("file_type", DataType::Utf8, false),
            Field::new("topic_name", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        let material_ids: Vec<i64> = entries.iter().map(|e| e.material_id).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        let file_types: Vec<&str> = entries.iter().map(|e| e.file_type.as_str()).collect();
        let topic_names: Vec<&str> = entries.iter().map(|e| e.topic_name.as_str()).collect();
        let tags: Vec<&str> = entries.iter().map(|e| e.tags.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(Int64Array::from(material_ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(file_types)),
                Arc::new(StringArray::from(topic_names)),
                Arc::new(StringArray::from(tags)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
    }
}

#[async_trait]
impl VectorIndex for LanceMaterialIndex {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            let table = self
                .db
                .open_table(TABLE_NAME)
                .execute()
                .await
                .context("Failed to open table")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for search")?;

        let mut query = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit);

        // file_type 값은 FileType::as_str()에서 나온 고정 라벨만 허용됨
        if let Some(ft) = file_type {
            query = query.only_if(format!("file_type = '{}'", ft));
        }

        let results = query
            .execute()
            .await
            .context("Failed to execute vector search")?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut hits = Vec::new();

        for batch in batches {
            let material_ids = batch
                .column_by_name("material_id")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing material_id column"))?;

            let texts = Self::string_column(&batch, "text")?;
            let titles = Self::string_column(&batch, "title")?;
            let file_types = Self::string_column(&batch, "file_type")?;
            let topic_names = Self::string_column(&batch, "topic_name")?;
            let tags = Self::string_column(&batch, "tags")?;

            // _distance 컬럼은 LanceDB가 자동 추가
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                hits.push(SearchHit {
                    material_id: material_ids.value(i),
                    text: texts.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    file_type: file_types.value(i).to_string(),
                    topic_name: topic_names.value(i).to_string(),
                    tags: tags.value(i).to_string(),
                    distance: distances.value(i),
                });
            }
        }

        Ok(hits)
    }

    async fn delete(&self, material_id: i64) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for delete")?;

        let before_count = self.count().await?;

        // material_id는 i64이므로 인젝션 여지 없음
        let filter = format!("material_id = {}", material_id);
        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;

        let after_count = self.count().await?;
        Ok(before_count.saturating_sub(after_count))
    }

    async fn clear(&self) -> Result<()> {
        if !self.table_exists().await {
            return Ok(());
        }

        self.db
            .drop_table(TABLE_NAME)
            .await
            .context("Failed to drop table")?;

        tracing::info!("Vector index cleared");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table for count")?;

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_entry(material_id: i64, file_type: &str) -> VectorEntry {
        VectorEntry {
            material_id,
            text: format!("Material {} combined text", material_id),
            title: format!("Material {}", material_id),
            file_type: file_type.to_string(),
            topic_name: "N/A".to_string(),
            tags: String::new(),
            embedding: vec![0.1; EMBEDDING_DIMENSION as usize],
        }
    }

    #[tokio::test]
    async fn test_lance_index_basic() {
        let temp_dir = TempDir::new().unwrap();
        let index = LanceMaterialIndex::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 0);

        let entries = vec![create_test_entry(1, "NOTE"), create_test_entry(2, "CODE")];
        let inserted = index.insert_batch(&entries).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_search_with_filter() {
        let temp_dir = TempDir::new().unwrap();
        let index = LanceMaterialIndex::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        let entries = vec![
            create_test_entry(1, "NOTE"),
            create_test_entry(2, "CODE"),
            create_test_entry(3, "CODE"),
        ];
        index.insert_batch(&entries).await.unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];

        let all = index.search(&query, 10, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let code_only = index.search(&query, 10, Some("CODE")).await.unwrap();
        assert_eq!(code_only.len(), 2);
        assert!(code_only.iter().all(|h| h.file_type == "CODE"));
    }

    #[tokio::test]
    async fn test_lance_delete_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let index = LanceMaterialIndex::open(&temp_dir.path().join("delete.lance"))
            .await
            .unwrap();

        let entries = vec![
            create_test_entry(1, "NOTE"),
            create_test_entry(2, "NOTE"),
            create_test_entry(3, "PDF"),
        ];
        index.insert_batch(&entries).await.unwrap();

        let deleted = index.delete(1).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(index.count().await.unwrap(), 2);

        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}

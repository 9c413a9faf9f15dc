//! Vector Index - 시맨틱 검색 트레이트 및 타입
//!
//! 자료 1건당 임베딩 1개를 저장합니다 (제목+설명+본문 결합 텍스트).
//! 거리(distance)는 백엔드가 반환하는 값을 그대로 노출합니다.

use anyhow::Result;
use async_trait::async_trait;

pub use crate::embedding::EMBEDDING_DIMENSION;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 저장용 엔트리
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 자료 ID (materials.id)
    pub material_id: i64,
    /// 인덱싱된 결합 텍스트
    pub text: String,
    /// 자료 제목
    pub title: String,
    /// 파일 유형 라벨 (SLIDE/PDF/CODE/NOTE/OTHER)
    pub file_type: String,
    /// 토픽 이름 (없으면 "N/A")
    pub topic_name: String,
    /// 쉼표 구분 태그
    pub tags: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 시맨틱 검색 결과
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub material_id: i64,
    pub text: String,
    pub title: String,
    pub file_type: String,
    pub topic_name: String,
    pub tags: String,
    /// 쿼리와의 거리 (작을수록 유사)
    pub distance: f32,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트 (async)
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 엔트리 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 임베딩으로 검색. file_type으로 필터링 가능.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<SearchHit>>;

    /// material_id로 엔트리 삭제
    async fn delete(&self, material_id: i64) -> Result<usize>;

    /// 인덱스 전체 비우기
    async fn clear(&self) -> Result<()>;

    /// 엔트리 개수 조회
    async fn count(&self) -> Result<usize>;
}

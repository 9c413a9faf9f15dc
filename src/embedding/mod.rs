//! 임베딩 모듈 - Gemini API 텍스트 벡터화
//!
//! 시맨틱 검색 경로에서만 사용됩니다. 키워드 검색 경로는 임베딩 없이
//! SQLite LIKE 매칭으로 동작합니다.
//!
//! 인덱싱은 벌크 작업이므로 여기만 호출 간 최소 딜레이와 429 백오프를
//! 유지합니다. 질의 파이프라인의 단건 호출에는 재시도가 없습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::llm::get_api_key;

/// Gemini 임베딩 엔드포인트 (gemini-embedding-001)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// 임베딩 차원 (LanceDB 스키마와 일치해야 함)
pub const EMBEDDING_DIMENSION: i32 = 768;

/// 호출 간 최소 딜레이 (무료 티어 60 RPM 준수)
const MIN_DELAY: Duration = Duration::from_millis(1000);
/// 429 발생 시 최대 재시도 횟수 (인덱싱 경로 전용)
const MAX_RETRIES: u32 = 3;
/// 재시도 초기 백오프
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 이름
    fn model_name(&self) -> &str;
}

// ============================================================================
// GeminiEmbedding
// ============================================================================

/// Google Gemini 임베딩 구현체
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl GeminiEmbedding {
    /// 새 임베딩 클라이언트 생성
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    ///
    /// 임베딩은 키 없이 동작할 수 없으므로 미설정 시 에러입니다.
    pub fn from_env() -> Result<Self> {
        let api_key = get_api_key().ok_or_else(|| {
            anyhow::anyhow!(
                "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY \
                 to use semantic indexing."
            )
        })?;
        Self::new(api_key)
    }

    /// 호출 간 최소 딜레이 적용 (버스트 방지)
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < MIN_DELAY {
                tokio::time::sleep(MIN_DELAY - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request_embedding(&self, text: &str) -> Result<EmbedAttempt> {
        let request = EmbedRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
            output_dimensionality: EMBEDDING_DIMENSION as usize,
        };

        let response = self
            .client
            .post(GEMINI_EMBED_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read embedding response body")?;

        if status.as_u16() == 429 {
            return Ok(EmbedAttempt::RateLimited);
        }

        if !status.is_success() {
            anyhow::bail!("Gemini embedding error ({}): {}", status, body);
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        Ok(EmbedAttempt::Ok(parsed.embedding.values))
    }
}

enum EmbedAttempt {
    Ok(Vec<f32>),
    RateLimited,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트는 영벡터
        if text.trim().is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIMENSION as usize]);
        }

        for attempt in 0..=MAX_RETRIES {
            self.pace().await;

            match self.request_embedding(text).await? {
                EmbedAttempt::Ok(values) => return Ok(values),
                EmbedAttempt::RateLimited => {
                    if attempt < MAX_RETRIES {
                        let backoff =
                            Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding rate limit (429), backing off {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        anyhow::bail!("Embedding failed after {} retries (rate limited)", MAX_RETRIES)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }

    fn model_name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_constant() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        assert_eq!(embedder.dimension(), 768);
        assert_eq!(embedder.model_name(), "gemini-embedding-001");
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        let v = embedder.embed("   ").await.unwrap();
        assert_eq!(v.len(), 768);
        assert!(v.iter().all(|&x| x == 0.0));
    }
}

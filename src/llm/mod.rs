//! LLM 모듈 - Gemini 텍스트 생성 클라이언트
//!
//! 프롬프트를 보내고 텍스트를 받는 단일 호출 인터페이스입니다.
//! 함수 호출/스트리밍/멀티턴 없음 - complete() 하나로 충분합니다.
//!
//! 실패는 태그된 에러로 구분합니다 (문자열 센티널 매칭 금지):
//! - `ConfigMissing`: API 키 미설정
//! - `QuotaExceeded`: 무료 티어 한도 초과 (429)
//! - `Upstream`: 그 외 API/네트워크 오류

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gemini generateContent 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs/text-generation
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// LLM 호출 타임아웃 (재시도 없음 - 한 번 실패하면 폴백으로 처리)
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// CompletionError
// ============================================================================

/// LLM 호출 실패 종류
///
/// 호출자는 종류(variant)로 분기하고, 사용자에게 보여줄 텍스트는
/// `user_message()`로 렌더링합니다.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// API 키가 설정되지 않음
    #[error("Gemini API key not configured")]
    ConfigMissing,

    /// 429 - 쿼터/레이트리밋 초과
    #[error("Gemini API quota exceeded (429)")]
    QuotaExceeded,

    /// 그 외 업스트림 오류 (네트워크, 5xx, 파싱 실패 등)
    #[error("Gemini API error: {0}")]
    Upstream(String),
}

impl CompletionError {
    /// 응답 본문에 그대로 삽입할 수 있는 안내 문구
    ///
    /// 스택 트레이스 대신 평문 메시지를 정상 응답 형태에 담아 반환합니다.
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::ConfigMissing => {
                "Gemini API key not configured. Set the GEMINI_API_KEY environment variable \
                 to enable AI features."
                    .to_string()
            }
            CompletionError::QuotaExceeded => {
                "AI quota exceeded (429): the free tier limit has been reached. \
                 Please wait a minute and try again."
                    .to_string()
            }
            CompletionError::Upstream(msg) => {
                format!("Error contacting Gemini service: {}", msg)
            }
        }
    }

    /// 쿼터 초과 여부
    pub fn is_quota(&self) -> bool {
        matches!(self, CompletionError::QuotaExceeded)
    }
}

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 텍스트 생성 프로바이더 트레이트
///
/// 프롬프트 입력, 트리밍된 텍스트 출력. 테스트에서는 목 구현으로
/// 호출 횟수/응답을 제어합니다.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 단일 프롬프트 완성
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Google Gemini 텍스트 생성 클라이언트
///
/// 키가 없어도 생성은 성공합니다 - 이후 모든 complete() 호출이
/// `ConfigMissing`을 반환하고, 서비스 계층이 이를 안내 문구로 바꿉니다.
pub struct GeminiClient {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    /// 새 클라이언트 생성
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { api_key, client })
    }

    /// 환경변수에서 API 키를 읽어 생성
    ///
    /// 우선순위: GEMINI_API_KEY > GOOGLE_AI_API_KEY
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key())
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::ConfigMissing)?;

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(GEMINI_GENERATE_URL)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Upstream(format!("failed to read body: {}", e)))?;

        if status.as_u16() == 429 {
            tracing::warn!("Gemini rate limit hit (429)");
            return Err(CompletionError::QuotaExceeded);
        }

        if !status.is_success() {
            // 에러 본문에서 메시지 추출 시도
            if let Ok(err) = serde_json::from_str::<GeminiError>(&body) {
                if err.error.status == "RESOURCE_EXHAUSTED" {
                    return Err(CompletionError::QuotaExceeded);
                }
                return Err(CompletionError::Upstream(format!(
                    "{} ({})",
                    err.error.message, status
                )));
            }
            return Err(CompletionError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Upstream(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.is_empty() {
            tracing::warn!("Gemini returned an empty completion");
        }

        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "gemini-2.5-flash"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Option<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Some(key);
            }
        }
    }
    None
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_some()
}

// ============================================================================
// Tests
// ============================================================================

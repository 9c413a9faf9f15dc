//! 외부 지식 조회 모듈 - Wikipedia 요약 폴백
//!
//! 내부 코퍼스 매칭이 2건 미만일 때만 호출됩니다.
//! 어떤 실패든 (네트워크, 404, 파싱) 조용히 None으로 수렴하며,
//! 요청 전체를 실패시키지 않습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Wikipedia REST 요약 엔드포인트
/// source: https://en.wikipedia.org/api/rest_v1/
const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

/// 외부 조회 타임아웃
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// 발췌문 최대 길이 (문자 수)
pub const EXTRACT_MAX_CHARS: usize = 1000;

/// 외부 컨텍스트 출처 라벨 (프롬프트/인용에 사용)
pub const EXTERNAL_SOURCE_LABEL: &str = "Wikipedia";

// ============================================================================
// KnowledgeLookup Trait
// ============================================================================

/// 외부 지식 조회 트레이트
///
/// 실패는 없습니다 - 조회할 수 없으면 None입니다.
#[async_trait]
pub trait KnowledgeLookup: Send + Sync {
    /// 검색어에 대한 짧은 요약 조회
    async fn lookup(&self, term: &str) -> Option<String>;
}

// ============================================================================
// WikipediaClient
// ============================================================================

/// Wikipedia 요약 조회 클라이언트
pub struct WikipediaClient {
    client: reqwest::Client,
}

impl WikipediaClient {
    /// 새 클라이언트 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("edubot-rag/0.1")
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn fetch_summary(&self, term: &str) -> Result<String> {
        let url = summary_url(term)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Summary request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Summary request returned {}", status);
        }

        let summary: SummaryResponse = response
            .json()
            .await
            .context("Failed to parse summary response")?;

        let extract = summary
            .extract
            .ok_or_else(|| anyhow::anyhow!("Summary has no extract"))?;

        if extract.trim().is_empty() {
            anyhow::bail!("Summary extract is empty");
        }

        Ok(truncate_chars(extract.trim(), EXTRACT_MAX_CHARS))
    }
}

#[async_trait]
impl KnowledgeLookup for WikipediaClient {
    async fn lookup(&self, term: &str) -> Option<String> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }

        match self.fetch_summary(term).await {
            Ok(extract) => {
                tracing::debug!("Wikipedia extract found for '{}'", term);
                Some(extract)
            }
            Err(e) => {
                tracing::debug!("Wikipedia lookup failed for '{}': {}", term, e);
                None
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 검색어를 요약 엔드포인트 URL로 변환
///
/// Wikipedia 관례대로 공백은 밑줄로 바꾸고, 나머지 특수문자는
/// path_segments_mut가 퍼센트 인코딩합니다.
fn summary_url(term: &str) -> Result<Url> {
    let title = term.trim().replace(' ', "_");

    let mut url = Url::parse(WIKIPEDIA_SUMMARY_URL).context("Invalid base URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Base URL cannot be a base"))?
        .push(&title);

    Ok(url)
}

/// 문자 수 기준 자르기 (UTF-8 안전)
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    extract: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_url_spaces_to_underscores() {
        let url = summary_url("software engineering").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/software_engineering"
        );
    }

    #[test]
    fn test_summary_url_encodes_special_chars() {
        let url = summary_url("C++ (programming language)").unwrap();
        assert!(url.as_str().ends_with("C++_(programming_language)"));
    }

    #[test]
    fn test_truncate_chars() {
        let long: String = "a".repeat(1500);
        assert_eq!(truncate_chars(&long, EXTRACT_MAX_CHARS).chars().count(), 1000);

        assert_eq!(truncate_chars("short", 1000), "short");

        // 멀티바이트 문자도 경계 안전
        let korean: String = "가".repeat(1200);
        assert_eq!(truncate_chars(&korean, 1000).chars().count(), 1000);
    }

    #[tokio::test]
    async fn test_lookup_empty_term_is_none() {
        let client = WikipediaClient::new().unwrap();
        assert!(client.lookup("   ").await.is_none());
    }
}

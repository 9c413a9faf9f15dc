//! 질의 키워드 처리 - 불용어 제거, 코드 의도 감지, LLM 키워드 확장
//!
//! 검색 전 단계입니다. 짧은 질의(토큰 3개 이하)는 비용/지연을 피하려고
//! LLM을 전혀 호출하지 않고 불용어 제거만 수행합니다.

use crate::llm::CompletionProvider;

use super::prompt;

/// 불용어 (비교는 대소문자 무시)
const STOP_WORDS: [&str; 11] = [
    "tell", "me", "about", "what", "is", "the", "how", "to", "explain", "simply", "write",
];

/// 코드 의도 지표 토큰
const CODE_INDICATORS: [&str; 10] = [
    "code",
    "def",
    "function",
    "implementation",
    "syntax",
    "error",
    "debug",
    "class",
    "struct",
    "programming",
];

/// 이 토큰 수를 넘는 질의만 LLM 확장 대상
const EXPANSION_TOKEN_THRESHOLD: usize = 3;

/// 이 길이 이하 키워드는 검색에서 제외 (부분 일치 오탐 방지)
const MIN_KEYWORD_CHARS: usize = 3;

// ============================================================================
// Normalizer
// ============================================================================

/// 불용어를 제거한 키워드 토큰 추출
///
/// 공백으로 분리하고, 소문자 비교로 불용어를 걸러냅니다.
/// 나머지 토큰은 원래 대소문자와 중복을 그대로 유지합니다.
pub fn strip_stop_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .map(|w| w.to_string())
        .collect()
}

/// 코드 의도 감지
///
/// 원본 질의 토큰 중 하나라도 지표 집합에 속하면 true.
pub fn has_code_intent(query: &str) -> bool {
    query
        .split_whitespace()
        .any(|w| CODE_INDICATORS.contains(&w.to_lowercase().as_str()))
}

// ============================================================================
// Expander
// ============================================================================

/// 검색 키워드 수집 (필요 시 LLM 확장)
///
/// - 토큰 3개 이하: LLM 호출 없이 불용어 제거 결과만 사용
/// - 토큰 4개 이상: LLM에 기술 키워드/동의어 5~7개를 요청해 추가.
///   호출 실패는 구조적으로(`Err`) 감지하며, 그 경우 확장 없이
///   불용어 제거 결과로 폴백합니다. 응답 텍스트를 들여다보고
///   실패를 추측하지 않습니다.
///
/// 마지막으로 2자 이하 토큰을 제거합니다.
pub async fn gather_keywords(llm: &dyn CompletionProvider, query: &str) -> Vec<String> {
    let mut keywords = strip_stop_words(query);

    if query.split_whitespace().count() > EXPANSION_TOKEN_THRESHOLD {
        match llm.complete(&prompt::keyword_expansion(query)).await {
            Ok(text) => {
                let expanded = parse_keyword_list(&text);
                tracing::debug!("Expanded query with {} keywords", expanded.len());
                keywords.extend(expanded);
            }
            Err(e) => {
                tracing::debug!("Keyword expansion skipped: {}", e);
            }
        }
    }

    keywords.retain(|k| k.chars().count() >= MIN_KEYWORD_CHARS);
    keywords
}

/// 쉼표 구분 키워드 목록 파싱
fn parse_keyword_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

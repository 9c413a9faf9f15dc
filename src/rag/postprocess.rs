//! 생성 결과 후처리 - 코드 펜스 제거, JSON 추출, 구조 검증
//!
//! LLM 출력은 신뢰할 수 없는 텍스트로 취급합니다. 추출 후 반드시
//! 타입 파싱과 형태 검증을 거치며, 실패하면 빈 컬렉션이나 error
//! 필드가 표시된 플레이스홀더로 수렴합니다. 예외를 전파하지 않습니다.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 퀴즈 문항의 보기 개수 (이와 다르면 페이로드 전체를 거부)
const QUIZ_OPTION_COUNT: usize = 4;

// ============================================================================
// Types
// ============================================================================

/// 퀴즈 문항
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub explanation: String,
}

/// 플래시카드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// 영상 스토리보드 장면
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub time: String,
    pub visual: String,
    pub audio: String,
}

/// 영상 스크립트/스토리보드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoScript {
    pub title: String,
    pub duration: String,
    pub scenes: Vec<Scene>,
    /// 실패 시 최선 노력 콘텐츠와 함께 채워지는 경고
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoScript {
    /// 생성 실패 시의 최선 노력 플레이스홀더 스토리보드
    pub fn placeholder(topic: &str, error: String) -> Self {
        Self {
            title: format!("Video Explanation: {}", topic),
            duration: "1:30".to_string(),
            scenes: vec![
                Scene {
                    time: "0:00-0:30".to_string(),
                    visual: "Intro Slide".to_string(),
                    audio: format!("Hi, let's learn about {}.", topic),
                },
                Scene {
                    time: "0:30-1:30".to_string(),
                    visual: "Conceptual Diagram".to_string(),
                    audio: "This is how part A connects to part B.".to_string(),
                },
            ],
            error: Some(error),
        }
    }

    /// 쿼터 초과 시의 빈 스토리보드
    pub fn quota_exceeded(warning: String) -> Self {
        Self {
            title: "Quota Exceeded".to_string(),
            duration: "0:00".to_string(),
            scenes: vec![],
            error: Some(warning),
        }
    }
}

// ============================================================================
// Fence / JSON Extraction
// ============================================================================

/// 코드 펜스 제거
///
/// 첫 번째 펜스 블록(``` + 선택적 언어 태그)의 내부를 꺼냅니다.
/// 펜스가 없으면 입력을 트리밍해 그대로 반환합니다.
pub fn strip_code_fence(text: &str) -> String {
    let re = Regex::new(r"(?s)```[a-zA-Z0-9_+-]*\n?(.*?)```").unwrap();

    if let Some(caps) = re.captures(text) {
        caps.get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| text.trim().to_string())
    } else {
        text.trim().to_string()
    }
}

/// 산문 속 첫 JSON 배열 탐색 (탐욕적 대괄호 매칭)
pub fn extract_json_array(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\[.*\]").unwrap();
    re.find(text).map(|m| m.as_str().to_string())
}

/// 산문 속 첫 JSON 객체 탐색 (탐욕적 중괄호 매칭)
pub fn extract_json_object(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\{.*\}").unwrap();
    re.find(text).map(|m| m.as_str().to_string())
}

// ============================================================================
// Typed Parsers
// ============================================================================

/// 퀴즈 파싱 + 형태 검증
///
/// 보기 4개가 아닌 문항이 하나라도 있으면 페이로드 전체를 거부하고
/// 빈 Vec을 반환합니다.
pub fn parse_quiz(text: &str) -> Vec<QuizItem> {
    let cleaned = strip_code_fence(text);

    let json = match extract_json_array(&cleaned) {
        Some(json) => json,
        None => {
            tracing::warn!("No JSON array found in quiz response");
            return vec![];
        }
    };

    let items: Vec<QuizItem> = match serde_json::from_str(&json) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Quiz JSON parse failed: {}", e);
            return vec![];
        }
    };

    if items
        .iter()
        .any(|item| item.options.len() != QUIZ_OPTION_COUNT)
    {
        tracing::warn!("Quiz payload rejected: item without exactly 4 options");
        return vec![];
    }

    items
}

/// 플래시카드 파싱
pub fn parse_flashcards(text: &str) -> Vec<Flashcard> {
    let cleaned = strip_code_fence(text);

    let json = match extract_json_array(&cleaned) {
        Some(json) => json,
        None => {
            tracing::warn!("No JSON array found in flashcard response");
            return vec![];
        }
    };

    match serde_json::from_str(&json) {
        Ok(cards) => cards,
        Err(e) => {
            tracing::warn!("Flashcard JSON parse failed: {}", e);
            vec![]
        }
    }
}

/// 영상 스크립트 파싱
///
/// 실패하면 error 필드가 표시된 플레이스홀더 스토리보드를 반환합니다.
pub fn parse_video_script(topic: &str, text: &str) -> VideoScript {
    let cleaned = strip_code_fence(text);

    let json = match extract_json_object(&cleaned) {
        Some(json) => json,
        None => {
            tracing::warn!("No JSON object found in video script response");
            return VideoScript::placeholder(
                topic,
                "AI response contained no storyboard JSON".to_string(),
            );
        }
    };

    match serde_json::from_str::<VideoScript>(&json) {
        Ok(script) => script,
        Err(e) => {
            tracing::warn!("Video script JSON parse failed: {}", e);
            VideoScript::placeholder(topic, format!("AI returned a malformed storyboard: {}", e))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_QUIZ: &str = r#"[
        {"question": "What does BFS stand for?",
         "options": ["Breadth-first search", "Best-first search", "Binary file system", "Backtracking full scan"],
         "answer": "Breadth-first search",
         "explanation": "BFS explores neighbors level by level."}
    ]"#;

    #[test]
    fn test_strip_code_fence_with_language_tag() {
        let text = "```json\n[1, 2, 3]\n```";
        assert_eq!(strip_code_fence(text), "[1, 2, 3]");

        let text = "```python\nprint('hi')\n```";
        assert_eq!(strip_code_fence(text), "print('hi')");
    }

    #[test]
    fn test_strip_code_fence_takes_first_block() {
        let text = "intro\n```\nfirst\n```\nmiddle\n```\nsecond\n```";
        assert_eq!(strip_code_fence(text), "first");
    }

    #[test]
    fn test_strip_code_fence_without_fence() {
        assert_eq!(strip_code_fence("  plain text  "), "plain text");
    }

    #[test]
    fn test_extract_json_from_prose() {
        let text = "Here is the data: [1, 2] as requested.";
        assert_eq!(extract_json_array(text).unwrap(), "[1, 2]");

        let text = "Result: {\"a\": 1} done.";
        assert_eq!(extract_json_object(text).unwrap(), "{\"a\": 1}");

        assert!(extract_json_array("no brackets here").is_none());
        assert!(extract_json_object("no braces here").is_none());
    }

    #[test]
    fn test_parse_quiz_from_fenced_prose() {
        let text = format!("Sure! Here is your quiz:\n```json\n{}\n```\nEnjoy!", VALID_QUIZ);
        let items = parse_quiz(&text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].options.len(), 4);
        assert_eq!(items[0].answer, "Breadth-first search");
    }

    #[test]
    fn test_parse_quiz_rejects_wrong_option_count() {
        let text = r#"[
            {"question": "Q1", "options": ["a", "b", "c"],
             "answer": "a", "explanation": "e"}
        ]"#;
        assert!(parse_quiz(text).is_empty());
    }

    #[test]
    fn test_parse_quiz_malformed_is_empty() {
        assert!(parse_quiz("I could not generate a quiz, sorry.").is_empty());
        assert!(parse_quiz("[{\"question\": \"unterminated\"").is_empty());
    }

    #[test]
    fn test_parse_flashcards() {
        let text = r#"[{"front": "What is a stack?", "back": "LIFO structure"},
                       {"front": "What is a queue?", "back": "FIFO structure"}]"#;
        let cards = parse_flashcards(text);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].front, "What is a stack?");

        assert!(parse_flashcards("nothing structured").is_empty());
        // 필수 필드 누락은 페이로드 거부
        assert!(parse_flashcards(r#"[{"front": "only front"}]"#).is_empty());
    }

    #[test]
    fn test_parse_video_script_valid() {
        let text = r#"{
            "title": "Recursion in 90 seconds",
            "duration": "1:30",
            "scenes": [
                {"time": "0:00-0:30", "visual": "Stack frames", "audio": "Recursion is..."},
                {"time": "0:30-1:00", "visual": "Base case", "audio": "Every recursion needs..."},
                {"time": "1:00-1:30", "visual": "Summary", "audio": "To recap..."}
            ]
        }"#;
        let script = parse_video_script("Recursion", text);
        assert_eq!(script.scenes.len(), 3);
        assert!(script.error.is_none());
    }

    #[test]
    fn test_parse_video_script_malformed_is_flagged_placeholder() {
        let script = parse_video_script("Recursion", "I can't make a storyboard.");
        assert_eq!(script.title, "Video Explanation: Recursion");
        assert!(script.error.is_some());
        assert!(!script.scenes.is_empty());
    }

    #[test]
    fn test_quota_script_shape() {
        let script = VideoScript::quota_exceeded("warning".to_string());
        assert_eq!(script.title, "Quota Exceeded");
        assert_eq!(script.duration, "0:00");
        assert!(script.scenes.is_empty());
    }
}

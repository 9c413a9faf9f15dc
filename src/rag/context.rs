//! 컨텍스트 빌더 - 랭킹된 자료를 프롬프트용 컨텍스트로 변환
//!
//! 두 가지 형태를 만듭니다:
//! - 발췌(excerpt) 형태: 자료별 300자 미리보기 + 메타데이터.
//!   답변 생성의 출처 목록과 외부 폴백 판단에 사용됩니다.
//! - 연결(concatenated) 형태: 상위 5건을 이어붙인 단일 텍스트 블록.
//!   퀴즈/플래시카드 등 생성 작업에 사용됩니다.
//!
//! 둘 다 요청마다 새로 만들며 캐시하지 않습니다.

use serde::{Deserialize, Serialize};

use crate::corpus::{FileType, Material};

/// 발췌문 최대 길이 (문자 수)
pub const EXCERPT_MAX_CHARS: usize = 300;

/// 연결 형태에 포함할 자료 수
pub const CONTEXT_DOCS: usize = 5;

// ============================================================================
// Types
// ============================================================================

/// 자료 발췌 (응답의 sources 목록에도 그대로 들어감)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExcerpt {
    pub id: i64,
    pub title: String,
    pub excerpt: String,
    pub file_type: FileType,
}

// ============================================================================
// Builders
// ============================================================================

/// 발췌 형태 컨텍스트 생성
///
/// 랭킹된 자료 전부(최대 10건)에 대해 발췌를 만듭니다.
pub fn build_excerpts(materials: &[Material]) -> Vec<ContextExcerpt> {
    materials
        .iter()
        .map(|m| ContextExcerpt {
            id: m.id,
            title: m.title.clone(),
            excerpt: excerpt_of(m.content()),
            file_type: m.file_type,
        })
        .collect()
}

/// 연결 형태 컨텍스트 생성 (상위 5건)
pub fn build_context_string(materials: &[Material]) -> String {
    materials
        .iter()
        .take(CONTEXT_DOCS)
        .map(|m| format!("Source: {}\nContent: {}", m.title, m.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 본문 앞 300자 발췌, 잘렸으면 말줄임표 추가
fn excerpt_of(content: &str) -> String {
    if content.chars().count() <= EXCERPT_MAX_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(EXCERPT_MAX_CHARS).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Category;
    use chrono::Utc;

    fn material_with_content(id: i64, text_content: &str, description: &str) -> Material {
        let now = Utc::now();
        Material {
            id,
            title: format!("Material {}", id),
            description: description.to_string(),
            text_content: text_content.to_string(),
            category: Category::Theory,
            file_type: FileType::Note,
            topic_id: None,
            week: None,
            tags: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_long_body_truncated_with_ellipsis() {
        let body = "x".repeat(1000);
        let excerpts = build_excerpts(&[material_with_content(1, &body, "")]);

        let excerpt = &excerpts[0].excerpt;
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_short_body_unchanged() {
        let body = "y".repeat(50);
        let excerpts = build_excerpts(&[material_with_content(1, &body, "")]);

        assert_eq!(excerpts[0].excerpt, body);
        assert!(!excerpts[0].excerpt.ends_with("..."));
    }

    #[test]
    fn test_exact_boundary_has_no_ellipsis() {
        let body = "z".repeat(EXCERPT_MAX_CHARS);
        let excerpts = build_excerpts(&[material_with_content(1, &body, "")]);
        assert_eq!(excerpts[0].excerpt, body);
    }

    #[test]
    fn test_excerpt_falls_back_to_description() {
        let excerpts = build_excerpts(&[material_with_content(1, "", "OSI layer overview")]);
        assert_eq!(excerpts[0].excerpt, "OSI layer overview");
    }

    #[test]
    fn test_context_string_format_and_cap() {
        let materials: Vec<Material> = (1..=7)
            .map(|i| material_with_content(i, &format!("content {}", i), ""))
            .collect();

        let context = build_context_string(&materials);

        // 상위 5건만
        assert!(context.contains("Source: Material 1\nContent: content 1"));
        assert!(context.contains("Source: Material 5"));
        assert!(!context.contains("Material 6"));

        // 블록 사이 빈 줄
        assert_eq!(context.matches("\n\n").count(), 4);
    }

    #[test]
    fn test_empty_materials() {
        assert!(build_excerpts(&[]).is_empty());
        assert_eq!(build_context_string(&[]), "");
    }
}

//! 생성 코드 구문 검증 - tree-sitter AST 파싱
//!
//! 구문만 확인합니다 (실행/타입 검사 없음). Python만 실제로 검사하고,
//! 그 외 언어는 항상 통과시키는 명시적 스텁입니다.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

// ============================================================================
// Types
// ============================================================================

/// 검증 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: vec![],
        }
    }

    fn failed(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
        }
    }
}

// ============================================================================
// CodeValidator
// ============================================================================

/// 코드 구문 검증기
#[derive(Debug, Default)]
pub struct CodeValidator;

impl CodeValidator {
    pub fn new() -> Self {
        Self
    }

    /// 코드 구문 검증
    ///
    /// # Arguments
    /// * `code` - 검증할 소스 코드
    /// * `language` - 대상 언어 (대소문자 무시, 현재 python만 지원)
    pub fn validate_code(&self, code: &str, language: &str) -> Validation {
        match language.to_lowercase().as_str() {
            "python" => validate_python(code),
            other => {
                // 미지원 언어는 검사 없이 통과 (스텁)
                tracing::debug!("No syntax checker for '{}', accepting as-is", other);
                Validation::ok()
            }
        }
    }
}

fn validate_python(code: &str) -> Validation {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        tracing::warn!("Python grammar unavailable, skipping validation");
        return Validation::ok();
    }

    let tree = match parser.parse(code, None) {
        Some(tree) => tree,
        None => return Validation::failed("Line 1: parser produced no tree".to_string()),
    };

    let root = tree.root_node();
    if !root.has_error() {
        return Validation::ok();
    }

    // 첫 에러 노드만 보고 (Python의 SyntaxError처럼 단건)
    let message = match find_first_error(root) {
        Some(node) => {
            let line = node.start_position().row + 1;
            if node.is_missing() {
                format!("Line {}: missing {}", line, node.kind())
            } else {
                format!("Line {}: invalid syntax", line)
            }
        }
        None => "Line 1: invalid syntax".to_string(),
    };

    Validation::failed(message)
}

/// 트리에서 첫 번째 ERROR/MISSING 노드 탐색 (깊이 우선)
fn find_first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = find_first_error(child) {
            return Some(err);
        }
    }

    // has_error인데 구체 노드를 못 찾으면 자기 자신
    Some(node)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_python_passes() {
        let validator = CodeValidator::new();
        let code = "def add(a, b):\n    return a + b\n\nprint(add(1, 2))\n";

        let result = validator.validate_code(code, "python");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_syntax_error_cites_line() {
        let validator = CodeValidator::new();
        // 2번째 줄의 콜론 누락
        let code = "x = 1\ndef broken(a, b\n    return a + b\n";

        let result = validator.validate_code(code, "python");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Line "), "got: {}", result.errors[0]);
    }

    #[test]
    fn test_case_insensitive_language() {
        let validator = CodeValidator::new();
        let result = validator.validate_code("return???", "Python");
        assert!(!result.valid);
    }

    #[test]
    fn test_unsupported_language_is_stub() {
        let validator = CodeValidator::new();
        // 깨진 코드라도 미지원 언어면 통과
        let result = validator.validate_code("function { nope", "javascript");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_empty_code_is_valid() {
        let validator = CodeValidator::new();
        let result = validator.validate_code("", "python");
        assert!(result.valid);
    }
}

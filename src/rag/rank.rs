//! 후보 재정렬 - 코드 의도 부스트
//!
//! 점수 기반 랭킹이 아닙니다. 코드 의도가 감지된 질의에서만
//! CODE 유형 자료를 앞으로 보내는 단일 규칙이며, 안정 정렬이라
//! 그룹 내 상대 순서는 입력 순서 그대로 유지됩니다.

use crate::corpus::{FileType, Material};

/// 랭킹 후 결과 상한
pub const MAX_RANKED: usize = 10;

/// 후보 재정렬 및 상한 적용
///
/// 코드 의도가 없으면 순서를 건드리지 않고 자르기만 합니다.
pub fn rank(mut candidates: Vec<Material>, code_intent: bool) -> Vec<Material> {
    if code_intent {
        // 안정 정렬: CODE가 아닌 자료만 뒤로 밀림
        candidates.sort_by_key(|m| m.file_type != FileType::Code);
    }

    candidates.truncate(MAX_RANKED);
    candidates
}

// ============================================================================
// Tests
// ============================================================================

//! RAG 모듈 - 검색-근거-생성 파이프라인
//!
//! - keywords: 불용어 제거, 코드 의도 감지, LLM 키워드 확장
//! - rank: 코드 의도 기반 안정 재정렬
//! - context: 발췌/연결 컨텍스트 조립
//! - prompt: 작업별 프롬프트 템플릿
//! - postprocess: 펜스 제거, JSON 추출, 구조 검증
//! - service: 엔드포인트 오케스트레이션

mod keywords;
mod rank;
mod context;
mod prompt;
mod postprocess;
mod service;

// Re-exports
pub use context::{
    build_context_string, build_excerpts, ContextExcerpt, CONTEXT_DOCS, EXCERPT_MAX_CHARS,
};
pub use keywords::{gather_keywords, has_code_intent, strip_stop_words};
pub use postprocess::{
    extract_json_array, extract_json_object, parse_flashcards, parse_quiz, parse_video_script,
    strip_code_fence, Flashcard, QuizItem, Scene, VideoScript,
};
pub use rank::{rank, MAX_RANKED};
pub use service::{Answer, GeneratedMaterial, MaterialKind, RagService};

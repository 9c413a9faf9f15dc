//! edubot-rag - 교육 자료 RAG 어시스턴트
//!
//! 로컬에 저장된 강의 자료(슬라이드, PDF, 코드, 노트) 위에서 동작하는
//! 검색 증강 생성(RAG) 계층입니다. 키워드 검색 + 코드 의도 랭킹으로
//! 근거 컨텍스트를 만들고, 내부 매칭이 희소하면 Wikipedia 요약으로
//! 폴백합니다. 같은 컨텍스트로 퀴즈/플래시카드/학습 노트/영상
//! 스크립트 생성도 지원합니다.

pub mod cli;
pub mod corpus;
pub mod embedding;
pub mod llm;
pub mod lookup;
pub mod rag;
pub mod validation;

// Re-exports
pub use corpus::{
    get_data_dir, Category, FileType, IndexStats, LanceMaterialIndex, Material, MaterialStore,
    NewMaterial, NewTopic, SearchHit, SemanticRetriever, StoreStats, Topic, VectorEntry,
    VectorIndex,
};
pub use embedding::{EmbeddingProvider, GeminiEmbedding, EMBEDDING_DIMENSION};
pub use llm::{get_api_key, has_api_key, CompletionError, CompletionProvider, GeminiClient};
pub use lookup::{KnowledgeLookup, WikipediaClient, EXTERNAL_SOURCE_LABEL};
pub use rag::{
    Answer, ContextExcerpt, Flashcard, GeneratedMaterial, MaterialKind, QuizItem, RagService,
    Scene, VideoScript,
};
pub use validation::{CodeValidator, Validation};

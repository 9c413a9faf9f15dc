//! Corpus 모듈 - 교육 자료 코퍼스 저장 및 검색
//!
//! - SQLite: 자료/토픽 저장 + 키워드 부분 일치 검색
//! - LanceDB: 시맨틱 검색 인덱스 (대체 검색 경로)

mod store;
mod vector;
mod lance;
mod semantic;

// Re-exports
pub use store::{
    get_data_dir, Category, FileType, Material, MaterialStore, NewMaterial, NewTopic,
    StoreStats, Topic, MAX_CANDIDATES,
};
pub use vector::{SearchHit, VectorEntry, VectorIndex, EMBEDDING_DIMENSION};
pub use lance::LanceMaterialIndex;
pub use semantic::{IndexStats, SemanticRetriever, DEFAULT_BATCH_SIZE};

//! RAG 서비스 - 검색-근거-생성 파이프라인 오케스트레이션
//!
//! 흐름: 질의 → 키워드 수집(불용어 제거/LLM 확장) → 후보 검색 →
//! 코드 의도 랭킹 → 컨텍스트 조립 → (희소하면 외부 폴백) →
//! 프롬프트 → LLM → 후처리.
//!
//! 에러 정책: 저장소 실패만 Err로 전파합니다. LLM/외부 조회 실패는
//! 전부 흡수되어 정의된 폴백 페이로드(안내 문구, 빈 컬렉션,
//! 플레이스홀더)로 바뀝니다.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::corpus::{Material, MaterialStore};
use crate::llm::{CompletionProvider, GeminiClient};
use crate::lookup::{KnowledgeLookup, WikipediaClient};
use crate::validation::{CodeValidator, Validation};

use super::context::{build_context_string, build_excerpts, ContextExcerpt};
use super::keywords::{gather_keywords, has_code_intent};
use super::postprocess::{
    parse_flashcards, parse_quiz, parse_video_script, strip_code_fence, Flashcard, QuizItem,
    VideoScript,
};
use super::prompt;
use super::rank::rank;

/// 내부 매칭이 이 수 미만이면 외부 폴백 조회
const EXTERNAL_FALLBACK_THRESHOLD: usize = 2;

// ============================================================================
// Types
// ============================================================================

/// 생성할 학습 자료 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Note,
    Code,
    Slide,
}

impl MaterialKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NOTE" => Some(MaterialKind::Note),
            "CODE" => Some(MaterialKind::Code),
            "SLIDE" => Some(MaterialKind::Slide),
            _ => None,
        }
    }
}

/// 질문 답변 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<ContextExcerpt>,
}

/// 생성된 학습 자료
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedMaterial {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

// ============================================================================
// RagService
// ============================================================================

/// RAG 파이프라인 서비스
///
/// 전역 싱글턴 없이 구성 요소를 생성 시점에 주입받습니다.
pub struct RagService {
    store: MaterialStore,
    llm: Box<dyn CompletionProvider>,
    lookup: Box<dyn KnowledgeLookup>,
    validator: CodeValidator,
}

impl RagService {
    /// 구성 요소를 직접 지정하여 생성
    pub fn new(
        store: MaterialStore,
        llm: Box<dyn CompletionProvider>,
        lookup: Box<dyn KnowledgeLookup>,
    ) -> Self {
        Self {
            store,
            llm,
            lookup,
            validator: CodeValidator::new(),
        }
    }

    /// 환경변수 기반 기본 구성 (Gemini + Wikipedia)
    pub fn from_env(store: MaterialStore) -> Result<Self> {
        Ok(Self::new(
            store,
            Box::new(GeminiClient::from_env()?),
            Box::new(WikipediaClient::new()?),
        ))
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// 질의로 자료 검색 (키워드 수집 → 후보 → 랭킹)
    ///
    /// 키워드가 전부 걸러지면 빈 결과를 반환합니다 (에러 아님).
    pub async fn search(&self, query: &str) -> Result<Vec<Material>> {
        let keywords = gather_keywords(self.llm.as_ref(), query).await;
        if keywords.is_empty() {
            tracing::debug!("Query reduced to no keywords: {}", query);
            return Ok(vec![]);
        }

        let candidates = self.store.find_by_keywords(&keywords)?;
        tracing::debug!("{} candidates for query '{}'", candidates.len(), query);

        Ok(rank(candidates, has_code_intent(query)))
    }

    /// 내부 매칭이 희소할 때만 외부 요약 조회
    async fn external_context(&self, term: &str, internal_count: usize) -> Option<String> {
        if internal_count >= EXTERNAL_FALLBACK_THRESHOLD {
            return None;
        }
        self.lookup.lookup(term).await
    }

    /// LLM 호출, 실패 시 안내 문구로 대체
    async fn complete_or_message(&self, prompt: &str) -> String {
        match self.llm.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Completion failed: {}", e);
                e.user_message()
            }
        }
    }

    // ------------------------------------------------------------------
    // Answering
    // ------------------------------------------------------------------

    /// 질문 답변 (출처 목록 포함)
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let ranked = self.search(query).await?;
        let excerpts = build_excerpts(&ranked);

        let external = self.external_context(query, excerpts.len()).await;
        let context = build_context_string(&ranked);

        let prompt = prompt::answer(&context, external.as_deref(), query);
        let answer = self.complete_or_message(&prompt).await;

        Ok(Answer {
            answer,
            sources: excerpts,
        })
    }

    /// 방글라 설명 모드 (출처 목록 없이 답변 텍스트만)
    pub async fn answer_in_bangla(&self, query: &str) -> Result<String> {
        let ranked = self.search(query).await?;
        let context = build_context_string(&ranked);

        let prompt = prompt::bangla_explanation(&context, query);
        Ok(self.complete_or_message(&prompt).await)
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// 학습 자료 생성 (노트/코드/슬라이드)
    ///
    /// CODE 결과물은 구문 검증을 거칩니다.
    pub async fn generate_material(
        &self,
        topic: &str,
        kind: MaterialKind,
    ) -> Result<GeneratedMaterial> {
        let ranked = self.search(topic).await?;
        let excerpts = build_excerpts(&ranked);

        // 내부+외부 결합 컨텍스트
        let mut context = build_context_string(&ranked);
        if let Some(extract) = self.external_context(topic, excerpts.len()).await {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&format!(
                "External Reference ({}):\n{}",
                crate::lookup::EXTERNAL_SOURCE_LABEL,
                extract
            ));
        }

        let prompt = prompt::learning_material(topic, kind, &context);
        let raw = match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Material generation failed: {}", e);
                return Ok(GeneratedMaterial {
                    content: e.user_message(),
                    validation: None,
                });
            }
        };

        // 지시에도 불구하고 펜스로 감싸 오는 경우 정리
        let content = strip_code_fence(&raw);

        let validation = if kind == MaterialKind::Code {
            Some(self.validator.validate_code(&content, "python"))
        } else {
            None
        };

        Ok(GeneratedMaterial {
            content,
            validation,
        })
    }

    /// 퀴즈 생성 (5문항 목표, 실패 시 빈 배열)
    pub async fn generate_quiz(&self, topic: &str) -> Result<Vec<QuizItem>> {
        let ranked = self.search(topic).await?;
        let context = build_context_string(&ranked);

        match self.llm.complete(&prompt::quiz(topic, &context)).await {
            Ok(text) => Ok(parse_quiz(&text)),
            Err(e) => {
                tracing::warn!("Quiz generation failed: {}", e.user_message());
                Ok(vec![])
            }
        }
    }

    /// 플래시카드 생성 (6장 목표, 실패 시 빈 배열)
    pub async fn generate_flashcards(&self, topic: &str) -> Result<Vec<Flashcard>> {
        let ranked = self.search(topic).await?;
        let context = build_context_string(&ranked);

        match self.llm.complete(&prompt::flashcards(topic, &context)).await {
            Ok(text) => Ok(parse_flashcards(&text)),
            Err(e) => {
                tracing::warn!("Flashcard generation failed: {}", e.user_message());
                Ok(vec![])
            }
        }
    }

    /// 영상 스크립트 생성
    ///
    /// 실패해도 항상 스토리보드 형태를 반환합니다. 쿼터 초과는 빈
    /// 스토리보드에 경고를, 그 외 실패는 플레이스홀더 장면에 error를
    /// 채워 구분합니다.
    pub async fn generate_video_script(&self, topic: &str) -> Result<VideoScript> {
        let ranked = self.search(topic).await?;
        let context = build_context_string(&ranked);

        match self.llm.complete(&prompt::video_script(topic, &context)).await {
            Ok(text) => Ok(parse_video_script(topic, &text)),
            Err(e) if e.is_quota() => Ok(VideoScript::quota_exceeded(e.user_message())),
            Err(e) => {
                tracing::warn!("Video script generation failed: {}", e);
                Ok(VideoScript::placeholder(topic, e.user_message()))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Category, FileType, NewMaterial};
    use crate::llm::CompletionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone)]
    enum MockMode {
        Ok(String),
        Quota,
        ConfigMissing,
        Upstream,
    }

    /// 호출 기록을 남기는 목 LLM
    #[derive(Clone)]
    struct MockLlm {
        calls: Arc<AtomicUsize>,
        last_prompt: Arc<Mutex<String>>,
        mode: MockMode,
    }

    impl MockLlm {
        fn ok(response: &str) -> Self {
            Self::with_mode(MockMode::Ok(response.to_string()))
        }

        fn with_mode(mode: MockMode) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                last_prompt: Arc::new(Mutex::new(String::new())),
                mode,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_prompt(&self) -> String {
            self.last_prompt.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for MockLlm {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            match &self.mode {
                MockMode::Ok(text) => Ok(text.clone()),
                MockMode::Quota => Err(CompletionError::QuotaExceeded),
                MockMode::ConfigMissing => Err(CompletionError::ConfigMissing),
                MockMode::Upstream => Err(CompletionError::Upstream("boom".to_string())),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    /// 호출 횟수를 세는 목 외부 조회
    #[derive(Clone)]
    struct MockLookup {
        calls: Arc<AtomicUsize>,
        extract: Option<String>,
    }

    impl MockLookup {
        fn with_extract(extract: &str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                extract: Some(extract.to_string()),
            }
        }

        fn empty() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                extract: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KnowledgeLookup for MockLookup {
        async fn lookup(&self, _term: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.extract.clone()
        }
    }

    fn test_store() -> (TempDir, MaterialStore) {
        let dir = TempDir::new().unwrap();
        let store = MaterialStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn add_material(store: &MaterialStore, title: &str, content: &str, file_type: FileType) {
        store
            .add_material(NewMaterial {
                title: title.to_string(),
                text_content: content.to_string(),
                category: Category::Theory,
                file_type,
                ..Default::default()
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_corpus_answer_uses_external_fallback() {
        let (_dir, store) = test_store();
        let llm = MockLlm::ok("Software engineering is the disciplined design of software.");
        let lookup = MockLookup::with_extract("Software engineering is an engineering discipline.");

        let service = RagService::new(store, Box::new(llm.clone()), Box::new(lookup.clone()));
        let result = service
            .answer("What are the core concepts of software engineering?")
            .await
            .unwrap();

        // 0건 < 2 이므로 외부 폴백 호출
        assert_eq!(lookup.call_count(), 1);
        assert!(result.sources.is_empty());

        // 프롬프트에 외부 출처 라벨만 등장하고 내부 출처는 없음
        let prompt = llm.last_prompt();
        assert!(prompt.contains("External Reference (Wikipedia):"));
        assert!(prompt.contains("No specific materials found."));
        assert!(!prompt.contains("Source: "));
    }

    #[tokio::test]
    async fn test_enough_matches_skip_external_fallback() {
        let (_dir, store) = test_store();
        for i in 0..3 {
            add_material(
                &store,
                &format!("Sorting Lecture {}", i),
                "Sorting algorithms compared.",
                FileType::Note,
            );
        }

        let llm = MockLlm::ok("answer");
        let lookup = MockLookup::with_extract("should not be used");

        let service = RagService::new(store, Box::new(llm.clone()), Box::new(lookup.clone()));
        let result = service.answer("sorting algorithms").await.unwrap();

        assert_eq!(lookup.call_count(), 0);
        assert_eq!(result.sources.len(), 3);
        assert!(!llm.last_prompt().contains("External Reference"));
    }

    #[tokio::test]
    async fn test_single_match_still_triggers_fallback() {
        let (_dir, store) = test_store();
        add_material(&store, "Graphs Intro", "Graph basics.", FileType::Pdf);

        let llm = MockLlm::ok("answer");
        let lookup = MockLookup::empty();

        let service = RagService::new(store, Box::new(llm), Box::new(lookup.clone()));
        let result = service.answer("graphs overview").await.unwrap();

        // 1건 < 2 이므로 폴백 시도, 실패(None)해도 요청은 성공
        assert_eq!(lookup.call_count(), 1);
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_short_query_makes_single_llm_call() {
        let (_dir, store) = test_store();
        let llm = MockLlm::ok("answer");

        let service = RagService::new(store, Box::new(llm.clone()), Box::new(MockLookup::empty()));
        service.answer("explain recursion simply").await.unwrap();

        // 3토큰 이하 → 확장 호출 없음, 답변 호출 1회만
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_code_intent_ranks_code_first() {
        let (_dir, store) = test_store();
        add_material(&store, "BFS Theory", "bfs traversal theory notes", FileType::Pdf);
        add_material(&store, "BFS Code", "def bfs(graph): ...", FileType::Code);

        let llm = MockLlm::ok("unused");
        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));

        let ranked = service.search("show bfs implementation").await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].file_type, FileType::Code);
        assert_eq!(ranked[1].file_type, FileType::Pdf);
    }

    #[tokio::test]
    async fn test_answer_embeds_sentinel_on_config_missing() {
        let (_dir, store) = test_store();
        let llm = MockLlm::with_mode(MockMode::ConfigMissing);

        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));
        let result = service.answer("what is a heap").await.unwrap();

        assert!(result.answer.contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_generate_code_material_strips_fence_and_validates() {
        let (_dir, store) = test_store();
        let llm = MockLlm::ok("```python\ndef add(a, b):\n    return a + b\n```");

        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));
        let result = service
            .generate_material("addition function", MaterialKind::Code)
            .await
            .unwrap();

        assert!(!result.content.contains("```"));
        let validation = result.validation.unwrap();
        assert!(validation.valid);
    }

    #[tokio::test]
    async fn test_generate_note_has_no_validation() {
        let (_dir, store) = test_store();
        let llm = MockLlm::ok("# Study Notes\n\n- point one");

        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));
        let result = service
            .generate_material("stacks", MaterialKind::Note)
            .await
            .unwrap();

        assert!(result.validation.is_none());
        assert!(result.content.contains("Study Notes"));
    }

    #[tokio::test]
    async fn test_generate_quiz_parses_and_absorbs_failure() {
        let (_dir, store) = test_store();

        let quiz_json = r#"[{"question": "Q", "options": ["a","b","c","d"],
                             "answer": "a", "explanation": "e"}]"#;
        let llm = MockLlm::ok(&format!("```json\n{}\n```", quiz_json));
        let service =
            RagService::new(store.clone(), Box::new(llm), Box::new(MockLookup::empty()));
        let items = service.generate_quiz("graphs").await.unwrap();
        assert_eq!(items.len(), 1);

        // 쿼터 초과 → 빈 배열, 에러 전파 없음
        let llm = MockLlm::with_mode(MockMode::Quota);
        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));
        let items = service.generate_quiz("graphs").await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_generate_video_script_failure_modes() {
        let (_dir, store) = test_store();

        // 쿼터 초과 → 빈 스토리보드 + 경고
        let llm = MockLlm::with_mode(MockMode::Quota);
        let service =
            RagService::new(store.clone(), Box::new(llm), Box::new(MockLookup::empty()));
        let script = service.generate_video_script("recursion").await.unwrap();
        assert_eq!(script.title, "Quota Exceeded");
        assert!(script.scenes.is_empty());
        assert!(script.error.as_deref().unwrap_or("").contains("429"));

        // 업스트림 실패 → 플레이스홀더 장면 + error
        let llm = MockLlm::with_mode(MockMode::Upstream);
        let service = RagService::new(store, Box::new(llm), Box::new(MockLookup::empty()));
        let script = service.generate_video_script("recursion").await.unwrap();
        assert!(!script.scenes.is_empty());
        assert!(script.error.is_some());
    }

    #[tokio::test]
    async fn test_bangla_mode_returns_plain_text() {
        let (_dir, store) = test_store();
        let llm = MockLlm::ok("রিকার্শন হলো একটি ফাংশন যা নিজেকে কল করে (recursion)।");

        let service = RagService::new(store, Box::new(llm.clone()), Box::new(MockLookup::empty()));
        let answer = service.answer_in_bangla("explain recursion").await.unwrap();

        assert!(answer.contains("recursion"));
        assert!(llm.last_prompt().contains("Bangla"));
    }
}

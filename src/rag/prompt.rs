//! 프롬프트 템플릿 - 작업별 지시문 조립
//!
//! 모든 템플릿은 단순 문자열 조립입니다. LLM 호출은 하지 않습니다.
//! 구조화 출력(퀴즈/플래시카드/영상 스크립트)은 JSON만 반환하도록
//! 명시적으로 지시하고, 파싱은 postprocess에서 담당합니다.

use crate::lookup::EXTERNAL_SOURCE_LABEL;

use super::service::MaterialKind;

/// 컨텍스트가 비었을 때 프롬프트에 넣는 대체 문구
const NO_CONTEXT_PLACEHOLDER: &str = "No specific materials found.";

fn context_or_placeholder(context: &str) -> &str {
    if context.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    }
}

/// 키워드 확장 요청
pub fn keyword_expansion(query: &str) -> String {
    format!(
        "List 5-7 technical keywords or synonyms useful for searching university course \
         materials related to this question: '{}'.\n\
         Reply with a comma-separated list only, no extra text.",
        query
    )
}

/// 질문 답변 프롬프트
///
/// 내부 컨텍스트 우선, 출처 제목 인용, 컨텍스트가 없으면
/// 일반 지식 기반임을 밝히도록 지시합니다.
pub fn answer(context: &str, external: Option<&str>, question: &str) -> String {
    let mut prompt = format!(
        "You are 'EduBot', a university academic assistant.\n\
         Use the provided Course Materials context to answer the student's question accurately.\n\n\
         Context:\n{}\n",
        context_or_placeholder(context)
    );

    if let Some(extract) = external {
        prompt.push_str(&format!(
            "\nExternal Reference ({}):\n{}\n",
            EXTERNAL_SOURCE_LABEL, extract
        ));
    }

    prompt.push_str(&format!(
        "\nQuestion: {}\n\n\
         Instructions:\n\
         - If context is found, summarize it accurately and cite the source titles.\n\
         - Prioritize Course Materials over the external reference.\n\
         - If no materials are relevant, answer based on general knowledge but clarify \
         it's not from the course.\n\
         - Keep the tone helpful and professional.",
        question
    ));

    prompt
}

/// 방글라(বাংলা) 설명 프롬프트 - 기술 용어는 영어 유지
pub fn bangla_explanation(context: &str, question: &str) -> String {
    format!(
        "You are 'EduBot', a university academic assistant.\n\
         Explain the following for a university student in Bangla (বাংলা).\n\
         Keep all technical terms in English - do not translate them.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Respond in Bangla only.",
        context_or_placeholder(context),
        question
    )
}

/// 학습 자료 생성 프롬프트 (노트/코드/슬라이드)
pub fn learning_material(topic: &str, kind: MaterialKind, context: &str) -> String {
    match kind {
        MaterialKind::Code => format!(
            "Write a clean, commented Python implementation for '{}'. \
             Use the following course context if relevant:\n{}\n\n\
             Output only the code, no markdown blocks.",
            topic, context
        ),
        MaterialKind::Note => format!(
            "Create structured study notes (Markdown) for '{}'. \
             Use this course context:\n{}",
            topic, context
        ),
        MaterialKind::Slide => format!(
            "Outline a 5-slide presentation for '{}'. \
             Include content for each slide. Context:\n{}",
            topic, context
        ),
    }
}

/// 퀴즈 생성 프롬프트 (5문항, JSON만)
pub fn quiz(topic: &str, context: &str) -> String {
    format!(
        "Generate a quiz for a university student on the topic: '{}'.\n\
         Use this course context if relevant:\n{}\n\n\
         Return ONLY a valid JSON array of exactly 5 objects with this structure:\n\
         [{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \
         \"answer\": \"...\", \"explanation\": \"...\"}}]\n\
         Each \"options\" array must contain exactly 4 strings.\n\
         Do not include any markdown formatting or extra text outside the JSON.",
        topic, context
    )
}

/// 플래시카드 생성 프롬프트 (6장, JSON만)
pub fn flashcards(topic: &str, context: &str) -> String {
    format!(
        "Generate flashcards for a university student on the topic: '{}'.\n\
         Use this course context if relevant:\n{}\n\n\
         Return ONLY a valid JSON array of exactly 6 objects with this structure:\n\
         [{{\"front\": \"...\", \"back\": \"...\"}}]\n\
         Do not include any markdown formatting or extra text outside the JSON.",
        topic, context
    )
}

/// 영상 스크립트 JSON 구조 예시
const VIDEO_SCRIPT_SHAPE: &str = r#"{
    "title": "Title",
    "duration": "mm:ss",
    "scenes": [
        {"time": "0:00-0:10", "visual": "Description", "audio": "Script"},
        ... (at least 3 scenes)
    ]
}"#;

/// 영상 스크립트/스토리보드 생성 프롬프트 (JSON만)
pub fn video_script(topic: &str, context: &str) -> String {
    format!(
        "Generate a video summary script and storyboard for a university student \
         on the topic: '{}'.\n\
         Use this course context if relevant:\n{}\n\n\
         Return the result ONLY as a valid JSON object with the following structure:\n\
         {}\n\
         Do not include any markdown formatting or extra text outside the JSON.",
        topic, context, VIDEO_SCRIPT_SHAPE
    )
}

// ============================================================================
// Tests
// ============================================================================

//! Text normalizer: single-shot LLM post-processing of noisy extractor output
//! into the canonical resume markdown shape.

use crate::llm::{CompletionOptions, CompletionService, LlmError};
use crate::prompts::RESUME_NORMALIZATION_PROMPT;

/// Coerces raw resume text (OCR output, Word dumps) into the fixed-label
/// markdown skeleton. One call, no retry, no adherence validation; a malformed
/// response degrades downstream field extraction to its defaults.
pub async fn normalize_resume(
    llm: &dyn CompletionService,
    raw_text: &str,
) -> Result<String, LlmError> {
    llm.complete(
        RESUME_NORMALIZATION_PROMPT,
        &format!("Resume text:\n\n{raw_text}"),
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(1200),
        },
    )
    .await
}

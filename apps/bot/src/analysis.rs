//! Analysis orchestrator and the response contract parser.
//!
//! The scoring prompt mandates labeled score lines at the end of the model
//! response; the parser pulls them out with anchored case-insensitive patterns
//! and falls back to per-field defaults. Extraction never fails, it only
//! degrades; the candidate record is written regardless.

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::llm::{CompletionOptions, CompletionService};
use crate::prompts::scoring_system_prompt;
use crate::repo::{insert_candidate, NewCandidate};

pub const SCORE_DEFAULT: &str = "0";
pub const NOT_DETERMINED: &str = "Not determined";

lazy_static! {
    static ref QUALITY_RE: Regex =
        Regex::new(r"(?i)Resume_quality:\s*(\d+)").expect("valid regex");
    static ref FIT_RE: Regex = Regex::new(r"(?i)Overall_fit:\s*(\d+)").expect("valid regex");
    static ref EXPERIENCE_RE: Regex =
        Regex::new(r"(?i)TOTAL_EXPERIENCE:\s*(\d+)").expect("valid regex");
    static ref NAME_RE: Regex = Regex::new(r"# Full name:\s*(.*)").expect("valid regex");
    static ref PHONE_RE: Regex = Regex::new(r"\*\*Phone:\*\*\s*(.*)").expect("valid regex");
}

/// Scores pulled out of a model analysis response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisScores {
    pub quality: String,
    pub fit: String,
    pub total_experience: String,
}

/// Result of one analysis run, already persisted. Scores and contact fields
/// live in the candidate row; the chat layer only needs these two.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub candidate_name: String,
    pub analysis_text: String,
}

/// Extracts the labeled scores from a free-text analysis response.
pub fn parse_analysis_response(text: &str) -> AnalysisScores {
    AnalysisScores {
        quality: capture(&QUALITY_RE, text).unwrap_or_else(|| SCORE_DEFAULT.to_string()),
        fit: capture(&FIT_RE, text).unwrap_or_else(|| SCORE_DEFAULT.to_string()),
        total_experience: capture(&EXPERIENCE_RE, text)
            .unwrap_or_else(|| NOT_DETERMINED.to_string()),
    }
}

/// Candidate name from the canonical resume markdown.
pub fn candidate_name(resume_text: &str) -> String {
    capture(&NAME_RE, resume_text).unwrap_or_else(|| NOT_DETERMINED.to_string())
}

/// Candidate phone from the canonical resume markdown.
pub fn candidate_phone(resume_text: &str) -> String {
    capture(&PHONE_RE, resume_text).unwrap_or_else(|| NOT_DETERMINED.to_string())
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scores a resume against a vacancy and always writes a candidate record;
/// there is no validation gate between extraction and storage.
pub async fn run_analysis(
    llm: &dyn CompletionService,
    pool: &SqlitePool,
    vacancy_title: &str,
    vacancy_text: &str,
    resume_text: &str,
    resume_url: &str,
) -> Result<AnalysisOutcome, AppError> {
    let analysis_text = llm
        .complete(
            &scoring_system_prompt(),
            &format!("V:{vacancy_text}\nR:{resume_text}"),
            CompletionOptions::default(),
        )
        .await?;

    let scores = parse_analysis_response(&analysis_text);
    let name = candidate_name(resume_text);
    let phone = candidate_phone(resume_text);

    insert_candidate(
        pool,
        &NewCandidate {
            full_name: name.clone(),
            phone,
            vacancy_name: vacancy_title.to_string(),
            quality_score: format!("{}/10", scores.quality),
            fit_score: format!("{}/10", scores.fit),
            total_experience: scores.total_experience,
            analysis_text: analysis_text.clone(),
            resume_url: resume_url.to_string(),
        },
    )
    .await?;

    Ok(AnalysisOutcome {
        candidate_name: name,
        analysis_text,
    })
}

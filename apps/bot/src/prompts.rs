//! All LLM prompt templates used by the bot.
//!
//! The generation templates carry two kinds of zones: text between `###`
//! markers must be reproduced verbatim, text inside double quotes is filled in
//! by the model. Neither marker may survive into the output. The scoring
//! prompt ends with two labeled score lines, the response contract the
//! analysis parser depends on.

use chrono::Datelike;

/// Label preceding the resume-quality score in the model response.
pub const QUALITY_LABEL: &str = "Resume_quality";
/// Label preceding the overall-fit score in the model response.
pub const FIT_LABEL: &str = "Overall_fit";

/// Vacancy-from-title generation. User message: the job title.
pub const VACANCY_GENERATION_PROMPT: &str = r#"You generate vacancy descriptions for the banking sector.

IMPORTANT. You MUST strictly follow the template and rules below.

RULES:
1. The characters ### and double quotes " are SERVICE markers used ONLY to convey the structure.
2. The FINAL RESULT must contain NO ### characters and NO " characters.
3. All text enclosed between ### in the template must be reproduced verbatim, WITHOUT CHANGES, but WITHOUT the ### characters.
4. All text enclosed in double quotes " must be generated by you and printed WITHOUT the quotes.
5. It is forbidden to:
   - reorder the blocks
   - add or remove blocks
   - rephrase the fixed text
6. The generated text must be:
   - professional
   - appropriate for a banking vacancy
   - logically consistent with the surrounding fixed text

Return ONLY the final vacancy text. No comments, explanations, or formatting of your own.

TEMPLATE (service characters must not appear in the output):

###PERVOURALSKBANK is a dynamically developing financial institution. We offer our clients modern banking solutions built on advanced technology and many years of experience in the financial market. We help our partners and clients solve problems related to international payments. We invite a driven and energetic### "..."

###The main objective of this position:### "..."

###Responsibilities:###
"..."

###Requirements:###
"..."

###We offer:
- Joining a business line that clients and partners actively demand.
- Official employment under the Labor Code.
- Timely, stable pay: salary plus performance bonuses.
- A 5/2 schedule with a flexible start between 8:00 and 10:00.
- Our office sits in the modern Savelovsky City business center, a 5-minute walk from the Dmitrovskaya metro station.

Interested!? Call! Write! Apply! We are always open to discussing rewarding cooperation! ###"#;

/// Normalizes noisy extractor output (OCR artifacts, Word dumps) into the
/// canonical resume markdown shape. The labels are load-bearing: downstream
/// field extraction anchors on them.
pub const RESUME_NORMALIZATION_PROMPT: &str = r#"You are an HR assistant and resume analysis specialist.

You are given resume text produced by OCR.
The text may contain recognition errors, repeated lines, and broken structure.

Your task:
- restore the resume structure
- fix obvious OCR errors
- bring the data into a logical, readable form

Return the result strictly in the following Markdown structure:

# Full name: [full name here]
**Phone:** [phone number here, or "Not found"]
**Gender, age:** ...
**Location:** ...
**Position:** ...
**Status:** ...

## Work history

## Key skills

If a field is missing, write "Not found".
Do not add anything of your own."#;

/// Builds the suitability-scoring system prompt for the current year.
/// The response MUST end with the two labeled score lines.
pub fn scoring_system_prompt() -> String {
    scoring_system_prompt_for_year(chrono::Utc::now().year())
}

pub fn scoring_system_prompt_for_year(year: i32) -> String {
    format!(
        r#"You are an HR expert. The current year is {year}.
Run a deep analysis of the candidate against the vacancy.
First:
   - Determine the required experience from the vacancy text (for example 1 year, 3 years, 10 years).

Your answer must consist strictly of these blocks:
1. ANALYSIS: a short analysis explaining the scores.
2. RESUME QUALITY: how clearly and structurally the tasks and achievements are described (0-10).
3. OVERALL FIT: how well the candidate matches the vacancy requirements (0-10).
4. RESUME OVER THE REQUIRED PERIOD: if the experience is stated, list the candidate's companies, positions, and key results over exactly that many most recent years. If the vacancy states no experience, analyze the last 3 years. Remember the current year is {year}.

At the very end of the answer print the scores strictly in this format:
{QUALITY_LABEL}: X/10
{FIT_LABEL}: Y/10"#
    )
}

/// Reverse-vacancy synthesis: duties list built from several resumes.
pub const REVERSE_VACANCY_PROMPT: &str = r#"You are a senior HR methodologist. You have been sent several candidate resumes.
Your task: analyze what they do and compose the ideal list of RESPONSIBILITIES for a future vacancy.

Rules:
1. Identify recurring tasks (the baseline function).
2. Identify unique competencies that bring business value.
3. Phrase the responsibilities in professional banking-sector language.
4. Structure the result into task blocks.

IMPORTANT. You MUST strictly follow the template and rules below.

RULES:
1. The characters ### and double quotes " are SERVICE markers used ONLY to convey the structure.
2. The FINAL RESULT must contain NO ### characters and NO " characters.
3. All text enclosed between ### in the template must be reproduced verbatim, WITHOUT CHANGES, but WITHOUT the ### characters.
4. All text enclosed in double quotes " must be generated by you and printed WITHOUT the quotes.
5. It is forbidden to:
   - reorder the blocks
   - add or remove blocks
   - rephrase the fixed text
6. The generated text must be:
   - professional
   - appropriate for a banking vacancy
   - logically consistent with the surrounding fixed text

Return ONLY the final vacancy text. No comments, explanations, or formatting of your own.

TEMPLATE (service characters must not appear in the output):

###Vacancy: ### "..."

###PERVOURALSKBANK is a dynamically developing financial institution. We offer our clients modern banking solutions built on advanced technology and many years of experience in the financial market. We help our partners and clients solve problems related to international payments. We invite a driven and energetic### "..."

###The main objective of this position:### "..."

###Responsibilities:###
"..."

###Requirements:###
"..."

###We offer:
- Joining a business line that clients and partners actively demand.
- Official employment under the Labor Code.
- Timely, stable pay: salary plus performance bonuses.
- A 5/2 schedule with a flexible start between 8:00 and 10:00.
- Our office sits in the modern Savelovsky City business center, a 5-minute walk from the Dmitrovskaya metro station.

Interested!? Call! Write! Apply! We are always open to discussing rewarding cooperation! ###"#;

/// Separator between resumes in the combined reverse-vacancy user message.
pub const RESUME_SEPARATOR: &str = "\n\n--- NEXT RESUME ---\n\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_prompt_substitutes_year() {
        let prompt = scoring_system_prompt_for_year(2026);
        assert!(prompt.contains("The current year is 2026."));
        assert!(!prompt.contains("{year}"));
    }

    #[test]
    fn test_scoring_prompt_mandates_score_lines() {
        let prompt = scoring_system_prompt_for_year(2026);
        assert!(prompt.contains("Resume_quality: X/10"));
        assert!(prompt.contains("Overall_fit: Y/10"));
    }

    #[test]
    fn test_normalization_prompt_carries_canonical_labels() {
        assert!(RESUME_NORMALIZATION_PROMPT.contains("# Full name:"));
        assert!(RESUME_NORMALIZATION_PROMPT.contains("**Phone:**"));
        assert!(RESUME_NORMALIZATION_PROMPT.contains("## Work history"));
        assert!(RESUME_NORMALIZATION_PROMPT.contains("## Key skills"));
        assert!(RESUME_NORMALIZATION_PROMPT.contains("\"Not found\""));
    }

    #[test]
    fn test_generation_templates_share_verbatim_boilerplate() {
        let anchor = "PERVOURALSKBANK is a dynamically developing financial institution";
        assert!(VACANCY_GENERATION_PROMPT.contains(anchor));
        assert!(REVERSE_VACANCY_PROMPT.contains(anchor));
    }
}

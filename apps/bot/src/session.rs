//! Per-chat conversation state. Each `SessionState` variant carries only the
//! fields that step needs; there are no stringly-typed method flags.

/// Provenance marker for resumes that arrived as a file or pasted text.
pub const MANUAL_UPLOAD: &str = "Manually uploaded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VacancyMethod {
    /// Generate a draft from a title; the draft must be explicitly resubmitted.
    Generate,
    /// Paste the final text; the title was collected in the previous step.
    Text { title: String },
    /// Scrape a job-board vacancy page.
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMethod {
    File,
    Text,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingVacancyTitle,
    AwaitingVacancyData {
        method: VacancyMethod,
    },
    AwaitingResumeData {
        method: ResumeMethod,
    },
    /// Looping collection phase for reverse-vacancy synthesis.
    CollectingResumes {
        batch: Vec<String>,
    },
}

/// The active vacancy loaded into this conversation.
#[derive(Debug, Clone)]
pub struct ActiveVacancy {
    pub title: String,
    pub text: String,
}

/// The active resume loaded into this conversation.
#[derive(Debug, Clone)]
pub struct ActiveResume {
    pub text: String,
    pub url: String,
}

/// Ephemeral state of one conversation. Owned exclusively by the dispatcher;
/// never shared across chats.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub state: SessionState,
    pub vacancy: Option<ActiveVacancy>,
    pub resume: Option<ActiveResume>,
    /// Most recent reverse-vacancy draft, kept for manual promotion to a
    /// saved vacancy.
    pub last_generated_draft: Option<String>,
}

impl Session {
    /// Full reset, used by /start and the back-to-menu action.
    pub fn reset(&mut self) {
        *self = Session::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::default();
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.vacancy.is_none());
        assert!(session.resume.is_none());
        assert!(session.last_generated_draft.is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = Session {
            state: SessionState::CollectingResumes {
                batch: vec!["resume one".to_string()],
            },
            vacancy: Some(ActiveVacancy {
                title: "Analyst".to_string(),
                text: "desc".to_string(),
            }),
            resume: Some(ActiveResume {
                text: "resume".to_string(),
                url: MANUAL_UPLOAD.to_string(),
            }),
            last_generated_draft: Some("draft".to_string()),
        };
        session.reset();
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.vacancy.is_none());
        assert!(session.resume.is_none());
        assert!(session.last_generated_draft.is_none());
    }
}

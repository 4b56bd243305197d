//! Conversation state machine: per-chat sessions, menus, and every
//! message/callback handler.
//!
//! `Dispatcher::handle_update` is the error boundary: any failure below it is
//! converted into a chat message and the event loop carries on. Session state
//! is mutated only after the fallible work succeeds, so a failed step can
//! always be retried as-is.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::analysis::run_analysis;
use crate::errors::AppError;
use crate::export::{candidates_workbook, export_file_name};
use crate::extract::extract_document_text;
use crate::normalize::normalize_resume;
use crate::prompts::{
    RESUME_SEPARATOR, REVERSE_VACANCY_PROMPT, VACANCY_GENERATION_PROMPT,
};
use crate::repo;
use crate::scrape;
use crate::session::{
    ActiveResume, ActiveVacancy, ResumeMethod, Session, SessionState, VacancyMethod,
    MANUAL_UPLOAD,
};
use crate::state::AppState;
use crate::telegram::{
    escape_markdown, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
};

/// Vacancy names are truncated to this many characters in callback payloads
/// (the Bot API caps callback data at 64 bytes); lookups go by prefix.
const CALLBACK_NAME_LEN: usize = 20;
/// Reverse-vacancy synthesis needs at least this many resumes.
const MIN_REVERSE_RESUMES: usize = 2;

// ── Keyboards ──

fn main_menu_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::new("1️⃣ Set vacancy", "set_vacancy")],
            vec![InlineKeyboardButton::new("2️⃣ Load resume", "set_resume")],
            vec![InlineKeyboardButton::new("📊 Analyze & save", "run_analysis")],
            vec![InlineKeyboardButton::new("📋 Candidate list", "view_candidates")],
            vec![InlineKeyboardButton::new("🗑 Close vacancy", "close_vacancy")],
        ],
    }
}

fn vacancy_method_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::new("✍ From a title", "vac_gen")],
            vec![InlineKeyboardButton::new("📄 Text", "vac_text")],
            vec![InlineKeyboardButton::new("🔗 Job-board link", "vac_link")],
            vec![InlineKeyboardButton::new("📁 From the store", "vac_db")],
            vec![InlineKeyboardButton::new("🪄 Vacancy from resumes", "reverse_vac")],
        ],
    }
}

fn resume_method_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::new("📎 File (PDF / Word)", "res_file")],
            vec![InlineKeyboardButton::new("📝 Text", "res_text")],
            vec![InlineKeyboardButton::new("🔗 Job-board link", "res_link")],
        ],
    }
}

fn reverse_collect_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton::new(
            "✨ Compose responsibilities",
            "generate_reverse_vac",
        )]],
    }
}

fn name_pick_kb(names: &[String], callback_prefix: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: names
            .iter()
            .map(|name| {
                let short: String = name.chars().take(CALLBACK_NAME_LEN).collect();
                vec![InlineKeyboardButton::new(
                    name.clone(),
                    format!("{callback_prefix}{short}"),
                )]
            })
            .collect(),
    }
}

// ── Dispatcher ──

pub struct Dispatcher {
    state: AppState,
    sessions: HashMap<i64, Session>,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            sessions: HashMap::new(),
        }
    }

    fn session(&mut self, chat_id: i64) -> &mut Session {
        self.sessions.entry(chat_id).or_default()
    }

    /// Entry point for one inbound event. Never returns an error: failures
    /// become a chat message and the session survives for a retry.
    pub async fn handle_update(&mut self, update: Update) {
        let chat_id = update
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .or_else(|| {
                update
                    .callback_query
                    .as_ref()
                    .and_then(|c| c.message.as_ref())
                    .map(|m| m.chat.id)
            });

        let result = if let Some(message) = update.message {
            self.handle_message(message).await
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await
        } else {
            Ok(())
        };

        if let Err(e) = result {
            warn!("Update handling failed: {e}");
            if let Some(chat_id) = chat_id {
                if let Err(send_err) = self
                    .state
                    .chat
                    .send_message(chat_id, &e.user_message())
                    .await
                {
                    warn!("Could not deliver the error notice: {send_err}");
                }
            }
        }
    }

    // ── Messages ──

    async fn handle_message(&mut self, message: Message) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let chat = self.state.chat.clone();

        match message.text.as_deref() {
            Some("/start") => {
                self.session(chat_id).reset();
                chat.send_message_with_keyboard(
                    chat_id,
                    "👋 Hi! I am the AI HR assistant.\nPick an action:",
                    &main_menu_kb(),
                )
                .await?;
                return Ok(());
            }
            Some("/help") => {
                chat.send_message(
                    chat_id,
                    "📖 How to use me:\n1. Set a vacancy.\n2. Load a resume.\n\
                     3. Press analyze, the result is stored automatically.",
                )
                .await?;
                return Ok(());
            }
            _ => {}
        }

        match self.session(chat_id).state.clone() {
            SessionState::Idle => {
                chat.send_message_with_keyboard(chat_id, "Pick an action:", &main_menu_kb())
                    .await?;
                Ok(())
            }
            SessionState::AwaitingVacancyTitle => {
                let Some(title) = message.text.clone().filter(|t| !t.trim().is_empty()) else {
                    chat.send_message(chat_id, "Send the vacancy title as text.").await?;
                    return Ok(());
                };
                let title = title.trim().to_string();
                self.session(chat_id).state = SessionState::AwaitingVacancyData {
                    method: VacancyMethod::Text { title },
                };
                chat.send_message(chat_id, "✅ Title accepted. Now send the vacancy text:")
                    .await?;
                Ok(())
            }
            SessionState::AwaitingVacancyData { method } => {
                self.handle_vacancy_input(chat_id, &message, method).await
            }
            SessionState::AwaitingResumeData { method } => {
                self.handle_resume_input(chat_id, &message, method).await
            }
            SessionState::CollectingResumes { batch } => {
                self.collect_resume(chat_id, &message, batch).await
            }
        }
    }

    async fn handle_vacancy_input(
        &mut self,
        chat_id: i64,
        message: &Message,
        method: VacancyMethod,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        let text = message
            .text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Precondition("Send the vacancy as text.".to_string()))?;
        let text = text.trim().to_string();

        match method {
            VacancyMethod::Generate => {
                let draft = self
                    .state
                    .llm
                    .complete(VACANCY_GENERATION_PROMPT, &text, Default::default())
                    .await?;
                chat.send_message(chat_id, &format!("Draft:\n{draft}")).await?;
                chat.send_message(chat_id, "Send the final vacancy text:").await?;
                // Drafts are never auto-saved: the flow switches to the paste
                // branch and waits for an explicit resubmission.
                self.session(chat_id).state = SessionState::AwaitingVacancyData {
                    method: VacancyMethod::Text { title: text },
                };
                Ok(())
            }
            VacancyMethod::Text { title } => {
                self.save_active_vacancy(chat_id, title, text).await
            }
            VacancyMethod::Link => {
                let html = scrape::fetch_html(&text, None).await?;
                let body = scrape::extract_vacancy_page(&html);
                let title = body
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches('#')
                    .trim()
                    .to_string();
                self.save_active_vacancy(chat_id, title, body).await
            }
        }
    }

    async fn save_active_vacancy(
        &mut self,
        chat_id: i64,
        title: String,
        text: String,
    ) -> Result<(), AppError> {
        repo::upsert_vacancy(&self.state.db, &title, &text).await?;
        info!("Vacancy '{title}' saved for chat {chat_id}");

        let session = self.session(chat_id);
        session.vacancy = Some(ActiveVacancy {
            title: title.clone(),
            text,
        });
        session.state = SessionState::Idle;

        self.state
            .chat
            .send_message_with_keyboard(
                chat_id,
                &format!("🎯 Vacancy '{title}' saved!"),
                &main_menu_kb(),
            )
            .await?;
        Ok(())
    }

    async fn handle_resume_input(
        &mut self,
        chat_id: i64,
        message: &Message,
        method: ResumeMethod,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();

        let mut resume_url = MANUAL_UPLOAD.to_string();
        let resume_text = if let Some(document) = &message.document {
            let file_name = document.file_name.clone().unwrap_or_else(|| "upload".to_string());
            let bytes = chat.download_document(&document.file_id).await?;
            let raw = extract_document_text(&bytes, &file_name)?;
            // Mandatory LLM pass: guarantees the canonical labels the
            // analysis step anchors on.
            normalize_resume(self.state.llm.as_ref(), &raw).await?
        } else {
            match method {
                ResumeMethod::Link => {
                    let url = message.text.clone().filter(|t| !t.trim().is_empty()).ok_or_else(
                        || AppError::Precondition("Send the resume page link.".to_string()),
                    )?;
                    let url = url.trim().to_string();
                    let text =
                        scrape::extract_resume_page(&url, &self.state.config.cookies_path).await;
                    if text == scrape::RESUME_FETCH_FAILED {
                        return Err(AppError::Precondition(text));
                    }
                    resume_url = url;
                    text
                }
                ResumeMethod::File | ResumeMethod::Text => {
                    message.text.clone().filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                        AppError::Precondition(
                            "Send a PDF/DOCX file or the resume text.".to_string(),
                        )
                    })?
                }
            }
        };

        if resume_text.trim().is_empty() {
            chat.send_message(chat_id, "⚠️ Could not extract any data. Try another file.")
                .await?;
            return Ok(());
        }

        let session = self.session(chat_id);
        session.resume = Some(ActiveResume {
            text: resume_text,
            url: resume_url,
        });
        session.state = SessionState::Idle;

        chat.send_message_with_keyboard(chat_id, "✅ Resume processed!", &main_menu_kb())
            .await?;
        Ok(())
    }

    async fn collect_resume(
        &mut self,
        chat_id: i64,
        message: &Message,
        mut batch: Vec<String>,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();

        if let Some(document) = &message.document {
            let file_name = document.file_name.clone().unwrap_or_else(|| "upload".to_string());
            let bytes = chat.download_document(&document.file_id).await?;
            let raw = extract_document_text(&bytes, &file_name)?;
            let normalized = normalize_resume(self.state.llm.as_ref(), &raw).await?;
            batch.push(normalized);
            chat.send_message(chat_id, &format!("✅ File '{file_name}' added.")).await?;
        } else if let Some(text) = message.text.clone().filter(|t| !t.trim().is_empty()) {
            batch.push(text.trim().to_string());
            chat.send_message(chat_id, "✅ Text added.").await?;
        }

        let count = batch.len();
        self.session(chat_id).state = SessionState::CollectingResumes { batch };
        chat.send_message(
            chat_id,
            &format!(
                "The batch now holds {count} resume(s). Send more, or press the button above to generate."
            ),
        )
        .await?;
        Ok(())
    }

    // ── Callbacks ──

    async fn handle_callback(&mut self, callback: CallbackQuery) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        let Some(origin) = callback.message.as_ref() else {
            chat.answer_callback(&callback.id, None).await?;
            return Ok(());
        };
        let chat_id = origin.chat.id;
        let message_id = origin.message_id;
        let data = callback.data.clone().unwrap_or_default();

        match data.as_str() {
            "start" => {
                self.session(chat_id).reset();
                chat.edit_message(chat_id, message_id, "Main menu:", Some(&main_menu_kb()))
                    .await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "set_vacancy" => {
                chat.edit_message(
                    chat_id,
                    message_id,
                    "How to add the vacancy:",
                    Some(&vacancy_method_kb()),
                )
                .await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "set_resume" => {
                chat.edit_message(
                    chat_id,
                    message_id,
                    "How to add the resume:",
                    Some(&resume_method_kb()),
                )
                .await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "vac_gen" => {
                self.session(chat_id).state = SessionState::AwaitingVacancyData {
                    method: VacancyMethod::Generate,
                };
                chat.send_message(chat_id, "Send a title to generate from:").await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "vac_text" => {
                self.session(chat_id).state = SessionState::AwaitingVacancyTitle;
                chat.send_message(chat_id, "Enter the vacancy title:").await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "vac_link" => {
                self.session(chat_id).state = SessionState::AwaitingVacancyData {
                    method: VacancyMethod::Link,
                };
                chat.send_message(chat_id, "Send the vacancy page link:").await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "vac_db" => {
                let names = repo::list_vacancy_names(&self.state.db).await?;
                if names.is_empty() {
                    chat.answer_callback(&callback.id, Some("The vacancy store is empty."))
                        .await?;
                } else {
                    chat.edit_message(
                        chat_id,
                        message_id,
                        "Pick a saved vacancy:",
                        Some(&name_pick_kb(&names, "selvac_")),
                    )
                    .await?;
                    chat.answer_callback(&callback.id, None).await?;
                }
            }
            "reverse_vac" => {
                self.session(chat_id).state = SessionState::CollectingResumes { batch: Vec::new() };
                chat.send_message_with_keyboard(
                    chat_id,
                    "📥 Send several resumes (PDF or text), one by one.\n\n\
                     When you are done, press the button below 👇",
                    &reverse_collect_kb(),
                )
                .await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "generate_reverse_vac" => {
                self.generate_reverse_vacancy(chat_id, &callback.id).await?;
            }
            "res_file" | "res_text" | "res_link" => {
                let method = match data.as_str() {
                    "res_file" => ResumeMethod::File,
                    "res_link" => ResumeMethod::Link,
                    _ => ResumeMethod::Text,
                };
                self.session(chat_id).state = SessionState::AwaitingResumeData { method };
                chat.send_message(chat_id, "Send the file, text, or link:").await?;
                chat.answer_callback(&callback.id, None).await?;
            }
            "run_analysis" => {
                self.run_analysis_action(chat_id, &callback.id).await?;
            }
            "view_candidates" => {
                let names = repo::list_vacancy_names(&self.state.db).await?;
                if names.is_empty() {
                    chat.answer_callback(&callback.id, Some("The store is empty.")).await?;
                } else {
                    chat.edit_message(
                        chat_id,
                        message_id,
                        "Candidates by vacancy:",
                        Some(&name_pick_kb(&names, "list_")),
                    )
                    .await?;
                    chat.answer_callback(&callback.id, None).await?;
                }
            }
            "close_vacancy" => {
                let names = repo::list_vacancy_names(&self.state.db).await?;
                if names.is_empty() {
                    chat.answer_callback(&callback.id, Some("No vacancies to close.")).await?;
                } else {
                    chat.edit_message(
                        chat_id,
                        message_id,
                        "Pick a vacancy to DELETE:",
                        Some(&name_pick_kb(&names, "del_")),
                    )
                    .await?;
                    chat.answer_callback(&callback.id, None).await?;
                }
            }
            other => {
                if let Some(prefix) = other.strip_prefix("selvac_") {
                    self.select_vacancy(chat_id, &callback.id, prefix).await?;
                } else if let Some(prefix) = other.strip_prefix("list_") {
                    self.list_candidates(chat_id, &callback.id, prefix).await?;
                } else if let Some(prefix) = other.strip_prefix("excel_") {
                    self.export_candidates(chat_id, &callback.id, prefix).await?;
                } else if let Some(prefix) = other.strip_prefix("del_") {
                    self.delete_vacancy(chat_id, message_id, &callback.id, prefix).await?;
                } else {
                    chat.answer_callback(&callback.id, None).await?;
                }
            }
        }
        Ok(())
    }

    async fn generate_reverse_vacancy(
        &mut self,
        chat_id: i64,
        callback_id: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();

        let SessionState::CollectingResumes { batch } = self.session(chat_id).state.clone()
        else {
            chat.answer_callback(callback_id, Some("Start the resume collection first."))
                .await?;
            return Ok(());
        };

        if batch.len() < MIN_REVERSE_RESUMES {
            // Non-fatal: the collection state (and the batch) stays as-is.
            chat.answer_callback(callback_id, Some("⚠️ Send at least 2 resumes first!"))
                .await?;
            return Ok(());
        }

        chat.answer_callback(callback_id, None).await?;
        chat.send_message(
            chat_id,
            "⌛ Studying the candidates' experience and composing the task list...",
        )
        .await?;

        let combined = batch.join(RESUME_SEPARATOR);
        let duties = self
            .state
            .llm
            .complete(
                REVERSE_VACANCY_PROMPT,
                &format!("Resumes to analyze:\n{combined}"),
                Default::default(),
            )
            .await?;

        let session = self.session(chat_id);
        session.last_generated_draft = Some(duties.clone());
        session.state = SessionState::Idle;

        chat.send_message(chat_id, &format!("📋 Composed responsibilities:\n\n{duties}"))
            .await?;
        chat.send_message_with_keyboard(
            chat_id,
            "You can copy this text or use it to create a new vacancy.",
            &main_menu_kb(),
        )
        .await?;
        Ok(())
    }

    async fn run_analysis_action(
        &mut self,
        chat_id: i64,
        callback_id: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        let session = self.session(chat_id);
        let (Some(vacancy), Some(resume)) = (session.vacancy.clone(), session.resume.clone())
        else {
            chat.answer_callback(callback_id, Some("⚠️ No data to analyze yet!")).await?;
            return Ok(());
        };

        chat.answer_callback(callback_id, None).await?;
        chat.send_message(chat_id, "⌛ Analyzing...").await?;

        let outcome = run_analysis(
            self.state.llm.as_ref(),
            &self.state.db,
            &vacancy.title,
            &vacancy.text,
            &resume.text,
            &resume.url,
        )
        .await?;

        // Markdown parse mode, so the escapes render as the literal characters
        // instead of stray backslashes.
        chat.send_markdown(
            chat_id,
            &format!(
                "📊 Analysis for {}:\n\n{}",
                escape_markdown(&outcome.candidate_name),
                escape_markdown(&outcome.analysis_text)
            ),
        )
        .await?;
        chat.send_message_with_keyboard(chat_id, "✅ Result saved.", &main_menu_kb())
            .await?;
        Ok(())
    }

    async fn select_vacancy(
        &mut self,
        chat_id: i64,
        callback_id: &str,
        prefix: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        match repo::find_vacancy_by_prefix(&self.state.db, prefix).await? {
            Some(vacancy) => {
                let title = vacancy.name.clone();
                self.session(chat_id).vacancy = Some(ActiveVacancy {
                    title: vacancy.name,
                    text: vacancy.description,
                });
                chat.send_message_with_keyboard(
                    chat_id,
                    &format!("✅ Selected vacancy: {title}"),
                    &main_menu_kb(),
                )
                .await?;
                chat.answer_callback(callback_id, None).await?;
            }
            None => {
                chat.answer_callback(callback_id, Some("That vacancy is gone from the store."))
                    .await?;
            }
        }
        Ok(())
    }

    async fn list_candidates(
        &mut self,
        chat_id: i64,
        callback_id: &str,
        prefix: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        let rows = repo::find_candidates_by_vacancy_prefix(&self.state.db, prefix).await?;
        if rows.is_empty() {
            chat.answer_callback(callback_id, Some("No candidates yet.")).await?;
            return Ok(());
        }

        let lines: Vec<String> = rows
            .iter()
            .map(|c| {
                format!(
                    "👤 {} ({})\n📞 {}\n🔗 {}\n---",
                    c.full_name, c.fit_score, c.phone, c.resume_url
                )
            })
            .collect();
        let text = format!("👥 Analysis results:\n\n{}", lines.join("\n"));

        let kb = InlineKeyboardMarkup {
            inline_keyboard: vec![
                vec![InlineKeyboardButton::new(
                    "📥 Download Excel",
                    format!("excel_{prefix}"),
                )],
                vec![InlineKeyboardButton::new("⬅️ Back to menu", "start")],
            ],
        };
        chat.send_message_with_keyboard(chat_id, &text, &kb).await?;
        chat.answer_callback(callback_id, None).await?;
        Ok(())
    }

    async fn export_candidates(
        &mut self,
        chat_id: i64,
        callback_id: &str,
        prefix: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        chat.answer_callback(callback_id, None).await?;

        let rows = repo::find_candidates_by_vacancy_prefix(&self.state.db, prefix).await?;
        if rows.is_empty() {
            chat.send_message(chat_id, "❌ No data found.").await?;
            return Ok(());
        }

        let vacancy_name = rows[0].vacancy_name.clone();
        let bytes = candidates_workbook(&rows).map_err(|e| AppError::Export(e.to_string()))?;
        chat.send_document(
            chat_id,
            &export_file_name(prefix),
            bytes,
            &format!("📊 Exported candidate list for vacancy: {vacancy_name}"),
        )
        .await?;
        Ok(())
    }

    async fn delete_vacancy(
        &mut self,
        chat_id: i64,
        message_id: i64,
        callback_id: &str,
        prefix: &str,
    ) -> Result<(), AppError> {
        let chat = self.state.chat.clone();
        repo::delete_vacancy_and_candidates(&self.state.db, prefix).await?;
        chat.answer_callback(callback_id, Some("✅ Vacancy and its candidates deleted."))
            .await?;
        chat.edit_message(chat_id, message_id, "Done. What next?", Some(&main_menu_kb()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use sqlx::SqlitePool;

    use super::*;
    use crate::config::Config;
    use crate::db::init_schema;
    use crate::llm::{CompletionOptions, CompletionService, LlmError};
    use crate::telegram::{Chat, ChatApi, TelegramError};

    // ── Fakes ──

    #[derive(Default)]
    struct FakeChat {
        texts: Mutex<Vec<(i64, String)>>,
        markdown: Mutex<Vec<(i64, String)>>,
        alerts: Mutex<Vec<String>>,
        documents: Mutex<Vec<(String, usize)>>,
        files: Mutex<StdHashMap<String, Vec<u8>>>,
    }

    impl FakeChat {
        fn last_text(&self) -> String {
            self.texts.lock().unwrap().last().map(|(_, t)| t.clone()).unwrap_or_default()
        }

        fn all_texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        fn markdown_texts(&self) -> Vec<String> {
            self.markdown.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        fn alerts(&self) -> Vec<String> {
            self.alerts.lock().unwrap().clone()
        }

        fn put_file(&self, file_id: &str, bytes: Vec<u8>) {
            self.files.lock().unwrap().insert(file_id.to_string(), bytes);
        }
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
            self.texts.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_markdown(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
            self.markdown.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_message_with_keyboard(
            &self,
            chat_id: i64,
            text: &str,
            _keyboard: &InlineKeyboardMarkup,
        ) -> Result<(), TelegramError> {
            self.texts.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn edit_message(
            &self,
            chat_id: i64,
            _message_id: i64,
            text: &str,
            _keyboard: Option<&InlineKeyboardMarkup>,
        ) -> Result<(), TelegramError> {
            self.texts.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn answer_callback(
            &self,
            _callback_id: &str,
            alert: Option<&str>,
        ) -> Result<(), TelegramError> {
            if let Some(alert) = alert {
                self.alerts.lock().unwrap().push(alert.to_string());
            }
            Ok(())
        }

        async fn send_document(
            &self,
            _chat_id: i64,
            file_name: &str,
            bytes: Vec<u8>,
            _caption: &str,
        ) -> Result<(), TelegramError> {
            self.documents.lock().unwrap().push((file_name.to_string(), bytes.len()));
            Ok(())
        }

        async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
            self.files
                .lock()
                .unwrap()
                .get(file_id)
                .cloned()
                .ok_or_else(|| TelegramError::Api("unknown file".to_string()))
        }
    }

    /// Returns queued responses in order; an empty queue turns into an error,
    /// which doubles as the completion-failure fixture.
    #[derive(Default)]
    struct FakeCompletion {
        responses: Mutex<Vec<String>>,
    }

    impl FakeCompletion {
        fn queue(&self, response: &str) {
            self.responses.lock().unwrap().push(response.to_string());
        }
    }

    #[async_trait]
    impl CompletionService for FakeCompletion {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: CompletionOptions,
        ) -> Result<String, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(LlmError::EmptyContent)
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    // ── Harness ──

    async fn setup() -> (Dispatcher, Arc<FakeChat>, Arc<FakeCompletion>, SqlitePool) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();

        let chat = Arc::new(FakeChat::default());
        let llm = Arc::new(FakeCompletion::default());
        let state = AppState {
            db: pool.clone(),
            llm: llm.clone(),
            chat: chat.clone(),
            config: Config {
                telegram_bot_token: "test-token".to_string(),
                openai_api_key: "test-key".to_string(),
                database_url: "sqlite::memory:".to_string(),
                cookies_path: "/nonexistent/cookies.json".to_string(),
                rust_log: "info".to_string(),
            },
        };
        (Dispatcher::new(state), chat, llm, pool)
    }

    const CHAT: i64 = 100;

    fn text_update(update_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: CHAT },
                text: Some(text.to_string()),
                document: None,
            }),
            callback_query: None,
        }
    }

    fn document_update(update_id: i64, file_id: &str, file_name: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: CHAT },
                text: None,
                document: Some(crate::telegram::Document {
                    file_id: file_id.to_string(),
                    file_name: Some(file_name.to_string()),
                }),
            }),
            callback_query: None,
        }
    }

    fn callback_update(update_id: i64, data: &str) -> Update {
        Update {
            update_id,
            message: None,
            callback_query: Some(CallbackQuery {
                id: format!("cb{update_id}"),
                data: Some(data.to_string()),
                message: Some(Message {
                    message_id: update_id,
                    chat: Chat { id: CHAT },
                    text: None,
                    document: None,
                }),
            }),
        }
    }

    fn docx_bytes(text: &str) -> Vec<u8> {
        use docx_rs::{Docx, Paragraph, Run};
        let mut buffer = std::io::Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            .build()
            .pack(&mut buffer)
            .unwrap();
        buffer.into_inner()
    }

    // ── Scenarios ──

    #[tokio::test]
    async fn test_start_shows_main_menu() {
        let (mut dispatcher, chat, _llm, _pool) = setup().await;
        dispatcher.handle_update(text_update(1, "/start")).await;
        assert!(chat.last_text().contains("Pick an action"));
    }

    #[tokio::test]
    async fn test_paste_text_vacancy_end_to_end() {
        let (mut dispatcher, chat, _llm, pool) = setup().await;
        dispatcher.handle_update(text_update(1, "/start")).await;
        dispatcher.handle_update(callback_update(2, "set_vacancy")).await;
        dispatcher.handle_update(callback_update(3, "vac_text")).await;
        dispatcher.handle_update(text_update(4, "Backend Developer")).await;
        dispatcher
            .handle_update(text_update(5, "We are hiring a backend developer."))
            .await;

        assert!(chat.last_text().contains("'Backend Developer' saved"));
        let names = repo::list_vacancy_names(&pool).await.unwrap();
        assert_eq!(names, vec!["Backend Developer".to_string()]);
        let vacancy = repo::find_vacancy_by_prefix(&pool, "Backend").await.unwrap().unwrap();
        assert_eq!(vacancy.description, "We are hiring a backend developer.");
    }

    #[tokio::test]
    async fn test_generated_draft_requires_explicit_resubmission() {
        let (mut dispatcher, chat, llm, pool) = setup().await;
        llm.queue("GENERATED VACANCY DRAFT");

        dispatcher.handle_update(callback_update(1, "vac_gen")).await;
        dispatcher.handle_update(text_update(2, "Payments Analyst")).await;

        // Draft shown but nothing persisted yet.
        assert!(chat.all_texts().iter().any(|t| t.contains("GENERATED VACANCY DRAFT")));
        assert!(repo::list_vacancy_names(&pool).await.unwrap().is_empty());

        // The user approves by sending the final text.
        dispatcher.handle_update(text_update(3, "Final vacancy body.")).await;
        let vacancy = repo::find_vacancy_by_prefix(&pool, "Payments").await.unwrap().unwrap();
        assert_eq!(vacancy.description, "Final vacancy body.");
    }

    #[tokio::test]
    async fn test_text_resume_then_analysis_persists_candidate() {
        let (mut dispatcher, chat, llm, pool) = setup().await;

        dispatcher.handle_update(callback_update(1, "vac_text")).await;
        dispatcher.handle_update(text_update(2, "Analyst")).await;
        dispatcher.handle_update(text_update(3, "SQL, reporting, settlements.")).await;

        dispatcher.handle_update(callback_update(4, "res_text")).await;
        dispatcher
            .handle_update(text_update(
                5,
                "# Full name: Ivan Petrov\n**Phone:** +7 900 123-45-67\n\n## Work history\nBank ops.",
            ))
            .await;

        llm.queue("ANALYSIS: strong match.\nResume_quality: 7/10\nOverall_fit: 9/10");
        dispatcher.handle_update(callback_update(6, "run_analysis")).await;

        assert!(chat.markdown_texts().iter().any(|t| t.contains("Analysis for Ivan Petrov")));
        let rows = repo::find_candidates_by_vacancy_prefix(&pool, "Analyst").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name, "Ivan Petrov");
        assert_eq!(rows[0].quality_score, "7/10");
        assert_eq!(rows[0].fit_score, "9/10");
        assert_eq!(rows[0].resume_url, MANUAL_UPLOAD);
    }

    #[tokio::test]
    async fn test_analysis_message_uses_markdown_with_escapes() {
        let (mut dispatcher, chat, llm, _pool) = setup().await;

        dispatcher.handle_update(callback_update(1, "vac_text")).await;
        dispatcher.handle_update(text_update(2, "Analyst")).await;
        dispatcher.handle_update(text_update(3, "Vacancy body.")).await;
        dispatcher.handle_update(callback_update(4, "res_text")).await;
        dispatcher.handle_update(text_update(5, "# Full name: Anna\n**Phone:** 1")).await;

        llm.queue("**Strong profile** with `SQL`\nResume_quality: 7/10\nOverall_fit: 8/10");
        dispatcher.handle_update(callback_update(6, "run_analysis")).await;

        // The analysis goes through the Markdown channel with the formatting
        // characters escaped, so the chat shows them as-is.
        let markdown = chat.markdown_texts();
        assert_eq!(markdown.len(), 1);
        assert!(markdown[0].contains("\\*\\*Strong profile\\*\\*"));
        assert!(markdown[0].contains("\\`SQL\\`"));
        assert!(!chat.all_texts().iter().any(|t| t.contains("Strong profile")));
    }

    #[tokio::test]
    async fn test_resume_link_fetch_failure_keeps_waiting_state() {
        let (mut dispatcher, chat, _llm, _pool) = setup().await;

        // The configured cookies file does not exist, so the fetch fails
        // before any network activity and yields the failure marker.
        dispatcher.handle_update(callback_update(1, "res_link")).await;
        dispatcher.handle_update(text_update(2, "https://example.com/resume/1")).await;
        assert!(chat.last_text().contains("Could not fetch the resume page"));

        let session = dispatcher.sessions.get(&CHAT).unwrap();
        assert_eq!(
            session.state,
            SessionState::AwaitingResumeData {
                method: ResumeMethod::Link
            }
        );
        assert!(session.resume.is_none());

        // Still waiting for a link: a second attempt is handled the same way,
        // not treated as idle chatter.
        dispatcher.handle_update(text_update(3, "https://example.com/resume/2")).await;
        assert!(chat.last_text().contains("Could not fetch the resume page"));
    }

    #[tokio::test]
    async fn test_analysis_without_data_is_rejected_inline() {
        let (mut dispatcher, chat, _llm, pool) = setup().await;
        dispatcher.handle_update(callback_update(1, "run_analysis")).await;
        assert!(chat.alerts().iter().any(|a| a.contains("No data to analyze")));
        assert!(repo::find_candidates_by_vacancy_prefix(&pool, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_keeps_session_for_retry() {
        let (mut dispatcher, chat, llm, pool) = setup().await;

        dispatcher.handle_update(callback_update(1, "vac_text")).await;
        dispatcher.handle_update(text_update(2, "Analyst")).await;
        dispatcher.handle_update(text_update(3, "Vacancy body.")).await;
        dispatcher.handle_update(callback_update(4, "res_text")).await;
        dispatcher.handle_update(text_update(5, "# Full name: Anna\n**Phone:** 1")).await;

        // Empty queue: the completion call fails.
        dispatcher.handle_update(callback_update(6, "run_analysis")).await;
        assert!(chat.all_texts().iter().any(|t| t.contains("AI request failed")));
        assert!(repo::find_candidates_by_vacancy_prefix(&pool, "Analyst").await.unwrap().is_empty());

        // Same action succeeds once the service recovers.
        llm.queue("Resume_quality: 5/10\nOverall_fit: 5/10");
        dispatcher.handle_update(callback_update(7, "run_analysis")).await;
        assert_eq!(
            repo::find_candidates_by_vacancy_prefix(&pool, "Analyst").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_reverse_vacancy_needs_two_resumes() {
        let (mut dispatcher, chat, llm, _pool) = setup().await;

        dispatcher.handle_update(callback_update(1, "reverse_vac")).await;
        dispatcher.handle_update(text_update(2, "First resume text")).await;

        dispatcher.handle_update(callback_update(3, "generate_reverse_vac")).await;
        assert!(chat.alerts().iter().any(|a| a.contains("at least 2")));

        // The batch survived the refusal; one more item is enough.
        dispatcher.handle_update(text_update(4, "Second resume text")).await;
        llm.queue("Vacancy: Settlements Specialist\nResponsibilities: ...");
        dispatcher.handle_update(callback_update(5, "generate_reverse_vac")).await;

        assert!(chat.all_texts().iter().any(|t| t.contains("Composed responsibilities")));
    }

    #[tokio::test]
    async fn test_docx_resume_upload_is_extracted_and_normalized() {
        let (mut dispatcher, chat, llm, _pool) = setup().await;
        chat.put_file("file-1", docx_bytes("Ivan Petrov, settlements specialist"));
        llm.queue("# Full name: Ivan Petrov\n**Phone:** Not found\n\n## Work history\n");

        dispatcher.handle_update(callback_update(1, "res_file")).await;
        dispatcher.handle_update(document_update(2, "file-1", "resume.docx")).await;

        assert!(chat.all_texts().iter().any(|t| t.contains("Resume processed")));
    }

    #[tokio::test]
    async fn test_unsupported_upload_keeps_waiting_state() {
        let (mut dispatcher, chat, _llm, _pool) = setup().await;
        chat.put_file("file-2", b"plain text bytes".to_vec());

        dispatcher.handle_update(callback_update(1, "res_file")).await;
        dispatcher.handle_update(document_update(2, "file-2", "resume.txt")).await;
        assert!(chat.last_text().contains("Could not process the document"));

        // The step is still waiting: a pasted text is accepted right after.
        dispatcher.handle_update(text_update(3, "pasted resume text")).await;
        assert!(chat.last_text().contains("Resume processed"));
    }

    #[tokio::test]
    async fn test_delete_callback_cascades() {
        let (mut dispatcher, chat, _llm, pool) = setup().await;
        repo::upsert_vacancy(&pool, "Analyst", "a").await.unwrap();
        repo::upsert_vacancy(&pool, "Backend Developer", "b").await.unwrap();

        dispatcher.handle_update(callback_update(1, "del_Analyst")).await;

        assert!(chat.alerts().iter().any(|a| a.contains("deleted")));
        assert_eq!(
            repo::list_vacancy_names(&pool).await.unwrap(),
            vec!["Backend Developer".to_string()]
        );
    }

    #[tokio::test]
    async fn test_excel_export_sends_document() {
        let (mut dispatcher, chat, llm, pool) = setup().await;
        repo::upsert_vacancy(&pool, "Analyst", "desc").await.unwrap();

        dispatcher.handle_update(callback_update(1, "vac_db")).await;
        dispatcher.handle_update(callback_update(2, "selvac_Analyst")).await;
        dispatcher.handle_update(callback_update(3, "res_text")).await;
        dispatcher.handle_update(text_update(4, "# Full name: Anna\n**Phone:** 2")).await;
        llm.queue("Resume_quality: 6/10\nOverall_fit: 8/10");
        dispatcher.handle_update(callback_update(5, "run_analysis")).await;

        dispatcher.handle_update(callback_update(6, "excel_Analyst")).await;
        let documents = chat.documents.lock().unwrap().clone();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].0, "Candidates_Analyst.xlsx");
        assert!(documents[0].1 > 0);
    }
}

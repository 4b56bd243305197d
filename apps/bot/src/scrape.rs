//! Job-board page extraction: vacancy and resume variants.
//!
//! The board's markup is an unstable external schema; selection leans on its
//! `data-qa` attributes and every missing element degrades to a literal
//! placeholder instead of failing.

use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
const REQUEST_TIMEOUT_SECS: u64 = 15;
/// Analysis body cap for scraped resumes, in characters.
const RESUME_BODY_LIMIT: usize = 4000;

/// Returned in place of resume content when the authenticated fetch fails.
/// Callers detect this by content; there is no separate error channel here.
pub const RESUME_FETCH_FAILED: &str =
    "Could not fetch the resume page. Check the cookies file.";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not read cookies file: {0}")]
    Cookies(String),
}

/// One entry of the cookie side-channel file.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub domain: Option<String>,
}

/// Loads employer-session cookies from the JSON side-channel file.
pub fn load_cookies(path: &str) -> Result<Vec<CookieEntry>, ScrapeError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ScrapeError::Cookies(format!("{path}: {e}")))?;
    serde_json::from_str(&raw).map_err(|e| ScrapeError::Cookies(format!("{path}: {e}")))
}

/// Fetches a page, optionally with the employer cookies attached.
pub async fn fetch_html(url: &str, cookies: Option<&[CookieEntry]>) -> Result<String, ScrapeError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;

    let mut request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE);

    if let Some(cookies) = cookies {
        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        request = request.header(reqwest::header::COOKIE, header);
    }

    let response = request.send().await?.error_for_status()?;
    Ok(response.text().await?)
}

fn select_text(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let selector = Selector::parse(raw).expect("valid selector");
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Builds the vacancy markdown skeleton from a public vacancy page.
/// The first line doubles as the stored vacancy title.
pub fn extract_vacancy_page(html: &str) -> String {
    let document = Html::parse_document(html);

    let title = select_text(
        &document,
        &[
            r#"h1[data-qa="vacancy-title"]"#,
            r#"span[data-qa="vacancy-title"]"#,
            "h1",
        ],
    )
    .unwrap_or_else(|| "Title not determined".to_string());

    let company = select_text(&document, &[r#"a[data-qa="vacancy-company-name"]"#])
        .unwrap_or_else(|| "Company not specified".to_string());

    let description = {
        let selector =
            Selector::parse(r#"div[data-qa="vacancy-description"]"#).expect("valid selector");
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join("\n").trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "Description not found".to_string())
    };

    format!("# {title}\n\n**Company:** {company}\n\n## Description\n{description}")
}

/// Scrapes a resume page through the employer account and renders it in the
/// canonical markdown shape. A failed fetch returns `RESUME_FETCH_FAILED`.
pub async fn extract_resume_page(url: &str, cookies_path: &str) -> String {
    let cookies = match load_cookies(cookies_path) {
        Ok(cookies) => cookies,
        Err(e) => {
            warn!("Cookie side-channel unavailable: {e}");
            return RESUME_FETCH_FAILED.to_string();
        }
    };

    let html = match fetch_html(url, Some(&cookies)).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Resume page fetch failed: {e}");
            return RESUME_FETCH_FAILED.to_string();
        }
    };

    extract_resume_fields(&html)
}

fn extract_resume_fields(html: &str) -> String {
    let document = Html::parse_document(html);

    let name = select_text(
        &document,
        &[
            r#"h2[data-qa="resume-personal-name"]"#,
            r#"span[data-qa="resume-personal-name"]"#,
        ],
    )
    .unwrap_or_else(|| "Name hidden".to_string());

    let phone = select_text(&document, &[r#"span[data-qa="resume-contacts-phone"]"#])
        .unwrap_or_else(|| "Phone not found".to_string());

    let body = {
        let selector = Selector::parse("#resume-main-content").expect("valid selector");
        let text = document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join(" "));
        text.trim().chars().take(RESUME_BODY_LIMIT).collect::<String>()
    };

    format!("# Full name: {name}\n**Phone:** {phone}\n\n## Analysis source\n{body}")
}

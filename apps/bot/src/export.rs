//! Export formatter: renders a candidate set into an in-memory .xlsx workbook.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::repo::CandidateRow;

const HEADERS: &[&str] = &[
    "Full name",
    "Phone",
    "Vacancy",
    "Total experience (years)",
    "Resume quality (0-10)",
    "Overall fit (0-10)",
    "Resume link",
    "AI analysis",
];

/// Builds the "Candidates" sheet and serializes the workbook to bytes.
pub fn candidates_workbook(rows: &[CandidateRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Candidates")?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, &row.full_name)?;
        sheet.write_string(r, 1, &row.phone)?;
        sheet.write_string(r, 2, &row.vacancy_name)?;
        sheet.write_string(r, 3, &row.total_experience)?;
        sheet.write_string(r, 4, &row.quality_score)?;
        sheet.write_string(r, 5, &row.fit_score)?;
        sheet.write_string(r, 6, &row.resume_url)?;
        sheet.write_string(r, 7, &row.analysis_text)?;
    }

    workbook.save_to_buffer()
}

/// File name offered for the download; the prefix is capped the same way the
/// callback payload is.
pub fn export_file_name(vacancy_prefix: &str) -> String {
    let short: String = vacancy_prefix.chars().take(15).collect();
    format!("Candidates_{short}.xlsx")
}

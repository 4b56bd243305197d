//! Word extractor: paragraphs in document order, then tables.
//!
//! Table rows follow the label rule: exactly two populated cells become
//! `"first: second"`, a lone populated cell is emitted as-is, anything else
//! is skipped.

use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCell,
    TableCellContent, TableChild, TableRowChild,
};

use super::ExtractionError;

pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let package = read_docx(bytes).map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let mut paragraphs = Vec::new();
    let mut table_lines = Vec::new();

    for child in &package.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                if let Some(text) = paragraph_text(paragraph) {
                    paragraphs.push(text);
                }
            }
            DocumentChild::Table(table) => collect_table_lines(table, &mut table_lines),
            _ => {}
        }
    }

    if paragraphs.is_empty() && table_lines.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let mut lines = paragraphs;
    lines.extend(table_lines);
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> Option<String> {
    let mut buffer = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(text) => buffer.push_str(&text.text),
                    RunChild::Tab(_) => buffer.push(' '),
                    _ => {}
                }
            }
        }
    }
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn cell_text(cell: &TableCell) -> String {
    let mut parts = Vec::new();
    for content in &cell.children {
        if let TableCellContent::Paragraph(paragraph) = content {
            if let Some(text) = paragraph_text(paragraph) {
                parts.push(text);
            }
        }
    }
    parts.join(" ")
}

fn collect_table_lines(table: &Table, out: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let TableRowChild::TableCell(cell) = cell;
                cell_text(cell)
            })
            .filter(|text| !text.is_empty())
            .collect();

        match cells.as_slice() {
            [single] => out.push(single.clone()),
            [label, value] => out.push(format!("{label}: {value}")),
            _ => {} // zero or 3+ populated cells carry no label/value meaning
        }
    }
}

//! Plain-text rendering of the session view for terminal output.

use std::fmt::Write as _;

use client_core::view::{AnswerView, FieldRow, SessionView};

pub fn status_line(view: &SessionView) -> String {
    let file = view
        .selected_file_name
        .as_deref()
        .unwrap_or("No file selected");
    let status = if view.status_line.is_empty() {
        "idle"
    } else {
        view.status_line.as_str()
    };
    format!("[{status}] file: {file} | top k: {}", view.result_count)
}

pub fn certificate(rows: &[FieldRow]) -> String {
    let mut out = String::from("Extracted Certificate Fields\n");
    push_rows(&mut out, rows);
    out
}

pub fn filled_form(rows: &[FieldRow]) -> String {
    let mut out = String::from("Filled Fields\n");
    push_rows(&mut out, rows);
    out
}

pub fn answer(answer: &AnswerView) -> String {
    let mut out = format!("Answer\n{}\n", answer.answer);
    if !answer.sources.is_empty() {
        out.push_str("Sources\n");
        for source in &answer.sources {
            let _ = writeln!(out, "  - {source}");
        }
    }
    out
}

pub fn error(view: &SessionView) -> Option<String> {
    view.error.as_ref().map(|message| format!("Error: {message}"))
}

pub fn notice(view: &SessionView) -> Option<String> {
    view.notice.as_ref().map(|message| format!("Service note: {message}"))
}

fn push_rows(out: &mut String, rows: &[FieldRow]) {
    if rows.is_empty() {
        out.push_str("  (no fields returned)\n");
    }
    for row in rows {
        let _ = writeln!(out, "  {row}");
    }
}

//! What a presentation layer reads from the session, already shaped for
//! display.

use std::{fmt, ops::RangeInclusive};

use shared::{
    domain::TopK,
    protocol::{FieldMap, QueryResponse, CERTIFICATE_FIELDS},
};

use crate::session::SessionState;

/// Accepted range for the top-K input. The controller itself does not check it.
pub const TOP_K_RANGE: RangeInclusive<i64> = 1..=12;
pub const DEFAULT_TOP_K: TopK = TopK(4);
pub const DEFAULT_FORM_FIELDS: &str = "person_name,date_of_birth,category_or_caste";
pub const WORKING_STATUS: &str = "Working...";
pub const NOT_FOUND: &str = "Not found";

pub fn top_k_in_range(top_k: TopK) -> bool {
    TOP_K_RANGE.contains(&top_k.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub label: String,
    pub value: Option<String>,
}

impl fmt::Display for FieldRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {value}", self.label),
            None => write!(f, "{}: {NOT_FOUND}", self.label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerView {
    pub answer: String,
    pub sources: Vec<String>,
}

impl From<&QueryResponse> for AnswerView {
    fn from(response: &QueryResponse) -> Self {
        let sources = response
            .sources
            .iter()
            .map(|source| {
                let page = source
                    .page
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "?".to_string());
                format!("page: {page} - {}", source.excerpt)
            })
            .collect();
        Self {
            answer: response.answer.clone(),
            sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub status_line: String,
    pub busy: bool,
    pub selected_file_name: Option<String>,
    pub result_count: TopK,
    pub certificate: Option<Vec<FieldRow>>,
    pub answer: Option<AnswerView>,
    pub form: Option<Vec<FieldRow>>,
    pub error: Option<String>,
    /// Shown next to results, unlike `error` which replaces them.
    pub notice: Option<String>,
    pub can_export: bool,
}

impl SessionView {
    pub fn from_state(state: &SessionState) -> Self {
        let status_line = if state.busy {
            WORKING_STATUS.to_string()
        } else {
            state.status_message.clone()
        };
        Self {
            status_line,
            busy: state.busy,
            selected_file_name: state.selected_file.as_ref().map(|file| file.name.clone()),
            result_count: state.result_count,
            certificate: state.certificate_result.as_ref().map(certificate_rows),
            answer: state.query_result.as_ref().map(AnswerView::from),
            form: state.form_result.as_ref().map(form_rows),
            error: state.last_error.clone(),
            notice: state.service_notice.clone(),
            can_export: state.last_raw_response.is_some(),
        }
    }
}

/// Known certificate fields first in their canonical order, then anything
/// else the service returned, in service order.
fn certificate_rows(fields: &FieldMap) -> Vec<FieldRow> {
    let known = CERTIFICATE_FIELDS
        .iter()
        .filter_map(|name| fields.iter().find(|(field, _)| field.as_str() == *name));
    let extra = fields
        .iter()
        .filter(|(name, _)| !CERTIFICATE_FIELDS.contains(&name.as_str()));
    known
        .chain(extra)
        .map(|(name, value)| FieldRow {
            label: name.replace('_', " "),
            value: value.clone(),
        })
        .collect()
}

fn form_rows(fields: &FieldMap) -> Vec<FieldRow> {
    fields
        .iter()
        .map(|(name, value)| FieldRow {
            label: name.clone(),
            value: value.clone(),
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;

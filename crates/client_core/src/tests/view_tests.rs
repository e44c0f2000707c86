use super::*;
use serde_json::json;
use shared::{
    domain::PageRef,
    protocol::{field_map_from_value, SourceExcerpt},
};

use crate::session::SelectedFile;

fn field_map(entries: &[(&str, Option<&str>)]) -> FieldMap {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
        .collect()
}

#[test]
fn idle_view_shows_status_message() {
    let state = SessionState {
        status_message: "Query finished".into(),
        ..SessionState::default()
    };
    let view = SessionView::from_state(&state);
    assert_eq!(view.status_line, "Query finished");
    assert!(!view.can_export);
    assert_eq!(view.result_count, DEFAULT_TOP_K);
}

#[test]
fn busy_view_shows_working_indicator() {
    let state = SessionState {
        busy: true,
        status_message: "Uploading document...".into(),
        ..SessionState::default()
    };
    assert_eq!(SessionView::from_state(&state).status_line, WORKING_STATUS);
}

#[test]
fn certificate_rows_follow_canonical_order_then_extras() {
    let state = SessionState {
        certificate_result: Some(field_map(&[
            ("issue_date", Some("2021-04-01")),
            ("person_name", Some("Jane Doe")),
            ("confidence", Some("high")),
            ("date_of_birth", None),
        ])),
        ..SessionState::default()
    };
    let rows = SessionView::from_state(&state).certificate.expect("rows");
    let rendered: Vec<String> = rows.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "person name: Jane Doe",
            "date of birth: Not found",
            "issue date: 2021-04-01",
            "confidence: high",
        ]
    );
}

#[test]
fn form_rows_keep_field_names() {
    let state = SessionState {
        form_result: Some(field_map(&[("category_or_caste", Some("OBC"))])),
        ..SessionState::default()
    };
    let rows = SessionView::from_state(&state).form.expect("rows");
    assert_eq!(rows[0].to_string(), "category_or_caste: OBC");
}

#[test]
fn form_rows_follow_requested_order() {
    let result = json!({
        "person_name": "Jane Doe",
        "date_of_birth": null,
        "category_or_caste": "OBC"
    });
    let state = SessionState {
        form_result: field_map_from_value(&result),
        ..SessionState::default()
    };
    let rows = SessionView::from_state(&state).form.expect("rows");
    let labels: Vec<&str> = rows.iter().map(|row| row.label.as_str()).collect();
    assert_eq!(labels, vec!["person_name", "date_of_birth", "category_or_caste"]);
    assert_eq!(rows[1].to_string(), "date_of_birth: Not found");
}

#[test]
fn service_notice_is_shown_alongside_results() {
    let state = SessionState {
        form_result: Some(field_map(&[("person_name", None)])),
        service_notice: Some("model output was not valid JSON".into()),
        status_message: "Form filled".into(),
        ..SessionState::default()
    };
    let view = SessionView::from_state(&state);
    assert_eq!(
        view.notice.as_deref(),
        Some("model output was not valid JSON")
    );
    assert!(view.form.is_some());
    assert_eq!(view.error, None);
}

#[test]
fn answer_sources_render_page_or_placeholder() {
    let state = SessionState {
        query_result: Some(QueryResponse {
            answer: "Jane Doe".into(),
            sources: vec![
                SourceExcerpt {
                    page: Some(PageRef::Number(2)),
                    excerpt: "Name: Jane Doe".into(),
                },
                SourceExcerpt {
                    page: None,
                    excerpt: "Issued by Tehsildar".into(),
                },
            ],
        }),
        last_raw_response: Some(json!({"answer": "Jane Doe"})),
        selected_file: Some(SelectedFile::new("cert.pdf", Vec::new())),
        ..SessionState::default()
    };
    let view = SessionView::from_state(&state);
    let answer = view.answer.expect("answer");
    assert_eq!(answer.answer, "Jane Doe");
    assert_eq!(
        answer.sources,
        vec!["page: 2 - Name: Jane Doe", "page: ? - Issued by Tehsildar"]
    );
    assert!(view.can_export);
    assert_eq!(view.selected_file_name.as_deref(), Some("cert.pdf"));
}

#[test]
fn top_k_range_matches_input_constraint() {
    assert!(top_k_in_range(TopK(1)));
    assert!(top_k_in_range(TopK(12)));
    assert!(!top_k_in_range(TopK(0)));
    assert!(!top_k_in_range(TopK(13)));
}

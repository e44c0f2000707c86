//! Session controller: the state machine behind upload, certificate
//! analysis, question answering and form filling.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{Endpoint, TopK},
    protocol::{
        CertificateAnalysisResponse, FieldMap, FillFormRequest, FillFormResponse, HealthResponse,
        QueryRequest, QueryResponse, UploadResponse,
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    export::{ExportError, RawExport},
    response::{decode_response, Decoded},
    transport::{AnalysisTransport, FilePart},
};

pub const CHOOSE_FILE_PROMPT: &str = "Choose a file first";
pub const ENTER_QUESTION_PROMPT: &str = "Enter a question";
pub const ENTER_FIELDS_PROMPT: &str = "Enter fields to extract, comma separated.";

/// A document picked by the user but not necessarily uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub selected_file: Option<SelectedFile>,
    pub status_message: String,
    pub busy: bool,
    pub result_count: TopK,
    pub certificate_result: Option<FieldMap>,
    pub query_result: Option<QueryResponse>,
    pub form_result: Option<FieldMap>,
    pub form_fields_spec: String,
    pub last_raw_response: Option<Value>,
    pub last_error: Option<String>,
    /// Extraction problem the service reported alongside a successful
    /// response.
    pub service_notice: Option<String>,
}

/// How completions of overlapping operations are applied to shared state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderingPolicy {
    /// Every operation carries a sequence number; a completion from an
    /// operation older than the most recently started one is dropped.
    #[default]
    LatestInvocationWins,
    /// Completions are applied in the order they arrive, so a slow stale
    /// response overwrites a newer one.
    LastCompletionWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Upload,
    AnalyzeCertificate,
    Ask,
    FillForm,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::AnalyzeCertificate => "analyze_certificate",
            Operation::Ask => "ask",
            Operation::FillForm => "fill_form",
        }
    }

    fn progress_phrase(self) -> &'static str {
        match self {
            Operation::Upload => "Uploading document...",
            Operation::AnalyzeCertificate => "Analyzing certificate...",
            Operation::Ask => "Querying document...",
            Operation::FillForm => "Filling fields...",
        }
    }

    /// Upload never produces a raw response, so it leaves the previous one
    /// available for export.
    fn clears_raw_response(self) -> bool {
        !matches!(self, Operation::Upload)
    }

    fn failure_phrase(self) -> &'static str {
        match self {
            Operation::Upload => "Upload failed",
            Operation::AnalyzeCertificate => "Certificate analysis failed",
            Operation::Ask => "Query failed",
            Operation::FillForm => "Fill form failed",
        }
    }
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    next_ticket: u64,
    latest_started: u64,
}

// A blank `error` next to a 200 response carries no information.
fn service_notice(operation: &'static str, error: Option<&str>) -> Option<String> {
    let error = error.map(str::trim).filter(|error| !error.is_empty())?;
    warn!(operation, %error, "session: service reported extraction error");
    Some(error.to_string())
}

/// Splits a comma separated field list, trimming names and dropping empty
/// entries. Order and duplicates are preserved.
pub fn parse_field_spec(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct SessionController {
    transport: Arc<dyn AnalysisTransport>,
    ordering: OrderingPolicy,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn AnalysisTransport>) -> Self {
        Self::with_ordering(transport, OrderingPolicy::default())
    }

    pub fn with_ordering(
        transport: Arc<dyn AnalysisTransport>,
        ordering: OrderingPolicy,
    ) -> Self {
        Self {
            transport,
            ordering,
            inner: Mutex::new(Inner::default()),
        }
    }

    // The lock is never held across an await, so a poisoned guard still
    // holds consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn select_file(&self, file: SelectedFile) {
        info!(
            file_name = %file.name,
            size_bytes = file.bytes.len(),
            "session: file selected"
        );
        self.lock().state.selected_file = Some(file);
    }

    pub fn clear_file(&self) {
        self.lock().state.selected_file = None;
    }

    pub fn set_result_count(&self, top_k: TopK) {
        self.lock().state.result_count = top_k;
    }

    pub fn result_count(&self) -> TopK {
        self.lock().state.result_count
    }

    pub fn set_form_fields_spec(&self, spec: impl Into<String>) {
        self.lock().state.form_fields_spec = spec.into();
    }

    /// Uploads the selected file so later operations run against it.
    ///
    /// Only the status message changes on success; results and the raw
    /// response of earlier operations are left alone.
    pub async fn upload(&self) -> Result<UploadResponse, SessionError> {
        let file = self
            .lock()
            .state
            .selected_file
            .clone()
            .ok_or_else(|| SessionError::Validation(CHOOSE_FILE_PROMPT.to_string()))?;

        let ticket = self.begin(Operation::Upload);
        let part = FilePart {
            file_name: file.name,
            bytes: file.bytes,
        };
        let outcome = match self
            .transport
            .post_multipart(Endpoint::Upload.path(), part)
            .await
        {
            Ok(response) => decode_response::<UploadResponse>(response),
            Err(err) => Err(err.into()),
        };

        self.complete(ticket, Operation::Upload, outcome, |state, decoded| {
            state.status_message =
                format!("Uploaded. Indexed {} chunks.", decoded.typed.num_chunks);
        })
    }

    pub async fn analyze_certificate(&self) -> Result<CertificateAnalysisResponse, SessionError> {
        let body = encode_body(&QueryRequest::certificate(self.result_count()))?;

        let ticket = self.begin(Operation::AnalyzeCertificate);
        let outcome = self
            .post_json::<CertificateAnalysisResponse>(Endpoint::AnalyzeCertificate, body)
            .await;

        self.complete(
            ticket,
            Operation::AnalyzeCertificate,
            outcome,
            |state, decoded| {
                state.service_notice =
                    service_notice("analyze_certificate", decoded.typed.error.as_deref());
                state.certificate_result = decoded.typed.parsed.clone();
                state.last_raw_response = Some(
                    decoded
                        .typed
                        .raw
                        .clone()
                        .unwrap_or_else(|| decoded.body.clone()),
                );
                state.status_message = "Certificate analysis complete".to_string();
            },
        )
    }

    pub async fn ask(&self, question: &str) -> Result<QueryResponse, SessionError> {
        if question.trim().is_empty() {
            return Err(SessionError::Validation(ENTER_QUESTION_PROMPT.to_string()));
        }
        let body = encode_body(&QueryRequest {
            question: question.to_string(),
            top_k: self.result_count(),
        })?;

        let ticket = self.begin(Operation::Ask);
        let outcome = self.post_json::<QueryResponse>(Endpoint::Query, body).await;

        self.complete(ticket, Operation::Ask, outcome, |state, decoded| {
            state.query_result = Some(decoded.typed.clone());
            state.last_raw_response = Some(decoded.body.clone());
            state.status_message = "Query finished".to_string();
        })
    }

    /// Extracts the fields named in the current field spec.
    pub async fn fill_form(&self) -> Result<FillFormResponse, SessionError> {
        let (spec, top_k) = {
            let inner = self.lock();
            (
                inner.state.form_fields_spec.clone(),
                inner.state.result_count,
            )
        };
        if spec.trim().is_empty() {
            return Err(SessionError::Validation(ENTER_FIELDS_PROMPT.to_string()));
        }
        let fields = parse_field_spec(&spec);
        debug!(?fields, "session: parsed form field spec");
        let body = encode_body(&FillFormRequest { fields, top_k })?;

        let ticket = self.begin(Operation::FillForm);
        let outcome = self
            .post_json::<FillFormResponse>(Endpoint::FillForm, body)
            .await;

        self.complete(ticket, Operation::FillForm, outcome, |state, decoded| {
            state.service_notice = service_notice("fill_form", decoded.typed.error.as_deref());
            state.form_result = decoded.typed.result.clone();
            state.last_raw_response = Some(decoded.body.clone());
            state.status_message = "Form filled".to_string();
        })
    }

    /// Checks that the service root answers. Session state is not touched.
    pub async fn ping(&self) -> Result<HealthResponse, SessionError> {
        let response = self.transport.get_json(Endpoint::Health.path()).await?;
        decode_response::<HealthResponse>(response).map(|decoded| decoded.typed)
    }

    /// Pretty-printed copy of the last raw response, or `None` when there is
    /// nothing to export.
    pub fn export_raw(&self) -> Result<Option<RawExport>, ExportError> {
        let inner = self.lock();
        inner
            .state
            .last_raw_response
            .as_ref()
            .map(RawExport::from_value)
            .transpose()
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: Value,
    ) -> Result<Decoded<T>, SessionError> {
        let response = self.transport.post_json(endpoint.path(), body).await?;
        decode_response(response)
    }

    fn begin(&self, operation: Operation) -> u64 {
        let mut inner = self.lock();
        inner.next_ticket += 1;
        let ticket = inner.next_ticket;
        inner.latest_started = ticket;

        let state = &mut inner.state;
        state.last_error = None;
        state.service_notice = None;
        if operation.clears_raw_response() {
            state.last_raw_response = None;
        }
        state.busy = true;
        state.status_message = operation.progress_phrase().to_string();
        info!(
            operation = operation.name(),
            ticket,
            top_k = state.result_count.0,
            "session: operation started"
        );
        ticket
    }

    fn complete<T>(
        &self,
        ticket: u64,
        operation: Operation,
        outcome: Result<Decoded<T>, SessionError>,
        apply: impl FnOnce(&mut SessionState, &Decoded<T>),
    ) -> Result<T, SessionError> {
        let mut inner = self.lock();
        if self.ordering == OrderingPolicy::LatestInvocationWins && ticket < inner.latest_started {
            info!(
                operation = operation.name(),
                ticket,
                latest_started = inner.latest_started,
                "session: discarding stale completion"
            );
            return outcome.map(|decoded| decoded.typed);
        }

        let state = &mut inner.state;
        match &outcome {
            Ok(decoded) => {
                apply(state, decoded);
                info!(
                    operation = operation.name(),
                    ticket,
                    "session: operation finished"
                );
            }
            Err(err) => {
                state.last_error = Some(err.to_string());
                state.status_message = operation.failure_phrase().to_string();
                warn!(
                    operation = operation.name(),
                    ticket,
                    error = %err,
                    "session: operation failed"
                );
            }
        }
        state.busy = false;
        outcome.map(|decoded| decoded.typed)
    }
}

fn encode_body(request: &impl Serialize) -> Result<Value, SessionError> {
    serde_json::to_value(request)
        .map_err(|e| SessionError::Validation(format!("request could not be encoded: {e}")))
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

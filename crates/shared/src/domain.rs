use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of retrieved context passages the service should use.
///
/// Carried verbatim: range checks belong to whoever collects the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopK(pub i64);

impl Default for TopK {
    fn default() -> Self {
        Self(4)
    }
}

impl fmt::Display for TopK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    Upload,
    AnalyzeCertificate,
    Query,
    FillForm,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Health => "/",
            Endpoint::Upload => "/upload",
            Endpoint::AnalyzeCertificate => "/analyze/certificate",
            Endpoint::Query => "/query",
            Endpoint::FillForm => "/fill-form",
        }
    }
}

/// Page reference attached to a retrieved excerpt. The service reports
/// numeric pages for PDFs but may hand back labels for other inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(i64),
    Label(String),
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{n}"),
            PageRef::Label(label) => f.write_str(label),
        }
    }
}

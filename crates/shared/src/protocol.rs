use std::ops::Index;

use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::{PageRef, TopK};

/// Extracted field name to value; `None` means the service could not find it.
///
/// Keeps the order the service returned the fields in, which follows the
/// order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, Option<String>)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value of an existing field in place, otherwise appends.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Option<String>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.entries.iter().map(|(name, value)| (name, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl Index<&str> for FieldMap {
    type Output = Option<String>;

    fn index(&self, name: &str) -> &Self::Output {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no field named '{name}'"),
        }
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Instruction sent with every certificate analysis request.
pub const CERTIFICATE_QUESTION: &str = "extract certificate fields";

/// Fields the certificate analysis prompt asks the service for, in display order.
pub const CERTIFICATE_FIELDS: &[&str] = &[
    "person_name",
    "father_name",
    "date_of_birth",
    "category_or_caste",
    "certificate_type",
    "issuing_authority",
    "issue_date",
    "document_number",
];

/// Multipart part name the upload endpoint reads the document from.
pub const UPLOAD_FIELD_NAME: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: TopK,
}

impl QueryRequest {
    pub fn certificate(top_k: TopK) -> Self {
        Self {
            question: CERTIFICATE_QUESTION.to_string(),
            top_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillFormRequest {
    pub fields: Vec<String>,
    pub top_k: TopK,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub num_chunks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateAnalysisResponse {
    #[serde(default, deserialize_with = "lenient_field_map")]
    pub parsed: Option<FieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceExcerpt {
    #[serde(default)]
    pub page: Option<PageRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<SourceExcerpt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillFormResponse {
    #[serde(default, deserialize_with = "lenient_field_map")]
    pub result: Option<FieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Vec<String>,
}

/// Converts a JSON object into a [`FieldMap`].
///
/// Model output is not always well typed: non-string scalars and nested
/// values are kept as their JSON text. Anything other than an object yields
/// `None`. Field order follows the object.
pub fn field_map_from_value(value: &Value) -> Option<FieldMap> {
    let Value::Object(map) = value else {
        return None;
    };
    Some(
        map.iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                };
                (name.clone(), value)
            })
            .collect(),
    )
}

fn lenient_field_map<'de, D>(deserializer: D) -> Result<Option<FieldMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(field_map_from_value))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::GatewayError;
use crate::utils::pdf::ExtractionResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub pdf_url: String,
}

impl ConversionRequest {
    /// Reads `{"pdfUrl": "..."}` from a raw request body.
    ///
    /// A body that is not JSON, not an object, or carries a falsy `pdfUrl`
    /// (null, `false`, `0`, empty string) counts as a missing URL; any other
    /// non-string `pdfUrl` is an invalid URL.
    pub fn from_body(body: &[u8]) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| GatewayError::MissingUrl)?;

        match value.get("pdfUrl") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Err(GatewayError::MissingUrl),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(GatewayError::MissingUrl),
            Some(Value::String(url)) if url.is_empty() => Err(GatewayError::MissingUrl),
            Some(Value::String(url)) => Ok(Self {
                pdf_url: url.clone(),
            }),
            Some(_) => Err(GatewayError::MalformedUrl),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub status: &'static str,
    pub text: String,
    pub number_of_pages: usize,
    pub metadata: Option<BTreeMap<String, String>>,
    pub version: Option<String>,
}

impl From<ExtractionResult> for ConversionResponse {
    fn from(result: ExtractionResult) -> Self {
        Self {
            status: "success",
            text: result.text,
            number_of_pages: result.num_pages,
            metadata: result.metadata,
            version: result.version,
        }
    }
}

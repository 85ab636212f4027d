//! Result Translator
//!
//! Maps the worker's captured output into an [`AnalysisReport`] or an
//! [`AnalysisError`]. A structurally valid payload is never rejected for
//! missing fields: every absent field takes its default.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AnalysisError;

/// Message used when the worker's output is not a decodable payload
pub const DECODE_FAILURE: &str = "Failed to decode worker output";

/// Message used when the worker reports failure without saying why
pub const GENERIC_FAILURE: &str = "Processing failed";

const UNKNOWN: &str = "unknown";
const ZERO: &str = "0";

/// Successful analysis, as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub classification: String,
    pub detections: Vec<Value>,
    pub visualizations: Visualizations,
    pub metadata: AnalysisMetadata,
}

/// Base64 encoded overlay images; empty when the worker produced none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Visualizations {
    pub detection: String,
    pub segmentation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisMetadata {
    pub device: String,
    pub torch_version: String,
    pub classification_model: String,
    pub detection_model: String,
    pub segmentation_model: String,
    pub image_width: String,
    pub image_height: String,
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self {
            device: UNKNOWN.into(),
            torch_version: UNKNOWN.into(),
            classification_model: UNKNOWN.into(),
            detection_model: UNKNOWN.into(),
            segmentation_model: UNKNOWN.into(),
            image_width: ZERO.into(),
            image_height: ZERO.into(),
        }
    }
}

/// Translate the output of a completed worker
pub fn translate(text: &str) -> Result<AnalysisReport, AnalysisError> {
    let payload = locate_payload(text).ok_or_else(|| {
        warn!(output_bytes = text.len(), "Worker output is not a JSON object");
        AnalysisError::new(DECODE_FAILURE)
    })?;

    if let Some(err) = reported_failure(&payload) {
        warn!(error = %err.message, "Worker reported failure");
        return Err(err);
    }

    let empty = Map::new();
    let visualizations = payload
        .get("visualizations")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let metadata = payload
        .get("metadata")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let report = AnalysisReport {
        success: true,
        classification: string_field(&payload, "classification", UNKNOWN),
        detections: payload
            .get("detections")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        visualizations: Visualizations {
            detection: string_field(visualizations, "detection", ""),
            segmentation: string_field(visualizations, "segmentation", ""),
        },
        metadata: AnalysisMetadata {
            device: string_field(metadata, "device", UNKNOWN),
            torch_version: string_field(metadata, "torch_version", UNKNOWN),
            classification_model: string_field(metadata, "classification_model", UNKNOWN),
            detection_model: string_field(metadata, "detection_model", UNKNOWN),
            segmentation_model: string_field(metadata, "segmentation_model", UNKNOWN),
            image_width: string_field(metadata, "image_width", ZERO),
            image_height: string_field(metadata, "image_height", ZERO),
        },
    };

    debug!(
        classification = %report.classification,
        detections = report.detections.len(),
        "Translated worker output"
    );
    Ok(report)
}

/// Extract the worker's own failure report from failed-run output
///
/// A worker that exits non-zero usually still prints its failure payload.
pub fn embedded_error(output: &str) -> Option<AnalysisError> {
    locate_payload(output).and_then(|payload| reported_failure(&payload))
}

/// Find the JSON object in the output
///
/// The whole output is tried first; failing that, the last line that is a
/// JSON object, so stray log lines ahead of the payload are tolerated.
fn locate_payload(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(text.trim()) {
        return Some(map);
    }
    text.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

fn reported_failure(payload: &Map<String, Value>) -> Option<AnalysisError> {
    if payload.get("success").is_some_and(truthy) {
        return None;
    }

    let message = payload
        .get("error")
        .and_then(scalar_text)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
    let mut err = AnalysisError::new(message);
    if let Some(trace) = payload
        .get("traceback")
        .and_then(scalar_text)
        .filter(|t| !t.is_empty())
    {
        err = err.with_traceback(trace);
    }
    Some(err)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_field(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(scalar_text)
        .unwrap_or_else(|| default.to_string())
}

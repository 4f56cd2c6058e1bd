//! Report renderers.
//!
//! A renderer turns a finished [`SimulationResult`] into text. Renderers only
//! read the result.

use serde::Serialize;
use vigil_types::SimulationResult;

use crate::error::{VigilError, VigilResult};

/// Formats a run result.
pub trait ReportRenderer: Send + Sync {
    /// Short format name, e.g. `json`.
    fn format_name(&self) -> &str;

    /// Render the result.
    fn render(&self, result: &SimulationResult) -> VigilResult<String>;
}

/// Output of one renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReport {
    pub format: String,
    pub content: String,
}

/// Renders the result as JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonRenderer {
    pretty: bool,
}

impl JsonRenderer {
    /// Pretty-printed JSON.
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line JSON.
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer for JsonRenderer {
    fn format_name(&self) -> &str {
        "json"
    }

    fn render(&self, result: &SimulationResult) -> VigilResult<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(result)
        } else {
            serde_json::to_string(result)
        };
        rendered.map_err(|e| VigilError::RenderError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use vigil_types::{CheckResult, CheckStatus};

    use super::*;

    fn result() -> SimulationResult {
        let results = BTreeMap::from([
            ("lint".to_string(), CheckResult::failure("lint", "unused import")),
            ("test".to_string(), CheckResult::skipped("test", "prerequisite 'lint' failed")),
        ]);
        SimulationResult::new(CheckStatus::Failure, Duration::from_secs(3), results, "summary")
    }

    #[test]
    fn test_json_roundtrip() {
        let result = result();
        let json = JsonRenderer::new().render(&result).unwrap();
        assert!(json.contains('\n'));
        let parsed: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_compact_is_single_line() {
        let renderer = JsonRenderer::compact();
        assert_eq!(renderer.format_name(), "json");
        let json = renderer.render(&result()).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("unused import"));
    }
}

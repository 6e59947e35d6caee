use crate::core::PostureSnapshot;
use crate::report::{ReportError, Reporter};

/// Snapshot as JSON, the schema consumed by alternate renderers
pub struct JsonReporter {
    pretty_print: bool,
}

impl JsonReporter {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    /// Serialize any part of a snapshot, e.g. the section summary
    pub fn export_section<T: serde::Serialize>(
        &self,
        section: &T,
        section_name: &str,
    ) -> Result<String, ReportError> {
        let rendered = if self.pretty_print {
            serde_json::to_string_pretty(section)
        } else {
            serde_json::to_string(section)
        };
        rendered.map_err(|e| {
            ReportError::SerializationError(format!("Failed to serialize {}: {}", section_name, e))
        })
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reporter for JsonReporter {
    fn render(&self, snapshot: &PostureSnapshot) -> Result<String, ReportError> {
        self.export_section(snapshot, "snapshot")
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, Section, Status};
    use crate::testing::TestUtils;

    #[test]
    fn test_snapshot_schema() {
        let mut snapshot = TestUtils::snapshot(9);
        snapshot.results[1] = snapshot.results[1]
            .clone()
            .with_failure(FailureKind::Timeout);
        snapshot.results[1].status = Status::Warn;

        let json = JsonReporter::new(false).render(&snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["sequence"], 9);
        assert_eq!(value["band"], "good");
        assert!(value["computed_at"].is_string());

        let first = &value["results"][0];
        for field in ["id", "label", "section", "status", "detail", "staleness"] {
            assert!(first.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(first["section"], "network");
        assert!(first.get("failure").is_none());

        let second = &value["results"][1];
        assert_eq!(second["status"], "warn");
        assert_eq!(second["staleness"], true);
        assert_eq!(second["failure"], "timeout");
    }

    #[test]
    fn test_export_section_summary() {
        let snapshot = TestUtils::snapshot(1);
        let json = JsonReporter::default()
            .export_section(&snapshot.section_summary(), "summary")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0][0], serde_json::to_value(Section::Network).unwrap());
        assert_eq!(value[0][1]["ok"], 2);
    }
}

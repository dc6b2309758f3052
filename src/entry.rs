use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
    /// Levels this crate does not know about still deserialize.
    #[serde(other)]
    Unknown,
}

/// A single structured log line as emitted by the log writer.
///
/// Optional fields follow the writer's convention of omitting empty values
/// rather than serializing them as `""` or `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duration_ms: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_entry() {
        let line = r#"{"timestamp":"2026-01-02T03:04:05Z","level":"ERROR","service":"auth-service","message":"Authentication failed","request_id":"req-ab12cd34","user_id":"user-42","duration_ms":118}"#;
        let entry: LogEntry = serde_json::from_str(line).expect("should parse");

        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.service, "auth-service");
        assert_eq!(entry.request_id, "req-ab12cd34");
        assert_eq!(entry.duration_ms, 118);
    }

    #[test]
    fn missing_optional_fields_default() {
        let line = r#"{"timestamp":"2026-01-02T03:04:05Z","level":"INFO","service":"api-gateway","message":"Request completed"}"#;
        let entry: LogEntry = serde_json::from_str(line).expect("should parse");

        assert!(entry.request_id.is_empty());
        assert!(entry.user_id.is_empty());
        assert_eq!(entry.duration_ms, 0);
    }

    #[test]
    fn unknown_level_is_tolerated() {
        let line = r#"{"timestamp":"t","level":"TRACE","service":"s","message":"m"}"#;
        let entry: LogEntry = serde_json::from_str(line).expect("should parse");

        assert_eq!(entry.level, LogLevel::Unknown);
    }

    #[test]
    fn empty_optional_fields_are_not_serialized() {
        let entry = LogEntry {
            timestamp: "2026-01-02T03:04:05Z".to_string(),
            level: LogLevel::Info,
            service: "api-gateway".to_string(),
            message: "Request completed".to_string(),
            ..Default::default()
        };

        let encoded = serde_json::to_string(&entry).expect("should encode");
        assert!(!encoded.contains("request_id"));
        assert!(!encoded.contains("user_id"));
        assert!(!encoded.contains("duration_ms"));
    }
}

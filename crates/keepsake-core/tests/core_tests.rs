#[cfg(test)]
mod tests {
    use keepsake_core::*;
    use std::str::FromStr;
    use uuid::Uuid;

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_not_found_display() {
        let id = Uuid::new_v4();
        let err = KeepsakeError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_validation_display() {
        let err = KeepsakeError::validation("relevance_score", "must be between 0 and 1");
        let s = err.to_string();
        assert!(s.contains("relevance_score"));
        assert!(s.contains("between 0 and 1"));
    }

    #[test]
    fn test_error_backing_display() {
        let err = KeepsakeError::Backing("database is locked".into());
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KeepsakeError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    // ── SourceType tests ───────────────────────────────────────

    #[test]
    fn test_source_type_as_str() {
        assert_eq!(SourceType::ChatMessage.as_str(), "chat_message");
        assert_eq!(SourceType::CalendarDay.as_str(), "calendar_day");
        assert_eq!(SourceType::ManualEntry.as_str(), "manual_entry");
        assert_eq!(SourceType::ChatMessage.to_string(), "chat_message");
    }

    #[test]
    fn test_source_type_from_str_roundtrip() {
        let variants = [
            SourceType::ChatMessage,
            SourceType::CalendarDay,
            SourceType::ManualEntry,
        ];
        for v in variants {
            let parsed = SourceType::from_str(v.as_str()).unwrap();
            assert_eq!(parsed, v);
        }
    }

    #[test]
    fn test_source_type_from_str_unknown() {
        let err = SourceType::from_str("carrier_pigeon").unwrap_err();
        assert!(matches!(err, KeepsakeError::Validation { .. }));
    }

    #[test]
    fn test_source_type_serde_matches_sql_text() {
        let json = serde_json::to_string(&SourceType::ChatMessage).unwrap();
        assert_eq!(json, "\"chat_message\"");
        let restored: SourceType = serde_json::from_str("\"calendar_day\"").unwrap();
        assert_eq!(restored, SourceType::CalendarDay);
    }
}

use crate::engine::FormatDetector;
use crate::error::IngestResult;
use crate::transcript::update::TranscriptUpdate;
use crate::transcript::{legacy, structured};

/// Format detector for the transcript grid.
///
/// Detection order, first match wins:
/// 1. structured JSON (`{` or `[`)
/// 2. `song_length` / `bar` scalars
/// 3. `nonexistent_recitation` cross-out marker
/// 4. hierarchical `track :: measure :: field value`
/// 5. anything else is unrecognized
#[derive(Debug, Default, Clone, Copy)]
pub struct TranscriptDetector;

impl FormatDetector for TranscriptDetector {
    type Update = TranscriptUpdate;

    fn name(&self) -> &'static str {
        "transcript"
    }

    fn detect(&self, text: &str) -> IngestResult<Option<TranscriptUpdate>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        if text.starts_with('{') || text.starts_with('[') {
            let update = structured::parse(text)?;
            return Ok((!update.is_empty()).then_some(TranscriptUpdate::Structured(update)));
        }

        legacy::detect(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    #[test]
    fn test_structured_wins_over_legacy_markers() {
        // A JSON packet mentioning the marker text is still JSON
        let update = TranscriptDetector
            .detect(r#"{"transcript":{"1":{"0":{"note":"nonexistent_recitation :: x :: y"}}}}"#)
            .unwrap();
        assert!(matches!(update, Some(TranscriptUpdate::Structured(_))));
    }

    #[test]
    fn test_broken_json_does_not_fall_through() {
        let err = TranscriptDetector.detect("{song_length 12").unwrap_err();
        assert!(matches!(err, IngestError::Json(_)));
    }

    #[test]
    fn test_json_without_known_keys_is_unrecognized() {
        assert!(TranscriptDetector.detect(r#"{"track":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_legacy_dispatch() {
        assert_eq!(
            TranscriptDetector.detect("  bar 4  ").unwrap(),
            Some(TranscriptUpdate::MeasureLength(4.0))
        );
        assert!(TranscriptDetector.detect("just words").unwrap().is_none());
    }
}

//! Transcript JSON Lines reader.
//!
//! Each input line is one raw transcript row:
//!
//! ```text
//! {"person": "78afa995", "event": "offer received", "value": {"offer id": "9b98b8c7"}, "time": 0}
//! ```
//!
//! The `value` object is heterogeneous: offer rows carry `offer id` (older
//! exports) or `offer_id` (completion rows, which also carry `reward`), and
//! transaction rows carry `amount`. [`normalize_row`] reshapes it into the
//! flat [`Event`] columns.

use std::io::BufRead;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::IngestError;
use crate::model::{OfferId, UserId};

use super::{Event, EventType, Hours};

/// A transcript row as exported, before reshaping.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTranscriptRow {
    pub person: String,
    pub event: String,
    #[serde(default)]
    pub value: Map<String, Value>,
    pub time: i64,
}

/// Reshape one raw row into a normalized [`Event`].
///
/// # Errors
///
/// Returns [`IngestError::Malformed`] for an unknown event string, a
/// negative time, or a non-string offer id, and [`IngestError::Event`] when
/// the reshaped event lacks a field its type requires.
pub fn normalize_row(row: RawTranscriptRow, line: usize) -> Result<Event, IngestError> {
    let event_type = row
        .event
        .parse::<EventType>()
        .map_err(|err| IngestError::Malformed {
            line,
            reason: err.to_string(),
        })?;

    let time = Hours::try_from(row.time).map_err(|_| IngestError::Malformed {
        line,
        reason: format!("negative event time {}", row.time),
    })?;

    // Either spelling may be present and null; the first non-null one wins.
    let offer_id = match ["offer id", "offer_id"]
        .iter()
        .filter_map(|key| row.value.get(*key))
        .find(|value| !value.is_null())
    {
        None => None,
        Some(Value::String(raw)) => Some(OfferId::new(raw.as_str())),
        Some(other) => {
            return Err(IngestError::Malformed {
                line,
                reason: format!("offer id must be a string, got {other}"),
            });
        }
    };

    let amount = row.value.get("amount").and_then(Value::as_f64);

    let event = Event {
        user_id: UserId::new(row.person),
        offer_id,
        event_type,
        time,
        amount,
    };
    event.validate(Some(line))?;
    Ok(event)
}

/// Read a whole transcript from a JSON Lines source.
///
/// Blank lines are skipped. Events are returned in input order.
///
/// # Errors
///
/// Fails on the first unreadable, unparsable or malformed line.
pub fn parse_transcript<R: BufRead>(reader: R) -> Result<Vec<Event>, IngestError> {
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let raw = line?;
        if raw.trim().is_empty() {
            continue;
        }

        let row: RawTranscriptRow = serde_json::from_str(&raw).map_err(|source| {
            IngestError::Json {
                line: line_no,
                source,
            }
        })?;
        events.push(normalize_row(row, line_no)?);
    }

    debug!(events = events.len(), "parsed transcript");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AttributionError, ErrorCode};

    fn parse(input: &str) -> Result<Vec<Event>, IngestError> {
        parse_transcript(input.as_bytes())
    }

    #[test]
    fn reshapes_both_offer_id_spellings() {
        let events = parse(concat!(
            r#"{"person":"u1","event":"offer received","value":{"offer id":"x"},"time":0}"#,
            "\n",
            r#"{"person":"u1","event":"offer completed","value":{"offer_id":"x","reward":5},"time":20}"#,
            "\n",
        ))
        .expect("parse");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].offer_id, Some(OfferId::new("x")));
        assert_eq!(events[1].event_type, EventType::Completed);
        assert_eq!(events[1].offer_id, Some(OfferId::new("x")));
        assert_eq!(events[1].time, 20);
    }

    #[test]
    fn null_offer_id_spelling_falls_back_to_the_other() {
        let events = parse(concat!(
            r#"{"person":"u1","event":"offer completed","value":{"offer id":null,"offer_id":"x"},"time":3}"#,
            "\n",
            r#"{"person":"u1","event":"offer viewed","value":{"offer id":"y","offer_id":null},"time":4}"#,
            "\n",
        ))
        .expect("parse");

        assert_eq!(events[0].event_type, EventType::Completed);
        assert_eq!(events[0].offer_id, Some(OfferId::new("x")));
        assert_eq!(events[1].offer_id, Some(OfferId::new("y")));
    }

    #[test]
    fn transaction_keeps_amount_and_no_offer() {
        let events = parse(
            r#"{"person":"u1","event":"transaction","value":{"amount":0.83},"time":0}"#,
        )
        .expect("parse");
        assert_eq!(events[0].event_type, EventType::Purchase);
        assert_eq!(events[0].offer_id, None);
        assert_eq!(events[0].amount, Some(0.83));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let events = parse(
            "\n   \n{\"person\":\"u1\",\"event\":\"offer viewed\",\"value\":{\"offer id\":\"x\"},\"time\":6}\n\n",
        )
        .expect("parse");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn errors_report_the_failing_line() {
        let err = parse("{\"person\":\"u1\",\"event\":\"offer viewed\",\"value\":{},\"time\":1}\nnot json")
            .expect_err("should fail");
        match err {
            IngestError::Event(AttributionError::MalformedEvent { line, .. }) => {
                assert_eq!(line, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse("\nnot json").expect_err("should fail");
        assert!(matches!(err, IngestError::Json { line: 2, .. }));
        assert_eq!(err.code(), ErrorCode::InputParseError);
    }

    #[test]
    fn negative_time_is_malformed() {
        let err = parse(r#"{"person":"u1","event":"offer received","value":{"offer id":"x"},"time":-1}"#)
            .expect_err("should fail");
        assert!(matches!(err, IngestError::Malformed { line: 1, .. }));
    }

    #[test]
    fn unknown_event_string_is_malformed() {
        let err = parse(r#"{"person":"u1","event":"offer expired","value":{"offer id":"x"},"time":3}"#)
            .expect_err("should fail");
        assert!(err.to_string().contains("offer expired"));
    }

    #[test]
    fn numeric_offer_id_is_rejected() {
        let err = parse(r#"{"person":"u1","event":"offer viewed","value":{"offer id":7},"time":3}"#)
            .expect_err("should fail");
        assert!(matches!(err, IngestError::Malformed { .. }));
    }
}

//! Unsolicited notifications from the backing context.
//!
//! # Event Types
//!
//! | Name | Data | Parsed as |
//! |------|------|-----------|
//! | `formautofill-storage-changed` | `"add"` / `"update"` / `"remove"` | [`ParsedEvent::StorageChanged`] |
//! | `onpopupshown` | `{ "results": [...] }` | [`ParsedEvent::PopupShown`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use super::request::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Wire name of the storage-changed notification.
pub const STORAGE_CHANGED: &str = "formautofill-storage-changed";

/// Wire name of the popup-shown notification.
pub const POPUP_SHOWN: &str = "onpopupshown";

// ============================================================================
// ChangeType
// ============================================================================

/// Kind of mutation reported by a storage-changed notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// A record was added.
    Add,
    /// A record was updated.
    Update,
    /// A record was removed.
    Remove,
    /// Any other change type the store reports.
    Other(String),
}

impl ChangeType {
    /// Returns the wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for ChangeType {
    fn from(value: &str) -> Self {
        match value {
            "add" => Self::Add,
            "update" => Self::Update,
            "remove" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event
// ============================================================================

/// A notification from the backing context.
#[derive(Debug, Clone)]
pub struct Event {
    /// Wire name.
    pub name: String,

    /// Raw payload.
    pub data: Value,

    /// Typed view of the payload.
    pub parsed: ParsedEvent,
}

impl Event {
    /// Builds an event from an envelope, handing the envelope back if its
    /// name is not a known notification.
    pub(crate) fn from_envelope(envelope: Envelope) -> Result<Self, Envelope> {
        let parsed = match envelope.name.as_str() {
            STORAGE_CHANGED => {
                let change = envelope.data.as_str().unwrap_or_default();
                ParsedEvent::StorageChanged(ChangeType::from(change))
            }
            POPUP_SHOWN => {
                let results = envelope
                    .data
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                ParsedEvent::PopupShown { results }
            }
            _ => return Err(envelope),
        };

        Ok(Self {
            name: envelope.name,
            data: envelope.data,
            parsed,
        })
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed notification types.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// The backing store mutated.
    StorageChanged(ChangeType),

    /// The autocomplete popup opened.
    PopupShown {
        /// Entries shown in the popup.
        results: Vec<Value>,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn envelope(name: &str, data: Value) -> Envelope {
        Envelope {
            id: None,
            name: name.to_string(),
            data,
        }
    }

    #[test]
    fn test_change_type_strings() {
        assert_eq!(ChangeType::from("add"), ChangeType::Add);
        assert_eq!(ChangeType::from("update"), ChangeType::Update);
        assert_eq!(ChangeType::from("remove"), ChangeType::Remove);
        assert_eq!(
            ChangeType::from("reconcile"),
            ChangeType::Other("reconcile".to_string())
        );
        assert_eq!(ChangeType::Other("x".into()).as_str(), "x");
    }

    #[test]
    fn test_parse_storage_changed() {
        let event = Event::from_envelope(envelope(STORAGE_CHANGED, json!("remove")))
            .expect("known event");
        assert_eq!(event.parsed, ParsedEvent::StorageChanged(ChangeType::Remove));
    }

    #[test]
    fn test_parse_popup_shown() {
        let event = Event::from_envelope(envelope(
            POPUP_SHOWN,
            json!({"results": ["John Smith", "Jane Doe"]}),
        ))
        .expect("known event");

        match event.parsed {
            ParsedEvent::PopupShown { results } => {
                assert_eq!(results, vec![json!("John Smith"), json!("Jane Doe")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_popup_without_results() {
        let event = Event::from_envelope(envelope(POPUP_SHOWN, Value::Null)).expect("known");
        assert_eq!(event.parsed, ParsedEvent::PopupShown { results: vec![] });
    }

    #[test]
    fn test_unknown_event_returns_envelope() {
        let result = Event::from_envelope(envelope("nope", Value::Null));
        assert_eq!(result.map(|_| ()).unwrap_err().name, "nope");
    }
}

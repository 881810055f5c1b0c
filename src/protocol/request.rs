//! Request, response and raw envelope types.
//!
//! Every frame on the channel is a JSON object with a `name`, optional
//! `data`, and an optional correlation `id`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::{Command, Event, Record, ResponseKind};

// ============================================================================
// Request
// ============================================================================

/// A command request from the test script to the backing context.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "name": "FormAutofillTest:AddAddress",
///   "data": { "address": { ... } }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation identifier echoed by the response.
    pub id: RequestId,

    /// Command with name and data.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, command: Command) -> Self {
        Self { id, command }
    }

    /// Returns the response this request waits for.
    #[inline]
    #[must_use]
    pub fn expected_response(&self) -> Option<ResponseKind> {
        self.command.expected_response()
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Raw inbound frame before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Correlation ID, absent on notifications and on legacy responses.
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Message name.
    pub name: String,

    /// Message payload.
    #[serde(default)]
    pub data: Value,
}

/// Inbound frame, classified by name.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Answer to a request.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
    /// Name not part of the vocabulary.
    Unknown(Envelope),
}

impl Envelope {
    /// Classifies the envelope by its name.
    #[must_use]
    pub fn classify(self) -> Incoming {
        if let Some(kind) = ResponseKind::from_name(&self.name) {
            return Incoming::Response(Response {
                id: self.id,
                kind,
                data: self.data,
            });
        }

        match Event::from_envelope(self) {
            Ok(event) => Incoming::Event(event),
            Err(envelope) => Incoming::Unknown(envelope),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the backing context.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "name": "FormAutofillTest:Addresses",
///   "data": [ { "guid": "...", "given-name": "..." } ]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// Correlation ID, if the backing context echoed one.
    pub id: Option<RequestId>,

    /// Response name.
    pub kind: ResponseKind,

    /// Response payload.
    pub data: Value,
}

impl Response {
    /// Decodes the payload of an `AllRecords` response.
    ///
    /// A `null` payload decodes as an empty list.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if this is not an `AllRecords` response
    /// - [`Error::Json`] if the payload is not a list of objects
    pub fn into_records(self) -> Result<Vec<Record>> {
        if self.kind != ResponseKind::AllRecords {
            return Err(Error::protocol(format!(
                "{} carries no records",
                self.kind
            )));
        }

        if self.data.is_null() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_value(self.data)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::RecordId;
    use crate::protocol::{AddressField, ChangeType, ParsedEvent};

    #[test]
    fn test_request_serialization() {
        let request = Request::new(Command::RemoveRecord {
            guid: RecordId::new("g-1"),
        });
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["id"], request.id.to_string());
        assert_eq!(json["name"], "FormAutofillTest:RemoveAddress");
        assert_eq!(json["data"]["guid"], "g-1");
    }

    #[test]
    fn test_request_with_id() {
        let id = RequestId::generate();
        let request = Request::with_id(id, Command::GetAllRecords);
        assert_eq!(request.id, id);
        assert_eq!(request.expected_response(), Some(ResponseKind::AllRecords));
    }

    #[test]
    fn test_classify_response_with_id() {
        let text = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "FormAutofillTest:AddressAdded",
            "data": {}
        }"#;
        let envelope: Envelope = serde_json::from_str(text).expect("parse");

        match envelope.classify() {
            Incoming::Response(response) => {
                assert!(response.id.is_some());
                assert_eq!(response.kind, ResponseKind::RecordAdded);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_response_without_id() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"name": "FormAutofillTest:AddressRemoved"}"#).expect("parse");

        match envelope.classify() {
            Incoming::Response(response) => {
                assert!(response.id.is_none());
                assert!(response.data.is_null());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_event() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"name": "formautofill-storage-changed", "data": "add"}"#)
                .expect("parse");

        match envelope.classify() {
            Incoming::Event(event) => {
                assert!(matches!(
                    event.parsed,
                    ParsedEvent::StorageChanged(ChangeType::Add)
                ));
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"name": "somethingElse"}"#).expect("parse");
        assert!(matches!(envelope.classify(), Incoming::Unknown(_)));
    }

    #[test]
    fn test_into_records() {
        let response = Response {
            id: None,
            kind: ResponseKind::AllRecords,
            data: json!([
                {"guid": "a", "given-name": "John"},
                {"guid": "b", "given-name": "Jane"}
            ]),
        };

        let records = response.into_records().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get(AddressField::GivenName), Some("Jane"));
        assert_eq!(records[0].guid(), Some(RecordId::new("a")));
    }

    #[test]
    fn test_into_records_null_is_empty() {
        let response = Response {
            id: None,
            kind: ResponseKind::AllRecords,
            data: Value::Null,
        };
        assert!(response.into_records().expect("records").is_empty());
    }

    #[test]
    fn test_into_records_wrong_kind() {
        let response = Response {
            id: None,
            kind: ResponseKind::RecordAdded,
            data: json!({}),
        };
        assert!(matches!(
            response.into_records(),
            Err(Error::Protocol { .. })
        ));
    }
}

//! Address records and record comparison.
//!
//! A record maps field names to values. Only the fixed [`AddressField`] set
//! takes part in comparison; anything else the store attaches (`guid`,
//! timestamps, usage counters) is carried along untouched.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::RecordId;

// ============================================================================
// AddressField
// ============================================================================

/// The fixed set of address fields compared by [`records_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressField {
    /// `given-name`
    GivenName,
    /// `additional-name`
    AdditionalName,
    /// `family-name`
    FamilyName,
    /// `organization`
    Organization,
    /// `street-address`
    StreetAddress,
    /// `address-level2` (city)
    AddressLevel2,
    /// `address-level1` (state / province)
    AddressLevel1,
    /// `postal-code`
    PostalCode,
    /// `country`
    Country,
    /// `tel`
    Tel,
    /// `email`
    Email,
}

impl AddressField {
    /// All fields, in store order.
    pub const ALL: [AddressField; 11] = [
        Self::GivenName,
        Self::AdditionalName,
        Self::FamilyName,
        Self::Organization,
        Self::StreetAddress,
        Self::AddressLevel2,
        Self::AddressLevel1,
        Self::PostalCode,
        Self::Country,
        Self::Tel,
        Self::Email,
    ];

    /// Returns the wire name of the field.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GivenName => "given-name",
            Self::AdditionalName => "additional-name",
            Self::FamilyName => "family-name",
            Self::Organization => "organization",
            Self::StreetAddress => "street-address",
            Self::AddressLevel2 => "address-level2",
            Self::AddressLevel1 => "address-level1",
            Self::PostalCode => "postal-code",
            Self::Country => "country",
            Self::Tel => "tel",
            Self::Email => "email",
        }
    }

    /// Looks up a field by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Record
// ============================================================================

/// An address record as exchanged with the backing store.
///
/// # Example
///
/// ```ignore
/// use autofill_bridge::{AddressField, Record};
///
/// let record = Record::new()
///     .with(AddressField::GivenName, "John")
///     .with(AddressField::FamilyName, "Smith")
///     .with(AddressField::Country, "US");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, builder style.
    #[inline]
    #[must_use]
    pub fn with(mut self, field: AddressField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, field: AddressField, value: impl Into<String>) {
        self.0
            .insert(field.as_str().to_string(), Value::String(value.into()));
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: AddressField) -> Option<Value> {
        self.0.remove(field.as_str())
    }

    /// Returns a field's string value.
    ///
    /// `None` if the field is absent or not a string.
    #[inline]
    #[must_use]
    pub fn get(&self, field: AddressField) -> Option<&str> {
        self.0.get(field.as_str()).and_then(Value::as_str)
    }

    /// Returns the raw value under any key, including non-address keys.
    #[inline]
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the store-assigned guid, if present.
    #[must_use]
    pub fn guid(&self) -> Option<RecordId> {
        self.0
            .get("guid")
            .and_then(Value::as_str)
            .map(RecordId::new)
    }

    /// Attaches a guid.
    pub fn set_guid(&mut self, guid: &RecordId) {
        self.0
            .insert("guid".to_string(), Value::String(guid.as_str().to_string()));
    }

    /// Number of keys, address fields or not.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the fixed address fields equal `other`'s.
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &Record) -> bool {
        records_match(self, other)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Compares two records over the fixed [`AddressField`] set.
///
/// Values compare strictly: an absent field equals only another absent
/// field. Keys outside the fixed set are ignored.
#[must_use]
pub fn records_match(a: &Record, b: &Record) -> bool {
    AddressField::ALL
        .iter()
        .all(|field| a.0.get(field.as_str()) == b.0.get(field.as_str()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn full_record() -> Record {
        AddressField::ALL
            .iter()
            .fold(Record::new(), |record, field| {
                record.with(*field, format!("value-{field}"))
            })
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in AddressField::ALL {
            assert_eq!(AddressField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(AddressField::from_name("guid"), None);
    }

    #[test]
    fn test_record_serializes_as_flat_object() {
        let record = Record::new()
            .with(AddressField::GivenName, "John")
            .with(AddressField::Country, "US");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json, json!({"given-name": "John", "country": "US"}));
    }

    #[test]
    fn test_guid_accessors() {
        let mut record: Record =
            serde_json::from_value(json!({"guid": "g-1", "tel": "123"})).expect("parse");
        assert_eq!(record.guid(), Some(RecordId::new("g-1")));

        record.set_guid(&RecordId::new("g-2"));
        assert_eq!(record.guid(), Some(RecordId::new("g-2")));
        assert_eq!(record.get(AddressField::Tel), Some("123"));
    }

    #[test]
    fn test_match_ignores_extra_keys() {
        let original = full_record();
        let mut stored = original.clone();
        stored.set_guid(&RecordId::new("abc"));
        stored
            .0
            .insert("timesUsed".to_string(), json!(3));

        assert!(records_match(&original, &stored));
        assert!(records_match(&stored, &original));
    }

    #[test]
    fn test_absent_field_differs_from_present() {
        let a = Record::new().with(AddressField::Email, "a@example.com");
        let b = Record::new();
        assert!(!records_match(&a, &b));
        assert!(!records_match(&b, &a));
    }

    #[test]
    fn test_empty_string_differs_from_absent() {
        let a = Record::new().with(AddressField::Tel, "");
        assert!(!records_match(&a, &Record::new()));
    }

    #[test]
    fn test_single_field_difference() {
        let a = full_record();
        let b = full_record().with(AddressField::PostalCode, "99999");
        assert!(!a.matches(&b));
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        (
            proptest::collection::vec(proptest::option::of("[a-z0-9 ]{0,8}"), 11),
            proptest::collection::btree_map("[a-zA-Z]{1,6}", "[a-z]{0,4}", 0..4),
        )
            .prop_map(|(values, extra)| {
                let mut record = Record::new();
                for (field, value) in AddressField::ALL.iter().zip(values) {
                    if let Some(value) = value {
                        record.set(*field, value);
                    }
                }
                for (key, value) in extra {
                    if AddressField::from_name(&key).is_none() {
                        record.0.insert(key, Value::String(value));
                    }
                }
                record
            })
    }

    proptest! {
        #[test]
        fn prop_match_is_reflexive(a in arb_record()) {
            prop_assert!(records_match(&a, &a));
        }

        #[test]
        fn prop_match_is_symmetric(a in arb_record(), b in arb_record()) {
            prop_assert_eq!(records_match(&a, &b), records_match(&b, &a));
        }

        #[test]
        fn prop_match_ignores_non_address_keys(
            a in arb_record(),
            key in "x-[a-z]{1,6}",
            value in "[a-z]{0,6}"
        ) {
            let mut b = a.clone();
            b.0.insert(key, Value::String(value));
            prop_assert!(records_match(&a, &b));
        }
    }
}

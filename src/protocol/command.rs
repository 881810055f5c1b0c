//! Request commands and their response names.
//!
//! Every storage command has exactly one response name the backing context
//! answers with:
//!
//! | Command | Wire name | Response |
//! |---------|-----------|----------|
//! | [`Command::AddRecord`] | `FormAutofillTest:AddAddress` | `FormAutofillTest:AddressAdded` |
//! | [`Command::RemoveRecord`] | `FormAutofillTest:RemoveAddress` | `FormAutofillTest:AddressRemoved` |
//! | [`Command::UpdateRecord`] | `FormAutofillTest:UpdateAddress` | `FormAutofillTest:AddressUpdated` |
//! | [`Command::GetAllRecords`] | `FormAutofillTest:GetAddresses` | `FormAutofillTest:Addresses` |
//! | [`Command::Cleanup`] | `cleanup` | none |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::RecordId;

use super::Record;

// ============================================================================
// Command
// ============================================================================

/// Commands sent from the test script to the backing context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum Command {
    /// Store a new record.
    #[serde(rename = "FormAutofillTest:AddAddress")]
    AddRecord {
        /// Record to add.
        address: Record,
    },

    /// Delete a record by guid.
    #[serde(rename = "FormAutofillTest:RemoveAddress")]
    RemoveRecord {
        /// Record to remove.
        guid: RecordId,
    },

    /// Replace the fields of an existing record.
    #[serde(rename = "FormAutofillTest:UpdateAddress")]
    UpdateRecord {
        /// New field values.
        address: Record,
        /// Record to update.
        guid: RecordId,
    },

    /// Fetch every stored record.
    #[serde(rename = "FormAutofillTest:GetAddresses")]
    GetAllRecords,

    /// Ask the backing context to tear down test state. Never answered.
    #[serde(rename = "cleanup")]
    Cleanup,
}

impl Command {
    /// Returns the wire name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddRecord { .. } => "FormAutofillTest:AddAddress",
            Self::RemoveRecord { .. } => "FormAutofillTest:RemoveAddress",
            Self::UpdateRecord { .. } => "FormAutofillTest:UpdateAddress",
            Self::GetAllRecords => "FormAutofillTest:GetAddresses",
            Self::Cleanup => "cleanup",
        }
    }

    /// Returns the response this command is answered with.
    ///
    /// `None` for fire-and-forget commands.
    #[must_use]
    pub const fn expected_response(&self) -> Option<ResponseKind> {
        match self {
            Self::AddRecord { .. } => Some(ResponseKind::RecordAdded),
            Self::RemoveRecord { .. } => Some(ResponseKind::RecordRemoved),
            Self::UpdateRecord { .. } => Some(ResponseKind::RecordUpdated),
            Self::GetAllRecords => Some(ResponseKind::AllRecords),
            Self::Cleanup => None,
        }
    }
}

// ============================================================================
// ResponseKind
// ============================================================================

/// Response names the backing context sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// `FormAutofillTest:AddressAdded`
    RecordAdded,
    /// `FormAutofillTest:AddressRemoved`
    RecordRemoved,
    /// `FormAutofillTest:AddressUpdated`
    RecordUpdated,
    /// `FormAutofillTest:Addresses`
    AllRecords,
}

impl ResponseKind {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecordAdded => "FormAutofillTest:AddressAdded",
            Self::RecordRemoved => "FormAutofillTest:AddressRemoved",
            Self::RecordUpdated => "FormAutofillTest:AddressUpdated",
            Self::AllRecords => "FormAutofillTest:Addresses",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FormAutofillTest:AddressAdded" => Some(Self::RecordAdded),
            "FormAutofillTest:AddressRemoved" => Some(Self::RecordRemoved),
            "FormAutofillTest:AddressUpdated" => Some(Self::RecordUpdated),
            "FormAutofillTest:Addresses" => Some(Self::AllRecords),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Record storage operations.

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::RecordId;
use crate::protocol::{Command, Record, records_match};

use super::Bridge;

// ============================================================================
// Bridge - Records
// ============================================================================

impl Bridge {
    /// Adds a record to the store.
    pub async fn add_record(&self, record: &Record) -> Result<()> {
        debug!(fields = record.len(), "Adding record");

        self.send(Command::AddRecord {
            address: record.clone(),
        })
        .await?;
        Ok(())
    }

    /// Removes a record by guid.
    ///
    /// A store that does not know `id` may never answer; bound the wait with
    /// a request timeout if that matters.
    pub async fn remove_record(&self, id: &RecordId) -> Result<()> {
        debug!(guid = %id, "Removing record");

        self.send(Command::RemoveRecord { guid: id.clone() }).await?;
        Ok(())
    }

    /// Replaces the fields of the record with guid `id`.
    pub async fn update_record(&self, id: &RecordId, record: &Record) -> Result<()> {
        debug!(guid = %id, "Updating record");

        self.send(Command::UpdateRecord {
            address: record.clone(),
            guid: id.clone(),
        })
        .await?;
        Ok(())
    }

    /// Fetches every stored record, in store order.
    pub async fn get_all_records(&self) -> Result<Vec<Record>> {
        let records = self.send(Command::GetAllRecords).await?.into_records()?;

        debug!(count = records.len(), "Got all records");
        Ok(records)
    }

    /// Checks that the store holds exactly records matching `expected`.
    ///
    /// Order is ignored. Each stored record pairs with at most one expected
    /// record. Returns the stored records on success.
    ///
    /// # Errors
    ///
    /// - [`Error::RecordCountMismatch`] if the counts differ
    /// - [`Error::RecordMismatch`] for the first expected record left without
    ///   an unpaired stored match
    pub async fn check_records(&self, expected: &[Record]) -> Result<Vec<Record>> {
        let stored = self.get_all_records().await?;

        if stored.len() != expected.len() {
            return Err(Error::RecordCountMismatch {
                expected: expected.len(),
                actual: stored.len(),
            });
        }

        let mut paired = vec![false; stored.len()];
        for (index, want) in expected.iter().enumerate() {
            let slot = stored
                .iter()
                .zip(&paired)
                .position(|(have, taken)| !taken && records_match(want, have));
            match slot {
                Some(slot) => paired[slot] = true,
                None => return Err(Error::RecordMismatch { index }),
            }
        }

        Ok(stored)
    }
}

// ============================================================================
// Tests
// ============================================================================

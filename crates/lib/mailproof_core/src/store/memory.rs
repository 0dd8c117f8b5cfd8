//! In-memory stores.
//!
//! Same semantics as the Postgres stores, plus call counters and switchable
//! failures so callers can observe exactly which store operations ran.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{Lookup, ProfileStore, StoreError, ValidationTokenStore};
use crate::models::{FiscalCode, Profile, ProfileRow, ValidationTokenRecord, ValidationTokenRow};
use crate::token::VerificationHash;

fn unavailable() -> StoreError {
    StoreError::Internal("store unavailable".into())
}

/// Validation tokens keyed by `(token id, verification hash)`.
#[derive(Debug, Default)]
pub struct MemoryValidationTokenStore {
    rows: Mutex<HashMap<(String, String), ValidationTokenRow>>,
    failing: AtomicBool,
    get_calls: AtomicUsize,
}

impl MemoryValidationTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a well-formed record.
    pub fn insert(
        &self,
        token_id: &str,
        hash: &VerificationHash,
        fiscal_code: &str,
        email: &str,
        invalid_after: DateTime<Utc>,
    ) {
        self.insert_row(ValidationTokenRow {
            partition_key: token_id.to_string(),
            row_key: hash.as_str().to_string(),
            fiscal_code: Some(fiscal_code.to_string()),
            email: Some(email.to_string()),
            invalid_after: Some(invalid_after),
        });
    }

    /// Insert a raw row, which need not decode.
    pub fn insert_row(&self, row: ValidationTokenRow) {
        let key = (row.partition_key.clone(), row.row_key.clone());
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, row);
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationTokenStore for MemoryValidationTokenStore {
    async fn get(&self, token_id: &str, hash: &VerificationHash) -> Lookup<ValidationTokenRecord> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Lookup::Failed(unavailable());
        }
        let row = self
            .rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(token_id.to_string(), hash.as_str().to_string()))
            .cloned();
        Lookup::decode(row)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

/// Versioned profiles keyed by fiscal code.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    versions: Mutex<HashMap<String, Vec<ProfileRow>>>,
    failing_reads: AtomicBool,
    failing_writes: AtomicBool,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile as a new version.
    pub fn insert(
        &self,
        fiscal_code: &str,
        email: Option<&str>,
        is_email_validated: bool,
        attributes: Map<String, Value>,
    ) {
        let version = self.latest_row(fiscal_code).map_or(0, |row| row.version + 1);
        self.insert_row(ProfileRow {
            fiscal_code: fiscal_code.to_string(),
            version,
            email: email.map(str::to_string),
            is_email_validated,
            attributes: Value::Object(attributes),
        });
    }

    /// Insert a raw row, which need not decode.
    pub fn insert_row(&self, row: ProfileRow) {
        self.versions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(row.fiscal_code.clone())
            .or_default()
            .push(row);
    }

    /// Latest stored version, decoded or not.
    pub fn latest_row(&self, fiscal_code: &str) -> Option<ProfileRow> {
        self.versions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(fiscal_code)
            .and_then(|rows| rows.iter().max_by_key(|row| row.version).cloned())
    }

    /// Number of stored versions for a profile.
    pub fn version_count(&self, fiscal_code: &str) -> usize {
        self.versions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(fiscal_code)
            .map_or(0, Vec::len)
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_latest(&self, fiscal_code: &FiscalCode) -> Lookup<Profile> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.load(Ordering::SeqCst) {
            return Lookup::Failed(unavailable());
        }
        Lookup::decode(self.latest_row(fiscal_code.as_str()))
    }

    async fn update_latest(&self, profile: Profile) -> Result<Profile, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let next_version = profile.version + 1;
        let mut versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        let rows = versions
            .entry(profile.fiscal_code.as_str().to_string())
            .or_default();
        if rows.iter().any(|row| row.version == next_version) {
            return Err(StoreError::Conflict(format!(
                "profile version {next_version} already exists"
            )));
        }

        let stored = Profile {
            version: next_version,
            ..profile
        };
        rows.push(ProfileRow {
            fiscal_code: stored.fiscal_code.as_str().to_string(),
            version: stored.version,
            email: stored.email.clone(),
            is_email_validated: stored.is_email_validated,
            attributes: Value::Object(stored.attributes.clone()),
        });
        Ok(stored)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

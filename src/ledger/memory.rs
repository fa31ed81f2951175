// src/ledger/memory.rs
//! In-memory ledger used by the test suite.
//!
//! Behaves like the attestation program for the operations this service
//! consumes: at most one record per address, reads by address, full program
//! scans. Tracks write counts so idempotence tests can assert "exactly one
//! ledger write".

use axum::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::Error;
use crate::ledger::client::{
    AttestationAccount, ConfirmationHandle, CreateAttestation, LedgerAddress, LedgerClient,
};

#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<HashMap<LedgerAddress, AttestationAccount>>,
    writes: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn read_attestation(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<AttestationAccount>, Error> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn create_attestation(
        &self,
        input: CreateAttestation,
    ) -> Result<ConfirmationHandle, Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&input.address) {
            return Err(Error::LedgerUnavailable(
                "account already exists".into(),
            ));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let handle = format!("sig-{}", self.writes.load(Ordering::SeqCst));
        accounts.insert(
            input.address,
            AttestationAccount {
                schema: input.schema,
                expiry: input.expiry,
                data: input.data,
            },
        );
        Ok(ConfirmationHandle(handle))
    }

    async fn list_attestations(
        &self,
    ) -> Result<Vec<(LedgerAddress, AttestationAccount)>, Error> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .map(|(address, account)| (address.clone(), account.clone()))
            .collect())
    }
}

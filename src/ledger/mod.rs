// src/ledger/mod.rs

pub mod client;
#[cfg(test)]
pub mod memory;
pub mod rpc;

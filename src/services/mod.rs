// src/services/mod.rs

pub mod api_server;
pub mod attestation;
pub mod data_request;
pub mod keys;
pub mod merkle;
pub mod session_store;
pub mod signature;
pub mod token;
pub mod verification;

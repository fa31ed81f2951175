// src/models/mod.rs

pub mod attestation;
pub mod session;
pub mod token;

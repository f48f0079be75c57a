//! powledger - a single-node proof-of-work ledger
//! 
//! This library implements:
//! - Blocks sealed by a fixed-difficulty SHA-256 proof of work
//! - Merkle roots over transaction ids
//! - A sled-backed, hash-chained block store with a backward iterator
//! - A UTXO index with full reindex and incremental update
//! - Base58Check addresses and a JSON wallet file
//! - A command line interface

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod mining;
pub mod storage;
pub mod wallet;

pub use error::{LedgerError, Result};

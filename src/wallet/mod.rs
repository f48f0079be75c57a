//! Local key storage

pub mod wallet;

pub use wallet::Wallets;

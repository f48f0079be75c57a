//! Hashing and key primitives

pub mod hash;
pub mod keys;

pub use hash::{Hash160, Hash256, Hashable};
pub use keys::{KeyPair, PrivateKey, PublicKey};

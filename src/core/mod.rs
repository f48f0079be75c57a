//! Core ledger components

pub mod block;
pub mod blockchain;
pub mod ledger;
pub mod merkle;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockHeader};
pub use blockchain::{Blockchain, BlockchainIterator};
pub use ledger::{AddressResolver, Base58Addresses, BlockSummary, Ledger};
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput};
pub use utxo::{UtxoEntry, UtxoSet};

//! Block sealing

pub mod pow;

pub use pow::ProofOfWork;

pub mod audit;
pub mod cluster;
pub mod fingerprint;
pub mod index;
pub mod quarantine;
pub mod report;
pub mod scanner;
pub mod similarity;
pub mod verify;

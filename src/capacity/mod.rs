pub mod aggregate;
pub mod budget;
pub mod clients;
pub mod conditions;
pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod release;
pub mod replicas;
pub mod status;
pub mod workload;

pub use error::{Error, Result};
pub use handler::{SyncHandler, SyncOutcome};

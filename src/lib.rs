pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{AlloyContractReader, ContractReader, MockContractReader, ReadError, RouterView};
pub use db::{init_db, Repository};
pub use domain::{ChainEvent, EventKind, EventMeta};
pub use error::IndexerError;
pub use orchestration::{DispatchReport, EventRouter, FeedRunner, FeedStats, SnapshotOutcome};

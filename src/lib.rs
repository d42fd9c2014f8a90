pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod labeling;
pub mod remote;
pub mod selector;
pub mod utils;

use clap::Parser;

pub use catalog::{Catalog, CatalogEntry};
pub use config::AppConfig;
pub use db::{
    Category, Database, DuplicatePolicy, LabelEvent, LabelStats, LabelStore, MemoryStore, Picture,
    StorageKind,
};
pub use error::{LabelError, RemoteError};
pub use events::{EventSink, LabelingEvent};
pub use labeling::{
    LabelingService, LabelingSession, MenuTier, NextPicture, PickOutcome, RemoteDelete,
    ServiceOptions, SyncOutcome, UndoOutcome,
};
pub use remote::{FirestoreConfig, FirestoreRemote, MemoryRemote, RemoteKind, RemoteStore};
pub use selector::{SelectionPolicy, Selector};

pub fn run() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    // RUST_LOG wins over --log-level when both are set.
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .parse_default_env()
        .init();

    log::info!("roilabel starting up...");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(cli::execute(args))
}

//! Command line front end for the simtally accumulation engine

pub mod commands;
pub mod logging;
pub mod settings;
pub mod storage;

pub use logging::init_logging;
pub use settings::Settings;
pub use storage::{StorageError, StorageFormat};

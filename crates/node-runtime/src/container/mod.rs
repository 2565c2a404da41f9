//! # Node Container
//!
//! Configuration plus the assembled module graph: stores, feature modules,
//! router, consensus adapter and gateway, with their dependency gates wired.

pub mod config;
pub mod modules;

pub use config::{ConfigError, EngineConfig, GenesisConfig, NodeConfig, StorageConfig};
pub use modules::{AssemblyError, NodeModules};

//! # Cadence Node Runtime
//!
//! Assembles the application side of a replicated state machine and runs
//! it.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────────────────────────┐
//!  consensus ────→ │ Router (one Application for the engine)  │
//!  engine          │   Info, Query, CheckTx, InitChain, ...   │
//!                  └──────┬──────────┬──────────┬─────────────┘
//!                         ↓          ↓          ↓
//!                      account   validator    chain   statesync
//!                         └──────────┴──────────┘
//!                                    ↓
//!                        ChainStore (one batch per block)
//! ```
//!
//! ## Modular Structure
//!
//! - `router/` - callback registration and per-kind response reduction
//! - `container/` - configuration and module assembly with gate wiring
//! - `supervisor/` - task group and gated start/stop of every module
//! - `adapters/` - consensus engine port and the single-node engine
//!
//! ## Startup Sequence
//!
//! 1. Load configuration and genesis from the node home
//! 2. Open the chain and local stores
//! 3. Assemble modules, build the router, wire dependency gates
//! 4. Start every module concurrently; gates decide who waits for whom
//! 5. The consensus adapter starts the engine once its modules are ready
//! 6. The gateway serves once the consensus adapter is ready

pub mod adapters;
pub mod app;
pub mod container;
pub mod router;
pub mod supervisor;

pub use app::App;
pub use container::{AssemblyError, ConfigError, GenesisConfig, NodeConfig, NodeModules};
pub use router::{Registration, Router};
pub use supervisor::{Supervisor, TaskGroup};

//! # Adapter Implementations
//!
//! Infrastructure around the module graph:
//!
//! ```text
//! ┌──────────────┐   callbacks   ┌─────────────────────┐
//! │  SoloEngine  │ ────────────→ │  ConsensusAdapter   │──→ Router ──→ modules
//! │ (engine port)│ ←──────────── │  (module "consensus")│
//! └──────────────┘   broadcast   └─────────────────────┘
//!        ↑
//!        └── TxBroadcaster ←── JSON-RPC gateway
//! ```

pub mod consensus;
pub mod solo_engine;

pub use consensus::{ConsensusAdapter, ConsensusEngine};
pub use solo_engine::{block_hash, SoloEngine};

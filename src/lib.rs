//! Blockwork Engine
//!
//! Resumable, budgeted mutation of large voxel regions, with every change
//! journaled so it can be undone or redone later.
//!
//! ## Architecture
//!
//! ```text
//! EngineAgent  (agent.rs)         ← JSON-lines requests, tick loop
//!   └── Scheduler  (scheduler.rs) ← queue, id sequences, undo/redo cache
//!         └── Operation  (operation.rs)      ← ticked state machine
//!               ├── ChangeJournal  (journal.rs)    ← pre/post snapshots
//!               └── PlacementDriver  (placement.rs) ← four-phase placement
//!                     └── BlueprintPlacer  (blueprint.rs)
//! ```
//!
//! Every world read and write goes through [`WorldAccess`]; [`GridWorld`] is
//! the in-memory implementation used by the server binary.

// Engine modules are always available (no server feature needed).
pub mod block;
pub mod blueprint;
pub mod config;
pub mod error;
pub mod grid;
pub mod journal;
pub mod operation;
pub mod placement;
pub mod protocol;
pub mod scheduler;
pub mod types;
pub mod world;

// The async request agent requires the `server` feature.
#[cfg(feature = "server")]
pub mod agent;

// Convenience re-exports
#[cfg(feature = "server")]
pub use agent::{AgentConfig, EngineAgent};
pub use block::{BlockState, CellPart, EntityId, EntitySnapshot, ItemKind};
pub use blueprint::{Blueprint, BlueprintPlacer};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use grid::GridWorld;
pub use journal::{ChangeJournal, Direction, ReplayOutcome};
pub use operation::{ApplyOutcome, GridEdit, Operation, OperationKind, OperationState};
pub use placement::{PlacementDriver, PlacementPhase, StructurePlacer};
pub use scheduler::{FinishedOperation, Scheduler, TickReport};
pub use types::{Coord, EngineStats, JournalId, OperationId, OwnerId, Region, Vec3, WorldId};
pub use world::{EntityCodec, WorldAccess};

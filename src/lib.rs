//! bubble-layout - precomputed force-directed layouts for event timeline charts.
//!
//! Events become bubbles on a time axis: x follows the event date, the radius
//! follows the registered participant count, and a force simulation spreads
//! overlapping bubbles vertically. Two charts are produced from the same
//! records, one global timeline and one with a horizontal lane per city. The
//! resulting positions are written once as a JSON artifact and looked up by id
//! at render time.

pub mod codec;
pub mod config;
pub mod error;
pub mod grid;
pub mod hit;
pub mod io;
pub mod lanes;
pub mod layout;
pub mod model;
pub mod nodes;
pub mod sampler;
pub mod scale;
pub mod simulation;

pub use codec::{ArtifactLookup, ArtifactMeta, PositionArtifact, PositionLookup, PositionRecord};
pub use config::LayoutConfig;
pub use error::{LayoutError, LayoutResult};
pub use layout::{LayoutMode, compute_positions};
pub use model::EventRecord;
pub use simulation::{RunMode, Simulation, SimulationConfig};

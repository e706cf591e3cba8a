//! Error types for the layout engine
//!
//! Only configuration and programming mistakes surface here. Data anomalies
//! (missing magnitudes, unknown lanes, malformed artifact records) are logged
//! and recovered where they happen.

use thiserror::Error;

/// Precondition violations detected before or while building a layout
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Radius scale produces zero, negative or unbounded radii
    #[error("invalid radius bounds: min={min}, max={max} (need 0 < min <= max)")]
    InvalidRadiusBounds { min: f64, max: f64 },

    /// Radius scale factor or fallback magnitude is unusable
    #[error("invalid radius scale: {0}")]
    InvalidRadiusScale(String),

    /// Canvas leaves no room for the smallest bubble once margins are removed
    #[error("canvas {width}x{height} leaves no usable area inside the margins")]
    InvalidCanvas { width: f64, height: f64 },

    /// Year range is inverted
    #[error("invalid year range: {start}..={end}")]
    InvalidYearRange { start: i32, end: i32 },

    /// Lane mode was requested but no lane could be derived
    #[error("lane mode requires at least one lane, found none")]
    NoLanes,

    /// Lanes are too thin to hold the largest bubble
    #[error("lane height {lane_height:.2}px cannot hold a bubble of diameter {diameter:.2}px")]
    LaneTooThin { lane_height: f64, diameter: f64 },

    /// A node carries a radius the engine cannot simulate
    #[error("node {id} has invalid radius {radius}")]
    InvalidNodeRadius { id: u64, radius: f64 },

    /// Force parameters are outside their domain
    #[error("invalid force configuration: {0}")]
    InvalidForceConfig(String),
}

/// Result type for layout operations
pub type LayoutResult<T> = Result<T, LayoutError>;

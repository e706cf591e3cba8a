//! Core data types shared by the layout pipeline

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One event as handed over by the ingestion step
///
/// Records with unparseable dates never get this far; every `date` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Stable identifier, the join key between events and positions
    pub id: u64,
    /// Calendar date of the event
    pub date: NaiveDate,
    /// City the event was registered in (lane key in by-city mode)
    #[serde(default)]
    pub city: Option<String>,
    /// Registered participant count, drives the bubble size
    #[serde(default)]
    pub participants_registered: Option<f64>,
}

impl EventRecord {
    /// Coarse period used for stratified sampling
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// Vertical band a node must stay inside, edges inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub top: f64,
    pub bottom: f64,
}

impl Band {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> f64 {
        self.top + self.height() / 2.0
    }

    /// Clamp a circle center so the whole circle fits in the band
    pub fn clamp_circle(&self, y: f64, radius: f64) -> f64 {
        (self.bottom - radius).min(y).max(self.top + radius)
    }

    /// Whether a circle lies in the band, allowing `tolerance` of slack
    pub fn contains_circle(&self, y: f64, radius: f64, tolerance: f64) -> bool {
        y - radius >= self.top - tolerance && y + radius <= self.bottom + tolerance
    }

    /// Largest two-decimal radius whose rounded circle still fits inside
    pub fn fitting_radius(&self) -> f64 {
        ((self.height() / 2.0 - 0.01) * 100.0).floor() / 100.0
    }
}

/// A simulated particle for one event
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Event id
    pub id: u64,
    /// Bubble radius, always within the radius scale bounds
    pub radius: f64,
    /// Attractor on the time axis
    pub target_x: f64,
    /// Attractor on the vertical axis (lane or viewport center)
    pub target_y: f64,
    /// Current position
    pub x: f64,
    pub y: f64,
    /// Current velocity
    pub vx: f64,
    pub vy: f64,
    /// Index of the lane this node belongs to, if any
    pub lane: Option<usize>,
    /// Band enforced by the post-simulation clamp
    pub band: Band,
}

impl Node {
    /// Create a node resting on its target
    pub fn at_target(id: u64, radius: f64, target_x: f64, target_y: f64, band: Band) -> Self {
        Self {
            id,
            radius,
            target_x,
            target_y,
            x: target_x,
            y: target_y,
            vx: 0.0,
            vy: 0.0,
            lane: None,
            band,
        }
    }
}

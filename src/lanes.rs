//! Horizontal lanes, one per category
//!
//! Lanes split the usable vertical extent into equal, contiguous bands.
//! Keys are sorted by ordinal string comparison so the same key set always
//! produces the same lanes.

use std::collections::{BTreeSet, HashMap};

use crate::error::{LayoutError, LayoutResult};
use crate::model::Band;

/// One horizontal band reserved for a category
#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub key: String,
    pub y_center: f64,
    pub height: f64,
}

impl Lane {
    pub fn band(&self) -> Band {
        Band::new(
            self.y_center - self.height / 2.0,
            self.y_center + self.height / 2.0,
        )
    }
}

/// All lanes of one layout, with key lookup
#[derive(Debug, Clone, Default)]
pub struct LaneLayout {
    lanes: Vec<Lane>,
    index: HashMap<String, usize>,
}

impl LaneLayout {
    /// Allocate lanes for `keys` inside `extent`.
    ///
    /// Duplicate keys collapse into one lane. Fails when no key is given.
    pub fn allocate<I, S>(keys: I, extent: Band) -> LayoutResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(LayoutError::NoLanes);
        }

        let height = extent.height() / keys.len() as f64;
        let lanes: Vec<Lane> = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| Lane {
                key,
                y_center: extent.top + i as f64 * height + height / 2.0,
                height,
            })
            .collect();
        let index = lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| (lane.key.clone(), i))
            .collect();

        Ok(Self { lanes, index })
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Height shared by every lane
    pub fn lane_height(&self) -> f64 {
        self.lanes.first().map_or(0.0, |lane| lane.height)
    }

    /// Index of the lane holding `key`
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Lane> {
        self.lanes.get(index)
    }

    /// Fail when even a bubble of `min_radius` cannot fit inside one lane.
    ///
    /// Larger bubbles are capped to the lane's fitting radius when nodes are built.
    pub fn ensure_fits(&self, min_radius: f64) -> LayoutResult<()> {
        let diameter = 2.0 * min_radius;
        let lane_height = self.lane_height();
        let fitting = self
            .lanes
            .iter()
            .map(|lane| lane.band().fitting_radius())
            .fold(f64::INFINITY, f64::min);
        if fitting < min_radius {
            return Err(LayoutError::LaneTooThin {
                lane_height,
                diameter,
            });
        }
        Ok(())
    }
}

//! Cursor-to-bubble hit testing
//!
//! Hover is forgiving: the nearest bubble within `hover_threshold` pixels
//! that is also within `radius + hover_pad` of the cursor. Click is strict:
//! the nearest bubble within `radius + click_pad`. Ties go to the earlier
//! record.

use serde::{Deserialize, Serialize};

use crate::codec::PositionRecord;
use crate::grid::UniformGrid;

/// Which interaction is asking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Hover,
    Click,
}

/// Distance budgets for hover and click
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitPolicy {
    /// Hover never reaches farther than this from the cursor
    pub hover_threshold: f64,
    /// Hover slack beyond a bubble's radius
    pub hover_pad: f64,
    /// Click slack beyond a bubble's radius
    pub click_pad: f64,
}

impl Default for HitPolicy {
    fn default() -> Self {
        Self {
            hover_threshold: 20.0,
            hover_pad: 10.0,
            click_pad: 5.0,
        }
    }
}

impl HitPolicy {
    /// Whether a bubble of `radius` at `distance` from the cursor is hit
    pub fn accepts(&self, kind: HitKind, distance: f64, radius: f64) -> bool {
        match kind {
            HitKind::Hover => distance < self.hover_threshold && distance < radius + self.hover_pad,
            HitKind::Click => distance <= radius + self.click_pad,
        }
    }

    /// Farthest distance at which any bubble up to `max_radius` can be hit
    pub fn reach(&self, kind: HitKind, max_radius: f64) -> f64 {
        match kind {
            HitKind::Hover => self.hover_threshold.min(max_radius + self.hover_pad),
            HitKind::Click => max_radius + self.click_pad,
        }
    }
}

fn distance(record: &PositionRecord, x: f64, y: f64) -> f64 {
    (record.x - x).hypot(record.y - y)
}

/// Linear scan; returns the index of the hit record
pub fn nearest_linear(
    records: &[PositionRecord],
    x: f64,
    y: f64,
    kind: HitKind,
    policy: &HitPolicy,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, record) in records.iter().enumerate() {
        let d = distance(record, x, y);
        if policy.accepts(kind, d, record.r) && best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((index, d));
        }
    }
    best.map(|(index, _)| index)
}

/// Grid-backed hit tester over one layout's positions
#[derive(Debug, Clone)]
pub struct HitIndex {
    records: Vec<PositionRecord>,
    grid: UniformGrid,
    policy: HitPolicy,
    max_radius: f64,
}

impl HitIndex {
    pub fn new(records: Vec<PositionRecord>, policy: HitPolicy) -> Self {
        let max_radius = records.iter().map(|r| r.r).fold(0.0, f64::max);
        let cell = policy
            .reach(HitKind::Hover, max_radius)
            .max(policy.reach(HitKind::Click, max_radius))
            .max(1.0);
        let points: Vec<(f64, f64)> = records.iter().map(|r| (r.x, r.y)).collect();
        let grid = UniformGrid::build(&points, cell);
        Self {
            records,
            grid,
            policy,
            max_radius,
        }
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    pub fn policy(&self) -> &HitPolicy {
        &self.policy
    }

    /// Record hit at `(x, y)`, if any
    pub fn query(&self, x: f64, y: f64, kind: HitKind) -> Option<&PositionRecord> {
        self.query_visible(x, y, kind, |_| true)
    }

    /// Like [`HitIndex::query`], ignoring records for which `visible` is false
    pub fn query_visible(
        &self,
        x: f64,
        y: f64,
        kind: HitKind,
        visible: impl Fn(&PositionRecord) -> bool,
    ) -> Option<&PositionRecord> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let reach = self.policy.reach(kind, self.max_radius);
        let mut best: Option<(usize, f64)> = None;
        self.grid.for_each_candidate(x, y, reach, |index| {
            let record = &self.records[index];
            let d = distance(record, x, y);
            if !self.policy.accepts(kind, d, record.r) || !visible(record) {
                return;
            }
            let better = match best {
                None => true,
                Some((best_index, best_d)) => d < best_d || (d == best_d && index < best_index),
            };
            if better {
                best = Some((index, d));
            }
        });
        best.map(|(index, _)| &self.records[index])
    }
}

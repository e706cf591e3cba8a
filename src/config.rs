//! Layout configuration
//!
//! Every field has a default, so an empty file (or no file) gives the stock
//! 1400x600 chart. Files are YAML or JSON, picked by extension.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};
use crate::hit::HitPolicy;
use crate::io::{IoError, IoResult, extension_from_path};
use crate::model::Band;
use crate::scale::{RadiusScale, YearRange};

/// Drawing surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 600,
        }
    }
}

/// Space kept free around the plot area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 50.0,
            right: 20.0,
            bottom: 40.0,
            left: 20.0,
        }
    }
}

/// Margins per layout mode; the by-city chart leaves room for lane labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeMargins {
    pub all: Margin,
    pub by_city: Margin,
}

impl Default for ModeMargins {
    fn default() -> Self {
        Self {
            all: Margin::default(),
            by_city: Margin {
                left: 120.0,
                ..Margin::default()
            },
        }
    }
}

/// Plot area left inside a canvas once a margin is removed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl PlotArea {
    /// Vertical extent as a band
    pub fn band(&self) -> Band {
        Band::new(self.top, self.bottom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub canvas: Canvas,
    pub year_range: YearRange,
    pub margins: ModeMargins,
    pub radius: RadiusScale,
    /// Per-year stratified sampling cap; `None` keeps every record
    pub sample_cap: Option<usize>,
    /// Tick budget for preview runs
    pub preview_ticks: usize,
    pub hit: HitPolicy,
    /// Cooling threshold shared by both modes
    pub alpha_min: f64,
    /// Per-tick cooling rate; derived from `alpha_min` for 300 ticks when absent
    pub alpha_decay: Option<f64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            year_range: YearRange::default(),
            margins: ModeMargins::default(),
            radius: RadiusScale::default(),
            sample_cap: None,
            preview_ticks: 120,
            hit: HitPolicy::default(),
            alpha_min: 0.001,
            alpha_decay: None,
        }
    }
}

impl LayoutConfig {
    /// Load a config file, YAML or JSON by extension
    pub fn load(path: &Path) -> IoResult<Self> {
        let ext = extension_from_path(path)
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;
        let text = fs::read_to_string(path)?;
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| IoError::Parse(e.to_string())),
            "json" => serde_json::from_str(&text).map_err(|e| IoError::Parse(e.to_string())),
            other => Err(IoError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Plot area for a margin
    pub fn plot_area(&self, margin: &Margin) -> PlotArea {
        PlotArea {
            left: margin.left,
            right: f64::from(self.canvas.width) - margin.right,
            top: margin.top,
            bottom: f64::from(self.canvas.height) - margin.bottom,
        }
    }

    /// `alpha_decay` as configured, or the 300-tick schedule for `alpha_min`
    pub fn effective_alpha_decay(&self) -> f64 {
        self.alpha_decay
            .unwrap_or_else(|| 1.0 - self.alpha_min.powf(1.0 / 300.0))
    }

    pub fn validate(&self) -> LayoutResult<()> {
        self.radius.validate()?;
        self.year_range.validate()?;
        for margin in [&self.margins.all, &self.margins.by_city] {
            let area = self.plot_area(margin);
            // the smallest bubble must fit between the top and bottom margins
            let usable = area.right > area.left
                && area.band().fitting_radius() >= self.radius.min;
            let finite = [margin.top, margin.right, margin.bottom, margin.left]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0);
            if !(usable && finite) {
                return Err(LayoutError::InvalidCanvas {
                    width: f64::from(self.canvas.width),
                    height: f64::from(self.canvas.height),
                });
            }
        }
        Ok(())
    }
}

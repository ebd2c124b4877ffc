use clap::ValueEnum;
use strum_macros::Display;

use super::metadata::PhotoMetadata;

/// Default allowed difference between actual and goal aspect ratio
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Target box for a batch run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySpec {
    pub target_width: u32,
    pub target_height: u32,
    pub tolerance: f64,
}

impl GeometrySpec {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn goal_ratio(&self) -> f64 {
        self.target_width as f64 / self.target_height as f64
    }
}

/// What to do with images whose aspect ratio is outside the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AspectPolicy {
    /// Letterbox to the goal ratio, then scale (no cropping, no distortion)
    #[default]
    Pad,
    /// Do not write non-conforming images
    Reject,
    /// Scale straight to the target box, stretching the content
    Distort,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectVerdict {
    pub actual_ratio: f64,
    pub goal_ratio: f64,
    pub delta: f64,
    pub conforms: bool,
}

/// Compare the photo's width:height ratio with the target box
pub fn classify(metadata: &PhotoMetadata, spec: &GeometrySpec) -> AspectVerdict {
    let actual_ratio = metadata.width as f64 / metadata.height as f64;
    let goal_ratio = spec.goal_ratio();
    let delta = (actual_ratio - goal_ratio).abs();

    AspectVerdict {
        actual_ratio,
        goal_ratio,
        delta,
        conforms: delta <= spec.tolerance,
    }
}

pub mod line_fit;
pub mod scale2d;
pub mod spec_fit;

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use crate::domain::progress::{ProgressEvent, ProgressFn};
use crate::error::{ContinuumError, Result};
use crate::model::{BoundingBox, Position};

pub use line_fit::{LineFit, SpaxelLine};
pub use scale2d::{Scale2D, SliceScale};
pub use spec_fit::{RowSeed, SpaxelAlignment, SpecFit, SpecFitConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "scale2D")]
    Scale2D,
    #[serde(rename = "lineFit")]
    LineFit,
    #[serde(rename = "specFit")]
    SpecFit,
}

impl FromStr for Mode {
    type Err = ContinuumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scale2d" => Ok(Mode::Scale2D),
            "linefit" => Ok(Mode::LineFit),
            "specfit" => Ok(Mode::SpecFit),
            other => Err(ContinuumError::Configuration(format!(
                "unrecognized mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Scale2D => write!(f, "scale2D"),
            Mode::LineFit => write!(f, "lineFit"),
            Mode::SpecFit => write!(f, "specFit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitUnit {
    Slice { index: usize },
    Row { y: usize },
    Spaxel { x: usize, y: usize },
}

impl fmt::Display for FitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitUnit::Slice { index } => write!(f, "slice {}", index),
            FitUnit::Row { y } => write!(f, "row {}", y),
            FitUnit::Spaxel { x, y } => write!(f, "spaxel ({}, {})", x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub unit: FitUnit,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode")]
pub enum FittedParams {
    #[serde(rename = "scale2D")]
    Scale2D { slices: Vec<SliceScale> },
    #[serde(rename = "lineFit")]
    LineFit { spaxels: Vec<SpaxelLine> },
    #[serde(rename = "specFit")]
    SpecFit {
        rows: Vec<RowSeed>,
        spaxels: Vec<SpaxelAlignment>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutput {
    pub params: FittedParams,
    pub failures: Vec<UnitFailure>,
}

/// Inputs shared by every strategy, in the processing frame.
#[derive(Debug, Clone, Copy)]
pub struct FitContext<'a> {
    pub mask: &'a [bool],
    pub wavelengths: &'a [f64],
    pub bbox: BoundingBox,
    pub position: Position,
}

pub trait ContinuumStrategy: Sync {
    fn mode(&self) -> Mode;

    /// Subtract the fitted continuum from `cube` and add it to `model`.
    fn apply(
        &self,
        cube: &mut Array3<f32>,
        model: &mut Array3<f32>,
        ctx: &FitContext<'_>,
        on_event: ProgressFn<'_>,
    ) -> Result<StrategyOutput>;
}

pub(crate) fn record_failure(
    failures: &mut Vec<UnitFailure>,
    unit: FitUnit,
    err: &ContinuumError,
    on_event: ProgressFn<'_>,
) {
    let reason = err.to_string();
    on_event(&ProgressEvent::UnitFailed {
        unit,
        reason: reason.clone(),
    });
    failures.push(UnitFailure { unit, reason });
}

pub(crate) fn apply_spaxel_model(
    cube: &mut Array3<f32>,
    model: &mut Array3<f32>,
    y: usize,
    x: usize,
    spectrum: &[f64],
) {
    let mut data = cube.slice_mut(s![.., y, x]);
    for (d, &m) in data.iter_mut().zip(spectrum) {
        *d -= m as f32;
    }
    let mut acc = model.slice_mut(s![.., y, x]);
    for (a, &m) in acc.iter_mut().zip(spectrum) {
        *a += m as f32;
    }
}

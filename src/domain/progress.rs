use serde::Serialize;

use crate::domain::continuum::{FitUnit, Mode};
use crate::model::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    MaskBuilt { usable: usize, total: usize },
    CentroidRefined { from: Position, to: Position },
    CentroidRejected { position: Position, reason: String },
    ModeForced { requested: Mode, effective: Mode },
    StrategyStarted { mode: Mode, units: usize },
    RowStarted { row: usize },
    UnitFailed { unit: FitUnit, reason: String },
    Finished { mode: Mode, failures: usize },
}

pub type ProgressFn<'a> = &'a (dyn Fn(&ProgressEvent) + Sync);

pub fn log_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::MaskBuilt { usable, total } => {
            log::debug!("{}/{} wavelengths usable for continuum fits", usable, total)
        }
        ProgressEvent::CentroidRefined { from, to } => {
            log::info!("centroid ({}, {}) -> ({}, {})", from.x, from.y, to.x, to.y)
        }
        ProgressEvent::CentroidRejected { position, reason } => log::warn!(
            "centroid refinement rejected at ({}, {}): {}",
            position.x,
            position.y,
            reason
        ),
        ProgressEvent::ModeForced { requested, effective } => {
            log::warn!("mode {} forced to {}", requested, effective)
        }
        ProgressEvent::StrategyStarted { mode, units } => {
            log::info!("{} over {} fit units", mode, units)
        }
        ProgressEvent::RowStarted { row } => log::trace!("row {}", row),
        ProgressEvent::UnitFailed { unit, reason } => log::warn!("{} failed: {}", unit, reason),
        ProgressEvent::Finished { mode, failures } => {
            log::info!("{} finished with {} failed units", mode, failures)
        }
    }
}

use ndarray::Array3;
use serde::Serialize;

use crate::domain::centroid::{refine_centroid, CentroidStatus};
use crate::domain::config_manager::SubtractionConfig;
use crate::domain::continuum::{
    ContinuumStrategy, FitContext, FittedParams, LineFit, Mode, Scale2D, SpecFit, UnitFailure,
};
use crate::domain::cube::build_wavelength_axis;
use crate::domain::orientation::{FrameNormalizer, Instrument};
use crate::domain::progress::{log_event, ProgressEvent, ProgressFn};
use crate::domain::wavelength_mask::{build_mask, MaskParams};
use crate::domain::wcs::PixelScale;
use crate::error::{ContinuumError, Result};
use crate::model::{BoundingBox, CubeHeader, Position};
use crate::utils::simplex::SimplexConfig;

/// Outcome of one call. Positions and boxes are in the caller's frame;
/// per-unit parameters and failures are indexed in the processing frame,
/// which differs from the caller's only for rotated instruments.
#[derive(Debug, Clone, Serialize)]
pub struct SubtractionReport {
    pub requested_mode: Mode,
    pub effective_mode: Mode,
    pub instrument: Instrument,
    pub input_position: Position,
    pub position: Position,
    pub bbox: BoundingBox,
    pub centroid: CentroidStatus,
    pub fitted_center: Option<(f64, f64)>,
    pub usable_wavelengths: usize,
    pub params: FittedParams,
    pub failures: Vec<UnitFailure>,
}

#[derive(Debug, Clone)]
pub struct SubtractionResult {
    pub residual: Array3<f32>,
    pub model: Array3<f32>,
    pub report: SubtractionReport,
}

fn strategy_for(mode: Mode, config: &SubtractionConfig) -> Box<dyn ContinuumStrategy> {
    match mode {
        Mode::Scale2D => Box::new(Scale2D),
        Mode::LineFit => Box::new(LineFit::default()),
        Mode::SpecFit => Box::new(SpecFit::new(config.spec_fit.clone())),
    }
}

fn rejection_reason(status: &CentroidStatus, limit_arcsec: f64) -> String {
    match status {
        CentroidStatus::Accepted => String::new(),
        CentroidStatus::ShiftTooLarge { dx_arcsec, dy_arcsec } => format!(
            "shift ({:.2}\", {:.2}\") exceeds the {:.2}\" limit",
            dx_arcsec, dy_arcsec, limit_arcsec
        ),
        CentroidStatus::FitFailed { reason } => reason.clone(),
    }
}

pub fn subtract_continuum(
    cube: Array3<f32>,
    header: &CubeHeader,
    position: Position,
    config: &SubtractionConfig,
) -> Result<SubtractionResult> {
    subtract_continuum_with_progress(cube, header, position, config, &log_event)
}

/// Same as [`subtract_continuum`], delivering progress to `on_event`.
pub fn subtract_continuum_with_progress(
    cube: Array3<f32>,
    header: &CubeHeader,
    position: Position,
    config: &SubtractionConfig,
    on_event: ProgressFn<'_>,
) -> Result<SubtractionResult> {
    let (depth, height, width) = cube.dim();
    if depth == 0 || height == 0 || width == 0 {
        return Err(ContinuumError::Geometry(format!(
            "cube has an empty axis ({}, {}, {})",
            depth, height, width
        )));
    }
    if position.x >= width || position.y >= height {
        return Err(ContinuumError::Geometry(format!(
            "position ({}, {}) outside spatial extent {}x{}",
            position.x, position.y, width, height
        )));
    }
    if !(config.error_limit_arcsec.is_finite() && config.error_limit_arcsec >= 0.0) {
        return Err(ContinuumError::Configuration(format!(
            "error limit must be non-negative, got {}",
            config.error_limit_arcsec
        )));
    }

    let wavelengths = build_wavelength_axis(header, depth)?;
    let mask = build_mask(
        &wavelengths,
        &config.lines,
        &MaskParams {
            valid_range: header.valid_wavelength_range()?,
            redshift: config.redshift,
            velocity_window_kms: config.velocity_window_kms,
        },
    )?;
    let usable = mask.iter().filter(|&&m| m).count();
    on_event(&ProgressEvent::MaskBuilt {
        usable,
        total: depth,
    });
    if usable == 0 {
        return Err(ContinuumError::Data(
            "no usable wavelengths left for continuum fits".into(),
        ));
    }

    let normalizer = FrameNormalizer::new(config.instrument, &cube);
    let mut cube = normalizer.forward_cube(cube);
    let scale = normalizer.forward_scale(PixelScale::from_header(header)?);
    let radius = scale.pixel_radius(config.radius_arcsec)?;
    let start = normalizer.forward_position(position);

    let centroid = refine_centroid(
        &cube,
        &mask,
        start,
        radius,
        &scale,
        config.error_limit_arcsec,
        &SimplexConfig::default(),
    )?;

    let effective_mode = if centroid.accepted() {
        on_event(&ProgressEvent::CentroidRefined {
            from: position,
            to: normalizer.inverse_position(centroid.position),
        });
        config.mode
    } else {
        on_event(&ProgressEvent::CentroidRejected {
            position,
            reason: rejection_reason(&centroid.status, config.error_limit_arcsec),
        });
        if config.mode != Mode::Scale2D {
            on_event(&ProgressEvent::ModeForced {
                requested: config.mode,
                effective: Mode::Scale2D,
            });
        }
        Mode::Scale2D
    };

    let strategy = strategy_for(effective_mode, config);
    let mut model = Array3::<f32>::zeros(cube.dim());
    let ctx = FitContext {
        mask: &mask,
        wavelengths: &wavelengths,
        bbox: centroid.bbox,
        position: centroid.position,
    };
    let output = strategy.apply(&mut cube, &mut model, &ctx, on_event)?;

    on_event(&ProgressEvent::Finished {
        mode: strategy.mode(),
        failures: output.failures.len(),
    });

    let report = SubtractionReport {
        requested_mode: config.mode,
        effective_mode,
        instrument: config.instrument,
        input_position: position,
        position: normalizer.inverse_position(centroid.position),
        bbox: normalizer.inverse_box(centroid.bbox),
        centroid: centroid.status,
        fitted_center: centroid.fitted_center.map(|c| normalizer.inverse_point(c)),
        usable_wavelengths: usable,
        params: output.params,
        failures: output.failures,
    };

    Ok(SubtractionResult {
        residual: normalizer.inverse_cube(cube),
        model: normalizer.inverse_cube(model),
        report,
    })
}

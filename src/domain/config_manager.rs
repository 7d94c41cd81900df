use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::continuum::{Mode, SpecFitConfig};
use crate::domain::orientation::Instrument;
use crate::domain::polyfit::PolynomialFit;
use crate::domain::wavelength_mask::LineCatalog;

const ENV_PREFIX: &str = "CONTSUB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtractionConfig {
    pub redshift: Option<f64>,
    pub velocity_window_kms: f64,
    pub radius_arcsec: f64,
    pub mode: Mode,
    pub error_limit_arcsec: f64,
    pub instrument: Instrument,
    pub lines: LineCatalog,
    pub spec_fit: SpecFitConfig,
    pub polynomial: PolynomialFit,
}

impl Default for SubtractionConfig {
    fn default() -> Self {
        Self {
            redshift: None,
            velocity_window_kms: 1000.0,
            radius_arcsec: 5.0,
            mode: Mode::default(),
            error_limit_arcsec: 3.0,
            instrument: Instrument::default(),
            lines: LineCatalog::default(),
            spec_fit: SpecFitConfig::default(),
            polynomial: PolynomialFit::default(),
        }
    }
}

fn build_config(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<SubtractionConfig> {
    let mut builder = config::Config::builder();
    if let Some(p) = path {
        builder = builder.add_source(config::File::from(p.to_path_buf()).required(true));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("lines.emission_lines")
            .with_list_parse_key("lines.sky_lines")
            .source(env),
    );

    let settings = builder
        .build()
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    settings
        .try_deserialize()
        .context("Failed to parse subtraction config")
}

/// Defaults, overlaid by `path` (JSON, TOML or YAML by extension), overlaid
/// by `CONTSUB_*` environment variables. Nested keys use `__`, e.g.
/// `CONTSUB_SPEC_FIT__TRIM=12`.
pub fn load_config(path: Option<&Path>) -> Result<SubtractionConfig> {
    let cfg = build_config(path, None)?;
    log::debug!("loaded subtraction config: {:?}", cfg);
    Ok(cfg)
}

pub fn save_config(path: &Path, config: &SubtractionConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;
    Ok(())
}

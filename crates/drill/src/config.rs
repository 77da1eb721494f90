//! Drill process configuration.

use std::collections::HashMap;

use drill_common::{Crs, Variable};
use serde::{Deserialize, Serialize};

use crate::error::{DrillError, DrillResult};

/// Configuration for the drill process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    /// Model definitions keyed by request model name (matched case-insensitively).
    pub models: HashMap<String, ModelDefinition>,

    /// Forecast hours processed concurrently; 0 means one per CPU core.
    pub max_parallel_hours: usize,

    /// Distance under which a polygon ring's last vertex is snapped to its first.
    pub ring_closure_tolerance: f64,

    /// CRS assumed for geometries that do not name one.
    pub default_crs: String,
}

impl Default for DrillConfig {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "hrdps".to_string(),
            ModelDefinition::new("HRDPS.CONTINENTAL"),
        );

        Self {
            models,
            max_parallel_hours: 0,
            ring_closure_tolerance: 1e-9,
            default_crs: "EPSG:4326".to_string(),
        }
    }
}

impl DrillConfig {
    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> DrillResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| DrillError::Config(e.to_string()))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("DRILL_MAX_PARALLEL_HOURS") {
            if let Ok(n) = val.parse() {
                self.max_parallel_hours = n;
            }
        }

        if let Ok(val) = std::env::var("DRILL_RING_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                self.ring_closure_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("DRILL_DEFAULT_CRS") {
            if !val.trim().is_empty() {
                self.default_crs = val;
            }
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.ring_closure_tolerance.is_finite() || self.ring_closure_tolerance < 0.0 {
            return Err("ring_closure_tolerance must be a finite value >= 0".to_string());
        }

        Crs::parse(&self.default_crs)
            .map_err(|e| format!("default_crs '{}': {}", self.default_crs, e))?;

        for (name, model) in &self.models {
            if model.catalog_model.trim().is_empty() {
                return Err(format!("model '{}' has an empty catalog_model", name));
            }
            for variable in Variable::ALL {
                if model.parameters.code(variable).trim().is_empty() {
                    return Err(format!(
                        "model '{}' has an empty parameter code for {}",
                        name, variable
                    ));
                }
            }
        }

        Ok(())
    }

    /// Parsed default CRS.
    pub fn default_crs(&self) -> DrillResult<Crs> {
        Crs::parse(&self.default_crs).map_err(|e| DrillError::Config(e.to_string()))
    }

    /// Resolve a request model name; unknown models pass through with default codes.
    pub fn resolve_model(&self, name: &str) -> ModelDefinition {
        let wanted = name.trim();
        self.models
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, def)| def.clone())
            .unwrap_or_else(|| ModelDefinition::new(wanted))
    }

    /// Number of worker threads for per-hour extraction.
    pub fn worker_count(&self) -> usize {
        if self.max_parallel_hours > 0 {
            return self.max_parallel_hours;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// How a request model maps onto the raster index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model name stored in the index, e.g. `HRDPS.CONTINENTAL`.
    pub catalog_model: String,

    #[serde(default)]
    pub parameters: ParameterCodes,
}

impl ModelDefinition {
    pub fn new(catalog_model: impl Into<String>) -> Self {
        Self {
            catalog_model: catalog_model.into(),
            parameters: ParameterCodes::default(),
        }
    }
}

/// Index parameter code per variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterCodes {
    pub temperature: String,
    pub wind_speed: String,
    pub wind_direction: String,
}

impl Default for ParameterCodes {
    fn default() -> Self {
        Self {
            temperature: Variable::Temperature.default_code().to_string(),
            wind_speed: Variable::WindSpeed.default_code().to_string(),
            wind_direction: Variable::WindDirection.default_code().to_string(),
        }
    }
}

impl ParameterCodes {
    pub fn code(&self, variable: Variable) -> &str {
        match variable {
            Variable::Temperature => &self.temperature,
            Variable::WindSpeed => &self.wind_speed,
            Variable::WindDirection => &self.wind_direction,
        }
    }

    /// Variable a parameter code belongs to (case-insensitive).
    pub fn variable_for(&self, code: &str) -> Option<Variable> {
        Variable::ALL
            .into_iter()
            .find(|v| self.code(*v).eq_ignore_ascii_case(code))
    }

    pub fn all_codes(&self) -> Vec<String> {
        Variable::ALL
            .iter()
            .map(|v| self.code(*v).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DrillConfig::default();
        assert_eq!(config.max_parallel_hours, 0);
        assert_eq!(config.ring_closure_tolerance, 1e-9);
        assert_eq!(config.default_crs, "EPSG:4326");
        assert!(config.validate().is_ok());
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_resolve_model() {
        let config = DrillConfig::default();
        let hrdps = config.resolve_model("HRDPS");
        assert_eq!(hrdps.catalog_model, "HRDPS.CONTINENTAL");
        assert_eq!(hrdps.parameters.code(Variable::WindSpeed), "WSPD");

        let other = config.resolve_model("RDPS.ETA");
        assert_eq!(other.catalog_model, "RDPS.ETA");
        assert_eq!(other.parameters, ParameterCodes::default());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
max_parallel_hours: 4
models:
  gdps:
    catalog_model: GDPS.ETA
    parameters:
      temperature: TMP
      wind_speed: WIND
      wind_direction: WDIR
"#;
        let config = DrillConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_parallel_hours, 4);
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.default_crs, "EPSG:4326");

        let gdps = config.resolve_model("gdps");
        assert_eq!(gdps.parameters.variable_for("wdir"), Some(Variable::WindDirection));
        assert_eq!(gdps.parameters.variable_for("TT"), None);
        assert_eq!(gdps.parameters.all_codes(), vec!["TMP", "WIND", "WDIR"]);
    }

    #[test]
    fn test_validation() {
        let mut config = DrillConfig::default();
        config.ring_closure_tolerance = -1.0;
        assert!(config.validate().is_err());

        let mut config = DrillConfig::default();
        config.default_crs = "EPSG:1".to_string();
        assert!(config.validate().is_err());

        let mut config = DrillConfig::default();
        config.models.insert("bad".to_string(), ModelDefinition::new(" "));
        assert!(config.validate().is_err());

        assert!(DrillConfig::from_yaml_str("max_parallel_hours: [").is_err());
    }
}

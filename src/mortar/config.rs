use super::MortarError;
use json::JsonValue;
#[cfg(feature = "json_export")]
use json::object;
use std::fs::read_to_string;

/// Tunable parameters of [AutomaticMortarGeneration](super::AutomaticMortarGeneration) and the segment loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortarConfig {
    /// Residual and step threshold of the projection Newton solves
    pub newton_tolerance: f64,
    /// Band around the reference domain within which a projection is accepted
    pub xi_tolerance: f64,
    pub max_newton_iterations: usize,
    /// Only drop the lagrange multiplier dofs which are truly uncovered by the primary surface
    pub correct_edge_dropping: bool,
    /// Flip nodal and segment normals (for periodic constraints between like-facing surfaces)
    pub periodic: bool,
    /// Generate the mortar mesh on the displaced configuration
    pub on_displaced: bool,
    pub debug: bool,
    pub quadrature_order: usize,
    /// Number of nearest nodes whose elements are tried as projection targets
    pub nearest_node_candidates: usize,
}

impl Default for MortarConfig {
    fn default() -> Self {
        Self {
            newton_tolerance: 1e-12,
            xi_tolerance: 1e-6,
            max_newton_iterations: 25,
            correct_edge_dropping: false,
            periodic: false,
            on_displaced: false,
            debug: false,
            quadrature_order: 2,
            nearest_node_candidates: 3,
        }
    }
}

impl MortarConfig {
    /// Read a config from a JSON object. Missing entries take their default values.
    ///
    /// ```
    /// use fem_mortar::mortar::MortarConfig;
    ///
    /// let config_json = json::parse(r#"{ "xi_tolerance": 1e-4, "periodic": true }"#).unwrap();
    /// let config = MortarConfig::from_json(&config_json).unwrap();
    ///
    /// assert!(config.periodic);
    /// assert_eq!(config.xi_tolerance, 1e-4);
    /// assert_eq!(config.max_newton_iterations, 25);
    /// ```
    pub fn from_json(config_json: &JsonValue) -> Result<Self, MortarError> {
        if !config_json.is_object() {
            return Err(MortarError::InvalidParameter {
                name: "config",
                reason: "the mortar configuration must be a JSON object".to_string(),
            });
        }

        let mut config = Self::default();
        read_f64(config_json, "newton_tolerance", &mut config.newton_tolerance)?;
        read_f64(config_json, "xi_tolerance", &mut config.xi_tolerance)?;
        read_usize(config_json, "max_newton_iterations", &mut config.max_newton_iterations)?;
        read_bool(config_json, "correct_edge_dropping", &mut config.correct_edge_dropping)?;
        read_bool(config_json, "periodic", &mut config.periodic)?;
        read_bool(config_json, "on_displaced", &mut config.on_displaced)?;
        read_bool(config_json, "debug", &mut config.debug)?;
        read_usize(config_json, "quadrature_order", &mut config.quadrature_order)?;
        read_usize(config_json, "nearest_node_candidates", &mut config.nearest_node_candidates)?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<str>) -> Result<Self, MortarError> {
        let contents = read_to_string(path.as_ref())?;
        let config_json = json::parse(&contents).map_err(|err| MortarError::InvalidParameter {
            name: "config",
            reason: format!("unable to parse config file as JSON: {}", err),
        })?;
        Self::from_json(&config_json)
    }

    /// Reject values which would make the projections meaningless
    pub fn validate(&self) -> Result<(), MortarError> {
        if !(self.newton_tolerance > 0.0) {
            return Err(MortarError::InvalidParameter {
                name: "newton_tolerance",
                reason: format!("must be positive; got {}", self.newton_tolerance),
            });
        }
        if !(self.xi_tolerance > 0.0) {
            return Err(MortarError::InvalidParameter {
                name: "xi_tolerance",
                reason: format!("must be positive; got {}", self.xi_tolerance),
            });
        }
        if self.max_newton_iterations == 0 {
            return Err(MortarError::InvalidParameter {
                name: "max_newton_iterations",
                reason: "at least one iteration is required".to_string(),
            });
        }
        if self.nearest_node_candidates == 0 {
            return Err(MortarError::InvalidParameter {
                name: "nearest_node_candidates",
                reason: "at least one candidate node is required".to_string(),
            });
        }
        Ok(())
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "newton_tolerance": self.newton_tolerance,
            "xi_tolerance": self.xi_tolerance,
            "max_newton_iterations": self.max_newton_iterations,
            "correct_edge_dropping": self.correct_edge_dropping,
            "periodic": self.periodic,
            "on_displaced": self.on_displaced,
            "debug": self.debug,
            "quadrature_order": self.quadrature_order,
            "nearest_node_candidates": self.nearest_node_candidates,
        }
    }
}

fn read_f64(config_json: &JsonValue, name: &'static str, value: &mut f64) -> Result<(), MortarError> {
    if config_json[name].is_null() {
        return Ok(());
    }
    *value = config_json[name].as_f64().ok_or(MortarError::InvalidParameter {
        name,
        reason: "expected a number".to_string(),
    })?;
    Ok(())
}

fn read_usize(config_json: &JsonValue, name: &'static str, value: &mut usize) -> Result<(), MortarError> {
    if config_json[name].is_null() {
        return Ok(());
    }
    *value = config_json[name].as_usize().ok_or(MortarError::InvalidParameter {
        name,
        reason: "expected a non-negative integer".to_string(),
    })?;
    Ok(())
}

fn read_bool(config_json: &JsonValue, name: &'static str, value: &mut bool) -> Result<(), MortarError> {
    if config_json[name].is_null() {
        return Ok(());
    }
    *value = config_json[name].as_bool().ok_or(MortarError::InvalidParameter {
        name,
        reason: "expected a boolean".to_string(),
    })?;
    Ok(())
}

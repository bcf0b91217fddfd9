//! Output terminals of a node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{NetError, NetResult};
use crate::net::sheaf::{default_sheaves, Sheaf, SheafMap, DEFAULT_SHEAF};
use crate::net::{FxIndexMap, FxIndexSet};

/// The tunable parameters of a gate.
///
/// All gates recognize the same parameter set; nodetypes may ship their own
/// defaults per gate, and individual gates may be customized on top of that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateParameters {
    /// Lower clamp of the gate output.
    pub minimum: f64,
    /// Upper clamp of the gate output.
    pub maximum: f64,
    /// Input offset subtracted before amplification.
    pub threshold: f64,
    /// Input gain.
    pub amplification: f64,
    /// Certainty attached to the gate output.
    pub certainty: f64,
    /// Activation decay per step.
    pub decay: f64,
    /// Reserved modulator.
    pub rho: f64,
    /// Reserved modulator, read by the sigmoid gate function.
    pub theta: f64,
    /// Whether this gate carries its sheaves to downstream slots.
    pub spreadsheaves: bool,
}

impl Default for GateParameters {
    fn default() -> Self {
        Self {
            minimum: -1.0,
            maximum: 1.0,
            threshold: 0.0,
            amplification: 1.0,
            certainty: 1.0,
            decay: 0.0,
            rho: 0.0,
            theta: 0.0,
            spreadsheaves: false,
        }
    }
}

impl GateParameters {
    /// Reads one parameter by name.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for an unknown parameter name.
    pub fn get(&self, key: &str) -> NetResult<Value> {
        Ok(match key {
            "minimum" => self.minimum.into(),
            "maximum" => self.maximum.into(),
            "threshold" => self.threshold.into(),
            "amplification" => self.amplification.into(),
            "certainty" => self.certainty.into(),
            "decay" => self.decay.into(),
            "rho" => self.rho.into(),
            "theta" => self.theta.into(),
            "spreadsheaves" => self.spreadsheaves.into(),
            _ => {
                return Err(NetError::InvalidArgument(format!(
                    "unknown gate parameter '{key}'"
                )))
            }
        })
    }

    /// Sets one parameter by name.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for an unknown parameter name
    /// or a value of the wrong type.
    pub fn set(&mut self, key: &str, value: &Value) -> NetResult<()> {
        if key == "spreadsheaves" {
            self.spreadsheaves = match value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
                _ => {
                    return Err(NetError::InvalidArgument(
                        "spreadsheaves must be a boolean".to_string(),
                    ))
                }
            };
            return Ok(());
        }

        let Some(num) = value.as_f64() else {
            return Err(NetError::InvalidArgument(format!(
                "gate parameter '{key}' must be a number"
            )));
        };
        match key {
            "minimum" => self.minimum = num,
            "maximum" => self.maximum = num,
            "threshold" => self.threshold = num,
            "amplification" => self.amplification = num,
            "certainty" => self.certainty = num,
            "decay" => self.decay = num,
            "rho" => self.rho = num,
            "theta" => self.theta = num,
            _ => {
                return Err(NetError::InvalidArgument(format!(
                    "unknown gate parameter '{key}'"
                )))
            }
        }
        Ok(())
    }

    /// Applies a map of named overrides on top of `self`.
    ///
    /// Unknown keys are skipped with a warning so that snapshots written by
    /// newer builds stay loadable.
    pub fn apply(&mut self, overrides: &FxIndexMap<String, Value>) {
        for (key, value) in overrides {
            if let Err(err) = self.set(key, value) {
                warn!("ignoring gate parameter override: {err}");
            }
        }
    }

    /// Returns the parameters of `self` that differ from `base`, by name.
    ///
    /// This is what gets persisted: storing only the deltas lets nodetype
    /// defaults reach untouched gates after a nodetype reload.
    #[must_use]
    pub fn delta_from(&self, base: &Self) -> FxIndexMap<String, Value> {
        const KEYS: [&str; 9] = [
            "minimum",
            "maximum",
            "threshold",
            "amplification",
            "certainty",
            "decay",
            "rho",
            "theta",
            "spreadsheaves",
        ];
        let mut delta = FxIndexMap::default();
        for key in KEYS {
            let mine = self.get(key).expect("known key");
            if mine != base.get(key).expect("known key") {
                delta.insert(key.to_string(), mine);
            }
        }
        delta
    }
}

/// A named entry of the gate function catalog.
///
/// Nodespaces can install one of these per (nodetype, gate name) pair to
/// replace the default transfer function for all matching gates they
/// contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateFunction {
    /// `clamp(amplification * (input - threshold), minimum, maximum)`
    #[default]
    Threshold,
    /// Passes the input through unchanged.
    Identity,
    /// Absolute value of the input.
    Absolute,
    /// Logistic output in `(0, 1)`, centered on `theta`.
    Sigmoid,
    /// Constant zero; silences a gate without unlinking it.
    Zero,
}

impl GateFunction {
    /// Resolves a persisted gate function name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "default" | "threshold" => Self::Threshold,
            "identity" => Self::Identity,
            "absolute" => Self::Absolute,
            "sigmoid" => Self::Sigmoid,
            "zero" => Self::Zero,
            _ => return None,
        })
    }

    /// The canonical name this function is persisted under.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Threshold => "default",
            Self::Identity => "identity",
            Self::Absolute => "absolute",
            Self::Sigmoid => "sigmoid",
            Self::Zero => "zero",
        }
    }

    /// Computes the gate output for one sheaf.
    ///
    /// Non-finite results are clamped into `[minimum, maximum]`; a NaN
    /// collapses to 0 before clamping.
    #[must_use]
    pub fn apply(&self, input: f64, params: &GateParameters) -> f64 {
        let raw = match self {
            Self::Threshold => params.amplification * (input - params.threshold),
            Self::Identity => input,
            Self::Absolute => input.abs(),
            Self::Sigmoid => 1.0 / (1.0 + (-(input - params.theta)).exp()),
            Self::Zero => 0.0,
        };
        let raw = if raw.is_nan() { 0.0 } else { raw };
        raw.clamp(params.minimum, params.maximum)
    }
}

/// A gate, the output terminal of a node for one link type.
#[derive(Debug, Clone)]
pub struct Gate {
    name: String,
    /// Uids of the links leaving this gate.
    pub(crate) outgoing: FxIndexSet<String>,
    /// The live parameters, nodetype defaults merged with user overrides.
    pub(crate) parameters: GateParameters,
    /// The nodetype baseline, kept to compute persisted deltas.
    pub(crate) baseline: GateParameters,
    pub(crate) sheaves: SheafMap,
}

impl Gate {
    /// Creates a gate with the given nodetype baseline parameters and only
    /// the `default` sheaf.
    #[must_use]
    pub fn new(name: impl Into<String>, baseline: GateParameters) -> Self {
        Self {
            name: name.into(),
            outgoing: FxIndexSet::default(),
            parameters: baseline,
            baseline,
            sheaves: default_sheaves(),
        }
    }

    /// The gate name, unique per node.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live gate parameters.
    #[must_use]
    pub fn parameters(&self) -> &GateParameters {
        &self.parameters
    }

    /// Mutable access to the live gate parameters.
    pub fn parameters_mut(&mut self) -> &mut GateParameters {
        &mut self.parameters
    }

    /// The persisted (non-default) parameter overrides of this gate.
    #[must_use]
    pub fn parameter_overrides(&self) -> FxIndexMap<String, Value> {
        self.parameters.delta_from(&self.baseline)
    }

    /// Uids of the links leaving this gate, in insertion order.
    pub fn outgoing(&self) -> impl Iterator<Item = &str> {
        self.outgoing.iter().map(String::as_str)
    }

    /// All sheaves on this gate.
    #[must_use]
    pub fn sheaves(&self) -> &SheafMap {
        &self.sheaves
    }

    /// The activation of one sheaf, 0 if the lane does not exist.
    #[must_use]
    pub fn activation(&self, sheaf: &str) -> f64 {
        self.sheaves.get(sheaf).map_or(0.0, |s| s.activation)
    }

    /// Writes the activation of one sheaf, creating the lane if needed.
    pub fn set_activation(&mut self, sheaf: &str, activation: f64) {
        self.ensure_sheaf(sheaf).activation = activation;
    }

    /// Returns the lane with the given id, creating it at activation 0.
    pub fn ensure_sheaf(&mut self, sheaf: &str) -> &mut Sheaf {
        self.sheaves
            .entry(sheaf.to_string())
            .or_insert_with(|| Sheaf::new(sheaf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gate_function_clamps() {
        let params = GateParameters::default();
        let f = GateFunction::Threshold;
        assert_eq!(f.apply(0.5, &params), 0.5);
        assert_eq!(f.apply(3.0, &params), 1.0);
        assert_eq!(f.apply(-3.0, &params), -1.0);
        assert_eq!(f.apply(f64::NAN, &params), 0.0);
        assert_eq!(f.apply(f64::INFINITY, &params), 1.0);
    }

    #[test]
    fn parameter_deltas_track_only_changes() {
        let base = GateParameters::default();
        let mut params = base;
        params.set("maximum", &Value::from(0.5)).unwrap();
        let delta = params.delta_from(&base);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta["maximum"], Value::from(0.5));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut params = GateParameters::default();
        assert!(matches!(
            params.set("frobnication", &Value::from(1.0)),
            Err(NetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn default_sheaf_always_present() {
        let gate = Gate::new("gen", GateParameters::default());
        assert!(gate.sheaves().contains_key(DEFAULT_SHEAF));
        assert_eq!(gate.activation(DEFAULT_SHEAF), 0.0);
    }
}

//! One-shot scripts that mutate a net through the netapi.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::NetResult;
use crate::net::netapi::NetApi;
use crate::net::FxIndexMap;

/// The behavior of a recipe: runs once against the netapi and returns an
/// arbitrary JSON result.
pub type RecipeFn =
    Arc<dyn Fn(&mut NetApi<'_, '_>, &FxIndexMap<String, Value>) -> NetResult<Value> + Send + Sync>;

/// One declared recipe parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeParameter {
    pub name: String,
    pub default: Option<Value>,
}

/// A registered recipe: a named script users invoke on demand, as opposed
/// to node functions which run every step.
#[derive(Clone)]
pub struct Recipe {
    name: String,
    parameters: Vec<RecipeParameter>,
    func: RecipeFn,
}

impl Recipe {
    #[must_use]
    pub fn new(name: impl Into<String>, func: RecipeFn) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            func,
        }
    }

    /// Declares a parameter with an optional default.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        self.parameters.push(RecipeParameter {
            name: name.into(),
            default,
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parameters(&self) -> &[RecipeParameter] {
        &self.parameters
    }

    /// Runs the recipe with the given arguments merged over the declared
    /// defaults.
    pub fn run(
        &self,
        api: &mut NetApi<'_, '_>,
        arguments: FxIndexMap<String, Value>,
    ) -> NetResult<Value> {
        let mut merged = FxIndexMap::default();
        for parameter in &self.parameters {
            if let Some(default) = &parameter.default {
                merged.insert(parameter.name.clone(), default.clone());
            }
        }
        for (key, value) in arguments {
            merged.insert(key, value);
        }
        (self.func)(api, &merged)
    }
}

impl Debug for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

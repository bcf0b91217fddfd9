//! Input terminals of a node.

use crate::net::sheaf::{default_sheaves, Sheaf, SheafMap};
use crate::net::FxIndexSet;

/// A slot, the input terminal of a node for one link type.
///
/// Slot activations are recomputed from scratch every step: the link
/// function zeroes all lanes, then sums the weighted contributions of all
/// incoming links into them.
#[derive(Debug, Clone)]
pub struct Slot {
    name: String,
    /// Uids of the links ending at this slot.
    pub(crate) incoming: FxIndexSet<String>,
    pub(crate) sheaves: SheafMap,
}

impl Slot {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            incoming: FxIndexSet::default(),
            sheaves: default_sheaves(),
        }
    }

    /// The slot name, unique per node.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uids of the links ending at this slot, in insertion order.
    pub fn incoming(&self) -> impl Iterator<Item = &str> {
        self.incoming.iter().map(String::as_str)
    }

    /// All sheaves on this slot.
    #[must_use]
    pub fn sheaves(&self) -> &SheafMap {
        &self.sheaves
    }

    /// The summed activation of one lane, 0 if the lane does not exist.
    #[must_use]
    pub fn activation(&self, sheaf: &str) -> f64 {
        self.sheaves.get(sheaf).map_or(0.0, |s| s.activation)
    }

    /// Returns the lane with the given id, creating it at activation 0.
    pub fn ensure_sheaf(&mut self, sheaf: &str) -> &mut Sheaf {
        self.sheaves
            .entry(sheaf.to_string())
            .or_insert_with(|| Sheaf::new(sheaf))
    }

    /// Zeroes all lanes, retaining the lane keys.
    pub fn reset(&mut self) {
        for sheaf in self.sheaves.values_mut() {
            sheaf.activation = 0.0;
        }
    }

    /// Adds a contribution to one lane; the lane must exist.
    pub(crate) fn add_activation(&mut self, sheaf: &str, amount: f64) {
        if let Some(lane) = self.sheaves.get_mut(sheaf) {
            lane.activation += amount;
        }
    }
}

//! SECIR model stratified by immunity layer (naive, partial, improved).
//!
//! Every age group carries three copies of the SECIR compartments, one per
//! immunity layer. Vaccination reduces the risks of infection, of symptoms
//! and of a severe course multiplicatively, and shortens the mild infection
//! stages. Daily vaccinations move susceptibles between layers at day
//! boundaries.

mod model;
mod parameter_space;
mod parameters;

pub use model::Model;
pub use parameter_space::draw_sample_graph;
pub use parameters::{Parameters, VvsParameterKey};

use serde::{Deserialize, Serialize};

/// Immunity layer of a sub-population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmunityLayer {
    Naive,
    PartialImmunity,
    ImprovedImmunity,
}

impl ImmunityLayer {
    pub const COUNT: usize = 3;

    pub const ALL: [ImmunityLayer; ImmunityLayer::COUNT] = [
        ImmunityLayer::Naive,
        ImmunityLayer::PartialImmunity,
        ImmunityLayer::ImprovedImmunity,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_order_is_stable() {
        assert_eq!(ImmunityLayer::Naive.index(), 0);
        assert_eq!(ImmunityLayer::PartialImmunity.index(), 1);
        assert_eq!(ImmunityLayer::ImprovedImmunity.index(), 2);
    }
}

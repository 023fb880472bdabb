//! Age-resolved SECIR compartment model (SECIHURD: Susceptible, Exposed,
//! InfectedNoSymptoms, InfectedSymptoms, InfectedSevere, InfectedCritical,
//! Recovered, Dead).

mod model;
mod parameter_space;
mod parameters;

pub use model::Model;
pub use parameter_space::draw_sample_graph;
pub use parameters::{ParameterKey, ParameterValue, Parameters};

use serde::{Deserialize, Serialize};

/// The compartments of the SECIR model. Dead is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfectionState {
    Susceptible,
    Exposed,
    InfectedNoSymptoms,
    InfectedSymptoms,
    InfectedSevere,
    InfectedCritical,
    Recovered,
    Dead,
}

impl InfectionState {
    /// Number of compartments.
    pub const COUNT: usize = 8;

    /// All states in flat enumeration order.
    pub const ALL: [InfectionState; InfectionState::COUNT] = [
        InfectionState::Susceptible,
        InfectionState::Exposed,
        InfectionState::InfectedNoSymptoms,
        InfectionState::InfectedSymptoms,
        InfectionState::InfectedSevere,
        InfectionState::InfectedCritical,
        InfectionState::Recovered,
        InfectionState::Dead,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Compartments that travel along mobility edges. The severely ill, the
    /// critically ill and the dead stay.
    #[must_use]
    pub fn migrates(self) -> bool {
        !matches!(
            self,
            InfectionState::InfectedSevere | InfectionState::InfectedCritical | InfectionState::Dead
        )
    }
}

//! Continuous simulation time for the meta-population models, measured in
//! days since the start of the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A point in simulation time, in days. Sub-day resolution is kept as a
/// fraction; calendar anchoring happens through the model's start day.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct SimulationTime(pub f64);

impl SimulationTime {
    #[must_use]
    pub fn days(self) -> f64 {
        self.0
    }
}

impl Add for SimulationTime {
    type Output = SimulationTime;
    fn add(self, rhs: SimulationTime) -> SimulationTime {
        SimulationTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimulationTime {
    fn add_assign(&mut self, rhs: SimulationTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimulationTime {
    type Output = SimulationTime;
    fn sub(self, rhs: SimulationTime) -> SimulationTime {
        SimulationTime(self.0 - rhs.0)
    }
}

impl SubAssign for SimulationTime {
    fn sub_assign(&mut self, rhs: SimulationTime) {
        self.0 -= rhs.0;
    }
}

impl Neg for SimulationTime {
    type Output = SimulationTime;
    fn neg(self) -> SimulationTime {
        SimulationTime(-self.0)
    }
}

impl fmt::Display for SimulationTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_closed() {
        let t = SimulationTime(1.5) + SimulationTime(2.0);
        assert_eq!(t, SimulationTime(3.5));
        assert_eq!(t - SimulationTime(0.5), SimulationTime(3.0));
        assert_eq!(-SimulationTime(1.0), SimulationTime(-1.0));
    }

    #[test]
    fn ordering() {
        assert!(SimulationTime(0.5) < SimulationTime(1.0));
    }
}

//! Age stratification shared by all models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of age groups used throughout: 0-4, 5-14, 15-34, 35-59, 60-79, 80+.
pub const NUM_AGE_GROUPS: usize = 6;

/// Labels of the age groups, in order.
pub const AGE_GROUP_LABELS: [&str; NUM_AGE_GROUPS] =
    ["0-4", "5-14", "15-34", "35-59", "60-79", "80+"];

/// Index of one age group within the fixed ordered set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AgeGroup(pub usize);

impl AgeGroup {
    /// Iterates all age groups in order.
    pub fn all() -> impl Iterator<Item = AgeGroup> {
        (0..NUM_AGE_GROUPS).map(AgeGroup)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// School-age children, the target group of the school migration rule.
    #[must_use]
    pub fn is_school_age(self) -> bool {
        self.0 == 1
    }

    /// Working-age groups commute to work.
    #[must_use]
    pub fn is_working_age(self) -> bool {
        self.0 == 2 || self.0 == 3
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", AGE_GROUP_LABELS.get(self.0).unwrap_or(&"?"))
    }
}

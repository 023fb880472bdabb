//! Scheduled trips between locations, consumed in time order.

use crate::abm::location::LocationId;
use crate::abm::person::PersonId;
use crate::abm::time::TimePoint;
use serde::{Deserialize, Serialize};

/// One planned journey of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub person_id: PersonId,
    pub origin: LocationId,
    pub destination: LocationId,
    pub time: TimePoint,
}

/// Trips ordered by time with a monotone cursor. The cursor advances over
/// every due trip exactly once per step, whether or not the trip is taken.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripList {
    trips: Vec<Trip>,
    cursor: usize,
}

impl TripList {
    #[must_use]
    pub fn new() -> TripList {
        TripList::default()
    }

    /// Inserts a trip, keeping the list sorted by time. Trips at equal times
    /// keep their insertion order.
    pub fn add_trip(&mut self, trip: Trip) {
        let pos = self.trips.partition_point(|t| t.time <= trip.time);
        self.trips.insert(pos, trip);
    }

    #[must_use]
    pub fn num_trips(&self) -> usize {
        self.trips.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn next_trip(&self) -> Option<&Trip> {
        self.trips.get(self.cursor)
    }

    #[must_use]
    pub fn next_trip_time(&self) -> Option<TimePoint> {
        self.next_trip().map(|t| t.time)
    }

    pub fn increase_index(&mut self) {
        self.cursor += 1;
    }

    /// Rewinds the cursor, e.g. for a fresh simulation over the same world.
    pub fn reset_index(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abm::location::LocationType;
    use crate::abm::time::hours;

    fn trip(person: usize, at_hours: i64) -> Trip {
        Trip {
            person_id: PersonId(person),
            origin: LocationId {
                location_type: LocationType::Home,
                index: 0,
            },
            destination: LocationId {
                location_type: LocationType::Work,
                index: 0,
            },
            time: TimePoint::new(0) + hours(at_hours),
        }
    }

    #[test]
    fn trips_are_consumed_in_time_order() {
        let mut list = TripList::new();
        list.add_trip(trip(2, 9));
        list.add_trip(trip(0, 7));
        list.add_trip(trip(1, 8));
        assert_eq!(list.num_trips(), 3);
        assert_eq!(list.next_trip().unwrap().person_id, PersonId(0));
        list.increase_index();
        assert_eq!(list.next_trip().unwrap().person_id, PersonId(1));
        list.increase_index();
        list.increase_index();
        assert!(list.next_trip().is_none());
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let mut list = TripList::new();
        list.add_trip(trip(5, 8));
        list.add_trip(trip(6, 8));
        assert_eq!(list.next_trip().unwrap().person_id, PersonId(5));
        list.increase_index();
        assert_eq!(list.next_trip().unwrap().person_id, PersonId(6));
    }
}

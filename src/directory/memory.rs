use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{DirectoryError, TripDirectory};
use crate::geo::haversine_km;
use crate::models::carrier::{CandidateCarrier, TripQuery};

/// Trip registry kept in process, used when no external directory is wired in.
#[derive(Default)]
pub struct InMemoryTripDirectory {
    trips: DashMap<Uuid, CandidateCarrier>,
}

impl InMemoryTripDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, trip: CandidateCarrier) {
        self.trips.insert(trip.trip_id, trip);
    }

    pub fn list(&self) -> Vec<CandidateCarrier> {
        let mut trips: Vec<CandidateCarrier> =
            self.trips.iter().map(|entry| entry.value().clone()).collect();
        trips.sort_by_key(|trip| trip.departure_at);
        trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

fn matches_query(trip: &CandidateCarrier, query: &TripQuery) -> bool {
    trip.status == query.status
        && trip.departure_at >= query.departure_from
        && trip.departure_at <= query.departure_to
        && trip.remaining_weight_kg >= query.min_weight_kg
        && trip.remaining_items >= query.min_items
        && haversine_km(&trip.origin, &query.origin) <= query.origin_radius_km
        && haversine_km(&trip.destination, &query.destination) <= query.destination_radius_km
}

#[async_trait]
impl TripDirectory for InMemoryTripDirectory {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<CandidateCarrier>, DirectoryError> {
        let trips = self
            .trips
            .iter()
            .filter_map(|entry| {
                let trip = entry.value();
                if matches_query(trip, query) {
                    Some(trip.clone())
                } else {
                    None
                }
            })
            .collect();

        Ok(trips)
    }
}

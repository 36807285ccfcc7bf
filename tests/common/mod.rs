#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use courier_match::cache::{Cache, CacheError, InMemoryCache};
use courier_match::config::Config;
use courier_match::directory::{DirectoryError, InMemoryTripDirectory, TripDirectory};
use courier_match::engine::clock::FixedClock;
use courier_match::geo::GeoPoint;
use courier_match::models::carrier::{CandidateCarrier, TripQuery, TripStatus};
use courier_match::models::identity::{Caller, VerificationLevel};
use courier_match::models::request::{
    ItemCategory, ItemProfile, NewDeliveryRequest, Stop, TimeWindow,
};
use courier_match::state::{AppState, Components};

const KM_PER_DEGREE: f64 = 111.194_926_644_558_73;

/// Point on the equator `km` east of the origin; distances along it are exact.
pub fn east(km: f64) -> GeoPoint {
    GeoPoint {
        lat: 0.0,
        lng: km / KM_PER_DEGREE,
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn config() -> Config {
    Config {
        trip_directory_timeout_ms: 100,
        auto_accept_delay_ms: 20,
        ..Config::default()
    }
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(start_time()))
}

pub fn state_with(config: &Config, components: Components) -> AppState {
    AppState::with_components(config, components)
}

/// State on a clock that only moves when the test says so.
pub fn state_at_fixed_time(config: &Config) -> (AppState, Arc<FixedClock>) {
    let clock = fixed_clock();
    let state = AppState::with_components(
        config,
        Components {
            clock: Some(clock.clone()),
            ..Components::default()
        },
    );
    (state, clock)
}

pub fn customer() -> Caller {
    Caller::customer(Uuid::new_v4())
}

pub fn traveler() -> Caller {
    Caller::traveler(Uuid::new_v4(), 4.8, VerificationLevel::Verified)
}

/// A 5 kg parcel going 50 km east along the equator, picked up 2 to 6 hours
/// after `now`.
pub fn new_request(now: DateTime<Utc>) -> NewDeliveryRequest {
    let pickup_window = TimeWindow {
        start: now + chrono::Duration::hours(2),
        end: now + chrono::Duration::hours(6),
    };
    let dropoff_window = TimeWindow {
        start: now + chrono::Duration::hours(4),
        end: now + chrono::Duration::hours(12),
    };

    NewDeliveryRequest {
        item: ItemProfile {
            weight_kg: 5.0,
            volume_l: None,
            quantity: 1,
            category: ItemCategory::Documents,
            fragile: false,
            declared_value: None,
        },
        pickup: Stop {
            point: east(0.0),
            window: pickup_window,
        },
        dropoff: Stop {
            point: east(50.0),
            window: dropoff_window,
        },
        max_price: 50.0,
        auto_accept_price: None,
        min_traveler_rating: None,
        required_verification: VerificationLevel::Unverified,
        blacklisted_travelers: Vec::new(),
        expires_at: None,
    }
}

/// An upcoming trip by an experienced, verified carrier with room for the
/// parcel in `new_request`.
pub fn trip(
    traveler_id: Uuid,
    origin: GeoPoint,
    destination: GeoPoint,
    departure_at: DateTime<Utc>,
) -> CandidateCarrier {
    CandidateCarrier {
        trip_id: Uuid::new_v4(),
        traveler_id,
        origin,
        destination,
        departure_at,
        arrival_at: departure_at + chrono::Duration::hours(3),
        remaining_weight_kg: 6.0,
        remaining_volume_l: None,
        remaining_items: 3,
        rating: 4.8,
        completed_deliveries: 60,
        verification: VerificationLevel::Verified,
        accepted_categories: Vec::new(),
        accepts_fragile: true,
        max_item_value: None,
        departure_flexibility_hours: 2.0,
        price_per_kg: Some(4.0),
        status: TripStatus::Upcoming,
    }
}

/// Directory that answers correctly but only after `delay`.
pub struct SlowDirectory {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowDirectory {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripDirectory for SlowDirectory {
    async fn search_trips(&self, _query: &TripQuery) -> Result<Vec<CandidateCarrier>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

pub struct FailingDirectory;

#[async_trait]
impl TripDirectory for FailingDirectory {
    async fn search_trips(&self, _query: &TripQuery) -> Result<Vec<CandidateCarrier>, DirectoryError> {
        Err(DirectoryError::Unreachable("connection refused".to_string()))
    }
}

/// In-memory directory that counts searches.
#[derive(Default)]
pub struct CountingDirectory {
    pub trips: InMemoryTripDirectory,
    calls: AtomicUsize,
}

impl CountingDirectory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripDirectory for CountingDirectory {
    async fn search_trips(&self, query: &TripQuery) -> Result<Vec<CandidateCarrier>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.trips.search_trips(query).await
    }
}

/// Cache backend whose every call fails.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("cache down".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("cache down".to_string()))
    }

    async fn del(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("cache down".to_string()))
    }
}

/// In-memory cache whose writes land only after `delay`, leaving room for a
/// commit to slip in between a read-through load and its fill.
pub struct SlowSetCache {
    pub inner: InMemoryCache,
    pub delay: Duration,
}

impl SlowSetCache {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryCache::new(),
            delay,
        }
    }
}

#[async_trait]
impl Cache for SlowSetCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.inner.del(key).await
    }
}

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::cache::{Cache, CacheLayer, InMemoryCache};
use crate::config::{Config, MAX_OFFER_VALIDITY_HOURS};
use crate::directory::{InMemoryTripDirectory, TripDirectory};
use crate::engine::auto_accept::AutoAcceptScheduler;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::events::MarketEvent;
use crate::engine::matching::MatchingEngine;
use crate::engine::offers::{OfferService, OfferSettings};
use crate::engine::requests::RequestService;
use crate::observability::metrics::Metrics;
use crate::store::Store;

/// Collaborators the engine is built around. Anything left as `None` gets the
/// in-process default.
#[derive(Default)]
pub struct Components {
    pub directory: Option<Arc<dyn TripDirectory>>,
    pub cache: Option<Arc<dyn Cache>>,
    pub clock: Option<Arc<dyn Clock>>,
}

pub struct AppState {
    pub store: Arc<Store>,
    pub requests: RequestService,
    pub offers: OfferService,
    pub matching: MatchingEngine,
    pub trips: Arc<InMemoryTripDirectory>,
    pub events_tx: broadcast::Sender<MarketEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_components(config, Components::default())
    }

    pub fn with_components(config: &Config, components: Components) -> Self {
        let metrics = Metrics::new();
        let store = Arc::new(Store::new());
        let trips = Arc::new(InMemoryTripDirectory::new());
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        let directory = components
            .directory
            .unwrap_or_else(|| trips.clone() as Arc<dyn TripDirectory>);
        let cache = CacheLayer::new(
            components
                .cache
                .unwrap_or_else(|| {
                    Arc::new(InMemoryCache::with_max_entries(config.cache_max_entries))
                        as Arc<dyn Cache>
                }),
            metrics.clone(),
        );
        let clock = components
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let scheduler = Arc::new(AutoAcceptScheduler::new(metrics.clone()));

        let requests = RequestService::new(
            store.clone(),
            cache.clone(),
            clock.clone(),
            scheduler.clone(),
            events_tx.clone(),
            config.entity_cache_ttl(),
        );
        let offers = OfferService::new(
            store.clone(),
            cache.clone(),
            clock.clone(),
            scheduler,
            events_tx.clone(),
            metrics.clone(),
            OfferSettings {
                default_validity: chrono::Duration::hours(
                    config
                        .offer_validity_hours
                        .clamp(1, MAX_OFFER_VALIDITY_HOURS),
                ),
                auto_accept_delay: config.auto_accept_delay(),
                entity_cache_ttl: config.entity_cache_ttl(),
            },
        );
        let matching = MatchingEngine::new(
            store.clone(),
            directory,
            cache,
            clock,
            metrics.clone(),
            config.trip_directory_timeout(),
            config.match_cache_ttl(),
        );

        Self {
            store,
            requests,
            offers,
            matching,
            trips,
            events_tx,
            metrics,
        }
    }
}

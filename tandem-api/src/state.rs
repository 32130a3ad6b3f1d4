use std::sync::Arc;

use tandem_domain::repository::{BookingRepository, ReviewRepository, RideRepository};
use tandem_ledger::SeatLedger;
use tandem_store::app_config::BusinessRules;
use tandem_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn SeatLedger>,
    pub rides: Arc<dyn RideRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    /// Rate limiting is skipped when Redis is not around.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

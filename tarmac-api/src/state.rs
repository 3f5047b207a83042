use std::sync::Arc;
use tarmac_core::{Bookings, FlightCatalog};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<dyn Bookings>,
    pub flights: Arc<dyn FlightCatalog>,
    pub auth: AuthConfig,
}

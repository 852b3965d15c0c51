pub mod bot;
pub mod config;
pub mod logger;
pub mod market;
pub mod orders;
pub mod rng;
pub mod strategy;

pub use bot::VolumeBot;
pub use config::{VolumeSettings, WalkDirection};
pub use market::{MarketDataProvider, MarketSnapshot};
pub use orders::OrderTracker;
pub use strategy::{TradeDecision, VolumeStrategy};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the library (loads environment variables from .env file)
/// This is automatically called when the library is loaded
fn init() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
    });
}

// Automatically initialize when the library is loaded
#[ctor::ctor]
fn setup() {
    init();
}

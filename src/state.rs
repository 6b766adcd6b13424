use std::{sync::Arc, time::Duration};

use sqlx::SqlitePool;

use crate::{
    config::Config,
    media::ImageStore,
    payments::{razorpay::RazorpayClient, stripe::StripeClient},
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub images: ImageStore,
    pub razorpay: RazorpayClient,
    pub stripe: StripeClient,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|err| {
                log::warn!("Falling back to default HTTP client: {err}");
                reqwest::Client::new()
            });

        Self {
            images: ImageStore::new(http.clone(), config.cloudinary.clone()),
            razorpay: RazorpayClient::new(http.clone(), config.razorpay.clone()),
            stripe: StripeClient::new(http, config.stripe.clone()),
            db,
            config: Arc::new(config),
        }
    }
}

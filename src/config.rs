use std::env;

const DEFAULT_JWT_SECRET: &str = "sensaloon-dev-secret";
const DEFAULT_JWT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub admin_email: String,
    pub admin_password: String,
    pub currency: String,
    pub frontend_url: String,
    pub cloudinary: CloudinaryConfig,
    pub razorpay: RazorpayConfig,
    pub stripe: StripeConfig,
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn enabled(&self) -> bool {
        !(self.cloud_name.trim().is_empty()
            || self.api_key.trim().is_empty()
            || self.api_secret.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

impl RazorpayConfig {
    pub fn enabled(&self) -> bool {
        !(self.key_id.trim().is_empty() || self.key_secret.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
}

impl StripeConfig {
    pub fn enabled(&self) -> bool {
        !self.secret_key.trim().is_empty()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());
        if jwt_secret == DEFAULT_JWT_SECRET {
            log::warn!("JWT_SECRET not set. Using a development secret. Set JWT_SECRET in production.");
        }

        let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@sensaloon.com".to_string());
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        if admin_password == "admin" {
            log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
        }

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/sensaloon.db".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(4000),
            jwt_secret,
            jwt_ttl_secs: env::var("JWT_TTL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_JWT_TTL_SECS),
            admin_email,
            admin_password,
            currency: env::var("CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cloudinary: CloudinaryConfig {
                cloud_name: env::var("CLOUDINARY_NAME").unwrap_or_default(),
                api_key: env::var("CLOUDINARY_API_KEY").unwrap_or_default(),
                api_secret: env::var("CLOUDINARY_API_SECRET").unwrap_or_default(),
                api_base: env::var("CLOUDINARY_API_BASE")
                    .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
            },
            razorpay: RazorpayConfig {
                key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
                key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
                api_base: env::var("RAZORPAY_API_BASE")
                    .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            },
            stripe: StripeConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
                api_base: env::var("STRIPE_API_BASE")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            },
        };

        if !config.cloudinary.enabled() {
            log::warn!("Cloudinary credentials missing. Image uploads are disabled.");
        }
        if !config.razorpay.enabled() {
            log::info!("Razorpay credentials missing. Razorpay payments are disabled.");
        }
        if !config.stripe.enabled() {
            log::info!("Stripe secret key missing. Stripe payments are disabled.");
        }

        config
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_ttl_secs: 3600,
        admin_email: "admin@example.com".to_string(),
        admin_password: "admin-password".to_string(),
        currency: "INR".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        cloudinary: CloudinaryConfig {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        razorpay: RazorpayConfig {
            key_id: String::new(),
            key_secret: String::new(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        stripe: StripeConfig {
            secret_key: String::new(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
    }
}

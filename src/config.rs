use std::env;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub auto_confirm_bookings: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    /// Reads configuration from the environment.
    ///
    /// Fails when `JWT_SECRET` is unset or blank: there is no fallback secret.
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_default();
        anyhow::ensure!(
            !jwt_secret.trim().is_empty(),
            "JWT_SECRET must be set to a non-empty value"
        );

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(v) => v.parse().context("BCRYPT_COST must be an integer")?,
            Err(_) => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "artzyra.db".to_string()),
            jwt_secret,
            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            bcrypt_cost,
            auto_confirm_bookings: env::var("AUTO_CONFIRM_BOOKINGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            admin_email: non_empty_var("ADMIN_EMAIL"),
            admin_password: non_empty_var("ADMIN_PASSWORD"),
            cors_origin: non_empty_var("CORS_ORIGIN"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(v: &str) -> bool {
    !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

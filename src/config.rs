//! Service configuration from `LEDGER_*` environment variables.
//!
//! Every setting has a default. A value that is set but cannot be parsed is
//! logged and replaced by the default.

use std::str::FromStr;

use tracing::warn;

use crate::cost::{SavingsAssumptions, SavingsOverride};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:energy-ledger.db?mode=rwc";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub savings: SavingsAssumptions,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SavingsAssumptions::default();

        let savings = SavingsAssumptions {
            baseline_month_kwh: parse_or(
                &lookup,
                "LEDGER_BASELINE_MONTH_KWH",
                defaults.baseline_month_kwh,
            ),
            saved_per_day_kwh: parse_or(
                &lookup,
                "LEDGER_SAVED_PER_DAY_KWH",
                defaults.saved_per_day_kwh,
            ),
            subscription_month: parse_or(
                &lookup,
                "LEDGER_SUBSCRIPTION_MONTH",
                defaults.subscription_month,
            ),
            subscription_year: parse_or(
                &lookup,
                "LEDGER_SUBSCRIPTION_YEAR",
                defaults.subscription_year,
            ),
            display_override: savings_override(&lookup),
            ..defaults
        };

        Self {
            port: parse_or(&lookup, "LEDGER_PORT", DEFAULT_PORT),
            database_url: lookup("LEDGER_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            savings,
        }
    }
}

/// The savings display override is enabled by naming its country.
fn savings_override(lookup: &impl Fn(&str) -> Option<String>) -> Option<SavingsOverride> {
    let country = lookup("LEDGER_SAVINGS_OVERRIDE_COUNTRY")?
        .trim()
        .to_ascii_uppercase();
    if country.is_empty() {
        return None;
    }

    Some(SavingsOverride {
        country,
        currency: lookup("LEDGER_SAVINGS_OVERRIDE_CURRENCY")
            .map(|c| c.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "EUR".to_string()),
        price_cents_per_kwh: parse_opt(&lookup, "LEDGER_SAVINGS_OVERRIDE_PRICE_CENTS"),
        yearly_savings: parse_opt(&lookup, "LEDGER_SAVINGS_OVERRIDE_YEARLY"),
    })
}

fn parse_opt<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    parse_opt(lookup, key).unwrap_or(default)
}

//! Monetary cost of energy, and the projections built on it.
//!
//! Prices are stored in minor currency units per kWh (cents, or the
//! equivalent for non-euro currencies) so storage never accumulates floating
//! point drift. Amounts are returned in major units and are not rounded.
//!
//! Month-to-date and year-to-date figures are **extrapolations** of today's
//! cost (`today × day of month`, `today × day of year`), not accumulated
//! ledgers. They must not be presented as billed totals.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Residential rate for a country, used when a home has no price of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRate {
    /// ISO 3166-1 alpha-2 code.
    pub code: &'static str,
    pub name: &'static str,
    pub currency: &'static str,
    pub price_cents_per_kwh: i64,
    /// Typical household consumption per month, where known.
    pub baseline_month_kwh: Option<f64>,
}

static COUNTRY_RATES: [CountryRate; 3] = [
    CountryRate {
        code: "XK",
        name: "Kosovo",
        currency: "EUR",
        price_cents_per_kwh: 9,
        baseline_month_kwh: Some(800.0),
    },
    CountryRate {
        code: "AL",
        name: "Albania",
        currency: "ALL",
        price_cents_per_kwh: 1200,
        baseline_month_kwh: None,
    },
    CountryRate {
        code: "LU",
        name: "Luxembourg",
        currency: "EUR",
        price_cents_per_kwh: 28,
        baseline_month_kwh: None,
    },
];

static UNKNOWN_COUNTRY_RATE: CountryRate = CountryRate {
    code: "",
    name: "Unknown",
    currency: "EUR",
    price_cents_per_kwh: 20,
    baseline_month_kwh: None,
};

/// Look up the rate for a country code, case-insensitively.
///
/// Unknown codes get a EUR 0.20/kWh fallback.
pub fn country_rate(code: &str) -> &'static CountryRate {
    let code = code.trim();
    COUNTRY_RATES
        .iter()
        .find(|rate| rate.code.eq_ignore_ascii_case(code))
        .unwrap_or(&UNKNOWN_COUNTRY_RATE)
}

/// A home's electricity price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePricing {
    /// ISO 4217 code.
    pub currency: String,
    pub price_cents_per_kwh: i64,
}

impl HomePricing {
    pub fn new(currency: impl Into<String>, price_cents_per_kwh: i64) -> Self {
        Self {
            currency: currency.into(),
            price_cents_per_kwh,
        }
    }

    /// Resolve stored pricing columns into a usable price.
    ///
    /// A missing or non-positive price falls back to the country table,
    /// currency included. A missing currency on an explicit price takes the
    /// country's currency.
    pub fn resolve(
        country: Option<&str>,
        currency: Option<&str>,
        price_cents_per_kwh: Option<i64>,
    ) -> Self {
        let rate = country_rate(country.unwrap_or_default());
        match price_cents_per_kwh {
            Some(cents) if cents > 0 => {
                let currency = currency
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .unwrap_or(rate.currency);
                Self::new(currency.to_ascii_uppercase(), cents)
            }
            _ => Self::new(rate.currency, rate.price_cents_per_kwh),
        }
    }

    /// Price per kWh in major currency units.
    pub fn price_per_kwh(&self) -> f64 {
        self.price_cents_per_kwh as f64 / 100.0
    }
}

/// An amount of money in major units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Money {
    pub currency: String,
    pub amount: f64,
}

/// Cost of `energy_kwh` at the home's price.
pub fn cost(energy_kwh: f64, pricing: &HomePricing) -> Money {
    Money {
        currency: pricing.currency.clone(),
        amount: energy_kwh * pricing.price_per_kwh(),
    }
}

/// Today's cost and its month/year extrapolations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostProjection {
    pub currency: String,
    pub kwh_today: f64,
    pub cost_today: f64,
    /// `cost_today × day_of_month`
    pub cost_mtd: f64,
    /// `cost_today × day_of_year`
    pub cost_ytd: f64,
}

pub fn project(kwh_today: f64, pricing: &HomePricing, now: DateTime<Utc>) -> CostProjection {
    let today = cost(kwh_today, pricing);
    CostProjection {
        kwh_today,
        cost_today: today.amount,
        cost_mtd: today.amount * f64::from(now.day()),
        cost_ytd: today.amount * f64::from(now.ordinal()),
        currency: today.currency,
    }
}

/// Assumptions behind the savings projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsAssumptions {
    /// Monthly consumption used when the country table has no baseline.
    pub baseline_month_kwh: f64,
    /// Energy the household is assumed to save per day.
    pub saved_per_day_kwh: f64,
    pub days_per_month: u32,
    pub days_per_year: u32,
    /// Subscription prices, in the home's currency.
    pub subscription_month: f64,
    pub subscription_year: f64,
    /// Presentation override for one country. Off unless configured.
    #[serde(default)]
    pub display_override: Option<SavingsOverride>,
}

impl Default for SavingsAssumptions {
    fn default() -> Self {
        Self {
            baseline_month_kwh: 800.0,
            saved_per_day_kwh: 1.1,
            days_per_month: 30,
            days_per_year: 365,
            subscription_month: 2.99,
            subscription_year: 29.99,
            display_override: None,
        }
    }
}

/// Fixed figures shown instead of the computed ones for homes in one country.
///
/// This is a marketing presentation policy, not an accounting rule; the
/// projection reports when it was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsOverride {
    pub country: String,
    pub currency: String,
    pub price_cents_per_kwh: Option<i64>,
    pub yearly_savings: Option<f64>,
}

/// Baseline-versus-savings comparison for a home.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsProjection {
    pub country_code: String,
    pub country_name: String,
    pub currency: String,
    pub price_per_kwh: f64,

    pub baseline_month_kwh: f64,
    pub with_month_kwh: f64,
    pub save_month_kwh: f64,
    pub baseline_month_cost: f64,
    pub with_month_cost: f64,
    pub save_month_value: f64,

    pub baseline_year_kwh: f64,
    pub with_year_kwh: f64,
    pub save_year_kwh: f64,
    pub baseline_year_cost: f64,
    pub with_year_cost: f64,
    pub save_year_value: f64,

    pub net_year_vs_monthly_plan: f64,
    pub net_year_vs_yearly_plan: f64,

    pub override_applied: bool,
}

/// Project what a home would spend against a baseline household, with and
/// without the assumed daily saving.
///
/// Uses the same extrapolation rule as [`project`]: a per-day figure times
/// the number of days.
pub fn project_savings(
    country: Option<&str>,
    pricing: &HomePricing,
    assumptions: &SavingsAssumptions,
) -> SavingsProjection {
    let code = country.unwrap_or_default().trim().to_ascii_uppercase();
    let rate = country_rate(&code);

    let policy = assumptions
        .display_override
        .as_ref()
        .filter(|policy| policy.country.eq_ignore_ascii_case(&code));

    let mut currency = pricing.currency.clone();
    let mut price_per_kwh = pricing.price_per_kwh();
    if let Some(policy) = policy {
        currency = policy.currency.clone();
        if let Some(cents) = policy.price_cents_per_kwh {
            price_per_kwh = cents as f64 / 100.0;
        }
    }

    let baseline_month_kwh = rate
        .baseline_month_kwh
        .unwrap_or(assumptions.baseline_month_kwh);
    let saved_month_kwh = assumptions.saved_per_day_kwh * f64::from(assumptions.days_per_month);
    let with_month_kwh = (baseline_month_kwh - saved_month_kwh).max(0.0);

    let baseline_year_kwh = baseline_month_kwh * 12.0;
    let saved_year_kwh = assumptions.saved_per_day_kwh * f64::from(assumptions.days_per_year);
    let with_year_kwh = (baseline_year_kwh - saved_year_kwh).max(0.0);

    let baseline_month_cost = baseline_month_kwh * price_per_kwh;
    let baseline_year_cost = baseline_year_kwh * price_per_kwh;

    let mut save_month_value = (baseline_month_kwh - with_month_kwh) * price_per_kwh;
    let mut save_year_value = (baseline_year_kwh - with_year_kwh) * price_per_kwh;
    let mut with_month_cost = with_month_kwh * price_per_kwh;
    let mut with_year_cost = with_year_kwh * price_per_kwh;

    let yearly_override = policy.and_then(|p| p.yearly_savings);
    if let Some(yearly) = yearly_override {
        save_year_value = yearly;
        save_month_value = yearly / 12.0;
        with_month_cost = (baseline_month_cost - save_month_value).max(0.0);
        with_year_cost = (baseline_year_cost - save_year_value).max(0.0);
    }

    SavingsProjection {
        country_code: code,
        country_name: rate.name.to_string(),
        currency,
        price_per_kwh,
        baseline_month_kwh,
        with_month_kwh,
        save_month_kwh: baseline_month_kwh - with_month_kwh,
        baseline_month_cost,
        with_month_cost,
        save_month_value,
        baseline_year_kwh,
        with_year_kwh,
        save_year_kwh: baseline_year_kwh - with_year_kwh,
        baseline_year_cost,
        with_year_cost,
        save_year_value,
        net_year_vs_monthly_plan: save_year_value - assumptions.subscription_month * 12.0,
        net_year_vs_yearly_plan: save_year_value - assumptions.subscription_year,
        override_applied: policy.is_some(),
    }
}

//! Energy ledger - power, energy and cost accounting for smart homes.
//!
//! # Overview
//!
//! Each home has rooms, each room has devices. A device has a type-specific
//! state, a rated power and an append-only log of on/off transitions. From
//! that the ledger derives:
//!
//! - the instantaneous draw of every device
//! - energy used over a window, integrated exactly over the device's on-time
//! - today's cost, with month-to-date and year-to-date extrapolations
//! - dashboard figures: live load, an hourly series and the longest-running devices
//! - a baseline-versus-savings projection per country
//!
//! All wall-clock arithmetic is in UTC.
//!
//! # Modules
//!
//! - [`model`]: Device types, states and response types
//! - [`power`]: Instantaneous power model
//! - [`integrator`]: On-intervals and energy over a window
//! - [`cost`]: Pricing, cost projection and savings
//! - [`aggregation`]: Dashboard and report assembly
//! - [`storage`]: SQLite storage layer
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod config;
pub mod cost;
pub mod error;
pub mod integrator;
pub mod model;
pub mod power;
pub mod storage;

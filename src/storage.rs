//! SQLite record store.
//!
//! The store is deliberately thin: it keeps homes, rooms, devices and the
//! append-only device event log, and hands the accounting engine a
//! [`Household`] snapshot read inside a single transaction.
//!
//! Timestamps are stored as Unix seconds. Device state is stored as the JSON
//! blob produced by [`DeviceState::to_blob`] and read back leniently.
//!
//! A bad row never fails a snapshot: unreadable state becomes the type's
//! default, an unrepresentable activity timestamp becomes `None`, and
//! undecodable device or event rows are skipped with a warning.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, warn};

use crate::cost::HomePricing;
use crate::error::{Result, StorageError};
use crate::model::{Device, DeviceEvent, DeviceKind, DeviceState, Home, Household};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

/// A device to be written to the store.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub room_id: i64,
    pub name: String,
    pub state: DeviceState,
    pub rating_watts: i64,
    pub last_active: Option<DateTime<Utc>>,
}

impl NewDevice {
    /// A device as the registration flow creates it: default state and
    /// rating for its type, active as of `now`.
    pub fn registered(room_id: i64, kind: DeviceKind, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            room_id,
            name: name.trim().to_string(),
            state: DeviceState::registration_default(kind),
            rating_watts: kind.registration_rating_watts(name),
            last_active: Some(now),
        }
    }
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:energy-ledger.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS homes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                country TEXT,
                currency TEXT,
                price_cents_per_kwh INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                home_id INTEGER NOT NULL REFERENCES homes(id) ON DELETE CASCADE,
                name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                state_json TEXT,
                rating_watts INTEGER NOT NULL DEFAULT 0,
                last_active INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS device_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                from_on INTEGER NOT NULL,
                to_on INTEGER NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
            // Per-device time-range scans
            r#"
            CREATE INDEX IF NOT EXISTS idx_device_events_device_ts
            ON device_events(device_id, ts)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Insert a home. `pricing` of `None` leaves the price to the country table.
    pub async fn insert_home(
        &self,
        name: &str,
        country: Option<&str>,
        pricing: Option<&HomePricing>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO homes (name, country, currency, price_cents_per_kwh)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(country.map(|c| c.trim().to_ascii_uppercase()))
        .bind(pricing.map(|p| p.currency.clone()))
        .bind(pricing.map(|p| p.price_cents_per_kwh))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn insert_room(&self, home_id: i64, name: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO rooms (home_id, name) VALUES (?, ?)")
            .bind(home_id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn insert_device(&self, device: &NewDevice) -> Result<i64> {
        let state_json = serde_json::to_string(&device.state.to_blob())?;

        let result = sqlx::query(
            r#"
            INSERT INTO devices (room_id, kind, name, state_json, rating_watts, last_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(device.room_id)
        .bind(device.state.kind().as_str())
        .bind(&device.name)
        .bind(state_json)
        .bind(device.rating_watts)
        .bind(device.last_active.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append an event to a device's log.
    pub async fn append_event(&self, event: &DeviceEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_events (device_id, from_on, to_on, ts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(event.device_id)
        .bind(event.from)
        .bind(event.to)
        .bind(event.at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flip a device's power switch, stamp its last activity and log the
    /// transition, all in one transaction.
    pub async fn toggle_device(&self, device_id: i64, now: DateTime<Utc>) -> Result<DeviceEvent> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT kind, state_json FROM devices WHERE id = ?")
            .bind(device_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "device",
                id: device_id,
            })?;

        let kind = DeviceKind::parse(row.try_get::<&str, _>("kind")?);
        let raw_state: Option<String> = row.try_get("state_json").ok().flatten();
        let state = DeviceState::from_json_str(kind, raw_state.as_deref());
        let at = timestamp(now.timestamp())?;

        let was_on = state.is_on();
        let toggled = state.with_on(!was_on);
        let state_json = serde_json::to_string(&toggled.to_blob())?;

        sqlx::query("UPDATE devices SET state_json = ?, last_active = ? WHERE id = ?")
            .bind(state_json)
            .bind(at.timestamp())
            .bind(device_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO device_events (device_id, from_on, to_on, ts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(device_id)
        .bind(was_on)
        .bind(!was_on)
        .bind(at.timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(device_id, from = was_on, to = !was_on, "Device toggled");

        Ok(DeviceEvent {
            device_id,
            from: was_on,
            to: !was_on,
            at,
        })
    }

    /// Delete a device and its events. Returns `false` if it did not exist.
    pub async fn delete_device(&self, device_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM device_events WHERE device_id = ?")
            .bind(device_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(device_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a home with its pricing resolved against the country table.
    pub async fn get_home(&self, home_id: i64) -> Result<Option<Home>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, country, currency, price_cents_per_kwh
            FROM homes
            WHERE id = ?
            "#,
        )
        .bind(home_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| home_from_row(&row)).transpose()
    }

    /// Read a consistent snapshot of every device in a home and their events.
    pub async fn load_household(&self, home_id: i64) -> Result<Household> {
        let mut tx = self.pool.begin().await?;

        let device_rows = sqlx::query(
            r#"
            SELECT d.id, d.name, d.kind, d.state_json, d.rating_watts, d.last_active,
                   d.room_id, r.name AS room_name
            FROM devices d
            INNER JOIN rooms r ON d.room_id = r.id
            WHERE r.home_id = ?
            ORDER BY d.id
            "#,
        )
        .bind(home_id)
        .fetch_all(&mut *tx)
        .await?;

        let event_rows = sqlx::query(
            r#"
            SELECT e.device_id, e.from_on, e.to_on, e.ts
            FROM device_events e
            INNER JOIN devices d ON e.device_id = d.id
            INNER JOIN rooms r ON d.room_id = r.id
            WHERE r.home_id = ?
            ORDER BY e.device_id, e.ts, e.id
            "#,
        )
        .bind(home_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let devices = device_rows
            .iter()
            .filter_map(|row| match device_from_row(row) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!(home_id, error = %e, "Skipping unreadable device row");
                    None
                }
            })
            .collect();
        let events = event_rows
            .iter()
            .filter_map(|row| match event_from_row(row) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(home_id, error = %e, "Skipping unreadable event row");
                    None
                }
            })
            .collect();

        Ok(Household { devices, events })
    }
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or(StorageError::Timestamp(ts))
}

fn home_from_row(row: &SqliteRow) -> Result<Home> {
    let country: Option<String> = row.try_get("country")?;
    let currency: Option<String> = row.try_get("currency")?;
    let price: Option<i64> = row.try_get("price_cents_per_kwh")?;

    Ok(Home {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        pricing: HomePricing::resolve(country.as_deref(), currency.as_deref(), price),
        country,
    })
}

fn device_from_row(row: &SqliteRow) -> Result<Device> {
    let id: i64 = row.try_get("id")?;
    let kind = DeviceKind::parse(row.try_get::<&str, _>("kind").unwrap_or_default());
    let raw_state: Option<String> = row.try_get("state_json").ok().flatten();
    let last_active = match row.try_get::<Option<i64>, _>("last_active") {
        Ok(Some(ts)) => timestamp(ts)
            .inspect_err(|e| warn!(device_id = id, error = %e, "Ignoring last activity"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            warn!(device_id = id, error = %e, "Ignoring last activity");
            None
        }
    };

    Ok(Device {
        id,
        name: row.try_get("name")?,
        room_id: row.try_get("room_id")?,
        room_name: row.try_get("room_name")?,
        state: DeviceState::from_json_str(kind, raw_state.as_deref()),
        rating_watts: row.try_get("rating_watts").unwrap_or_default(),
        last_active,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<DeviceEvent> {
    Ok(DeviceEvent {
        device_id: row.try_get("device_id")?,
        from: row.try_get("from_on")?,
        to: row.try_get("to_on")?,
        at: timestamp(row.try_get("ts")?)?,
    })
}

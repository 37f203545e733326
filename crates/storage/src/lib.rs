use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{
    LineItem, MenuCategory, MenuItem, MenuItemId, NewMenuItem, NewReservation, Reservation,
    ReservationId, ReservationStatus, SeatingArea, TimeSlot,
};

mod credentials;

pub use credentials::{hash_password, verify_password};

/// What a backend can promise beyond the basic contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCapabilities {
    /// Reservation and its line items are written in one transaction.
    pub atomic_line_items: bool,
}

/// Outcome of a conditional status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    Applied(Reservation),
    /// The record no longer had the expected status; carries what is stored now.
    Conflict(Reservation),
    NotFound,
}

/// Persistence boundary for reservations and the menu they reference.
///
/// Once `create` returns, the record must be visible to the next `list` or
/// `get`. Nothing stronger is assumed by callers.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    /// Persists a pending reservation. Backends without
    /// [`StoreCapabilities::atomic_line_items`] ignore `reservation.items`;
    /// callers follow up with [`ReservationStore::create_line_items`].
    async fn create(&self, reservation: &NewReservation) -> Result<Reservation>;

    async fn create_line_items(&self, reservation_id: ReservationId, items: &[LineItem])
        -> Result<()>;

    /// All reservations, newest first.
    async fn list(&self) -> Result<Vec<Reservation>>;

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// Writes `status` only if the record currently has `expected`.
    async fn update_status(
        &self,
        reservation_id: ReservationId,
        expected: ReservationStatus,
        status: ReservationStatus,
    ) -> Result<StatusWrite>;

    async fn list_menu(&self) -> Result<Vec<MenuItem>>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

const RESERVATION_COLUMNS: &str =
    "id, date, time, guests, name, email, phone, seating_area, table_number, status, created_at";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(%database_url, "sqlite storage ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_admin(&self, username: &str, password: &str) -> Result<i64> {
        let username = username.trim();
        if username.is_empty() {
            bail!("admin username cannot be empty");
        }
        if password.is_empty() {
            bail!("admin password cannot be empty");
        }
        let password_hash = hash_password(password)?;
        let rec = sqlx::query(
            "INSERT INTO admin_users (username, password_hash) VALUES (?, ?) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!("failed to create admin '{username}'; is it already registered?")
        })?;
        Ok(rec.get::<i64, _>(0))
    }

    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn verify_admin(&self, username: &str, password: &str) -> Result<bool> {
        let row = sqlx::query("SELECT password_hash FROM admin_users WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| verify_password(password, &r.get::<String, _>(0)))
            .unwrap_or(false))
    }

    pub async fn insert_menu_item(&self, item: &NewMenuItem) -> Result<MenuItemId> {
        if item.price_cents < 0 {
            bail!("menu item '{}' has a negative price", item.name);
        }
        if item.name.trim().is_empty() {
            bail!("menu item name cannot be empty");
        }
        let rec = sqlx::query(
            "INSERT INTO menu_items (name, description, price_cents, category, image_url, is_spicy)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(item.name.trim())
        .bind(item.description.as_deref())
        .bind(item.price_cents)
        .bind(item.category.as_str())
        .bind(item.image_url.as_deref())
        .bind(item.is_spicy)
        .fetch_one(&self.pool)
        .await?;
        Ok(MenuItemId(rec.get::<i64, _>(0)))
    }

    async fn line_items_by_reservation(
        &self,
        reservation_id: Option<ReservationId>,
    ) -> Result<HashMap<i64, Vec<LineItem>>> {
        let rows = match reservation_id {
            Some(id) => {
                sqlx::query(
                    "SELECT reservation_id, menu_item_id, quantity
                     FROM reservation_items
                     WHERE reservation_id = ?
                     ORDER BY position ASC",
                )
                .bind(id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT reservation_id, menu_item_id, quantity
                     FROM reservation_items
                     ORDER BY reservation_id ASC, position ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut items: HashMap<i64, Vec<LineItem>> = HashMap::new();
        for row in rows {
            let quantity = u32::try_from(row.get::<i64, _>(2))
                .context("stored quantity out of range")?;
            items.entry(row.get::<i64, _>(0)).or_default().push(LineItem {
                menu_item_id: MenuItemId(row.get::<i64, _>(1)),
                quantity,
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl ReservationStore for Storage {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            atomic_line_items: true,
        }
    }

    async fn create(&self, reservation: &NewReservation) -> Result<Reservation> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO reservations
                (date, time, guests, name, email, phone, seating_area, table_number, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(reservation.date)
        .bind(reservation.time.to_string())
        .bind(i64::from(reservation.guests))
        .bind(&reservation.name)
        .bind(&reservation.email)
        .bind(&reservation.phone)
        .bind(reservation.seating_area.map(SeatingArea::as_str))
        .bind(i64::from(reservation.table_number))
        .bind(ReservationStatus::Pending.as_str())
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert reservation")?;
        let reservation_id = ReservationId(rec.get::<i64, _>(0));

        insert_line_items(&mut tx, reservation_id, 0, &reservation.items).await?;
        tx.commit().await?;

        Ok(Reservation {
            id: reservation_id,
            date: reservation.date,
            time: reservation.time,
            guests: reservation.guests,
            name: reservation.name.clone(),
            email: reservation.email.clone(),
            phone: reservation.phone.clone(),
            seating_area: reservation.seating_area,
            table_number: reservation.table_number,
            status: ReservationStatus::Pending,
            items: reservation.items.clone(),
            created_at,
        })
    }

    async fn create_line_items(
        &self,
        reservation_id: ReservationId,
        items: &[LineItem],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM reservations WHERE id = ?")
            .bind(reservation_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            bail!("reservation {} not found", reservation_id.0);
        }
        let next_position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM reservation_items WHERE reservation_id = ?",
        )
        .bind(reservation_id.0)
        .fetch_one(&mut *tx)
        .await?;

        insert_line_items(&mut tx, reservation_id, next_position, items).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut items = self.line_items_by_reservation(None).await?;

        rows.iter()
            .map(|row| {
                let id = row.get::<i64, _>("id");
                reservation_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?"
        ))
        .bind(reservation_id.0)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = self
            .line_items_by_reservation(Some(reservation_id))
            .await?;
        let reservation =
            reservation_from_row(&row, items.remove(&reservation_id.0).unwrap_or_default())?;
        Ok(Some(reservation))
    }

    async fn update_status(
        &self,
        reservation_id: ReservationId,
        expected: ReservationStatus,
        status: ReservationStatus,
    ) -> Result<StatusWrite> {
        let updated = sqlx::query(
            "UPDATE reservations SET status = ?
             WHERE id = ? AND COALESCE(status, 'pending') = ?",
        )
        .bind(status.as_str())
        .bind(reservation_id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        let current = self.get(reservation_id).await?;
        Ok(match (updated, current) {
            (_, None) => StatusWrite::NotFound,
            (0, Some(current)) => StatusWrite::Conflict(current),
            (_, Some(current)) => StatusWrite::Applied(current),
        })
    }

    async fn list_menu(&self) -> Result<Vec<MenuItem>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price_cents, category, image_url, is_spicy
             FROM menu_items
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<MenuItem> {
                Ok(MenuItem {
                    id: MenuItemId(r.get::<i64, _>(0)),
                    name: r.get::<String, _>(1),
                    description: r.get::<Option<String>, _>(2),
                    price_cents: r.get::<i64, _>(3),
                    category: MenuCategory::from_str(&r.get::<String, _>(4))?,
                    image_url: r.get::<Option<String>, _>(5),
                    is_spicy: r.get::<bool, _>(6),
                })
            })
            .collect()
    }
}

async fn insert_line_items(
    conn: &mut SqliteConnection,
    reservation_id: ReservationId,
    first_position: i64,
    items: &[LineItem],
) -> Result<()> {
    for (position, item) in (first_position..).zip(items) {
        if item.quantity == 0 {
            bail!(
                "line item for menu item {} has zero quantity",
                item.menu_item_id.0
            );
        }
        sqlx::query(
            "INSERT INTO reservation_items (reservation_id, position, menu_item_id, quantity)
             VALUES (?, ?, ?, ?)",
        )
        .bind(reservation_id.0)
        .bind(position)
        .bind(item.menu_item_id.0)
        .bind(i64::from(item.quantity))
        .execute(&mut *conn)
        .await
        .context("failed to insert reservation line item")?;
    }
    Ok(())
}

fn reservation_from_row(row: &SqliteRow, items: Vec<LineItem>) -> Result<Reservation> {
    let time: String = row.try_get("time")?;
    let seating_area = row
        .try_get::<Option<String>, _>("seating_area")?
        .map(|area| SeatingArea::from_str(&area))
        .transpose()?;
    // Rows written by older frontends may carry no status at all; anything
    // else must be a known status.
    let status = row
        .try_get::<Option<String>, _>("status")?
        .map(|status| status.parse::<ReservationStatus>())
        .transpose()?
        .unwrap_or_default();

    Ok(Reservation {
        id: ReservationId(row.try_get::<i64, _>("id")?),
        date: row.try_get::<NaiveDate, _>("date")?,
        time: TimeSlot::from_str(&time)?,
        guests: u8::try_from(row.try_get::<i64, _>("guests")?)
            .context("stored guests out of range")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        seating_area,
        table_number: u32::try_from(row.try_get::<i64, _>("table_number")?)
            .context("stored table number out of range")?,
        status,
        items,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

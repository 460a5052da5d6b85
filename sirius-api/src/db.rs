//! PostgreSQL Record Store
//!
//! Connection pooling via deadpool-postgres and a [`RecordStore`]
//! implementation over the `sirius` schema. Every mutation runs in one
//! transaction so the pre-image it returns is the row it replaced.

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use sirius_core::{
    Dish, DishCategory, DishId, DishPatch, EntityKind, NewDish, NewReservation, NewRestaurant,
    Reservation, ReservationId, ReservationPatch, Restaurant, RestaurantId, RestaurantPatch,
    SiriusError, SiriusResult, StorageError, User, UserId, UserPatch,
};
use sirius_storage::{DeletedDish, RecordStore, Updated};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{GenericClient, NoTls, Row};

use crate::error::{ApiError, ApiResult};

/// Schema migration applied by [`PgRecordStore::migrate`].
pub const INIT_MIGRATION: &str = include_str!("../migrations/0001_init.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Bound on waiting for, creating and recycling a connection
    pub timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "sirius".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Environment variables: `SIRIUS_DB_HOST`, `SIRIUS_DB_PORT`,
    /// `SIRIUS_DB_NAME`, `SIRIUS_DB_USER`, `SIRIUS_DB_PASSWORD`,
    /// `SIRIUS_DB_POOL_SIZE`, `SIRIUS_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("SIRIUS_DB_HOST").unwrap_or(defaults.host),
            port: lookup("SIRIUS_DB_PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("SIRIUS_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("SIRIUS_DB_USER").unwrap_or(defaults.user),
            password: lookup("SIRIUS_DB_PASSWORD").unwrap_or(defaults.password),
            max_size: lookup("SIRIUS_DB_POOL_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .filter(|size: &usize| *size > 0)
                .unwrap_or(defaults.max_size),
            timeout: lookup("SIRIUS_DB_TIMEOUT")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the first checkout.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(self.max_size);
        pool.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pg_error(operation: &str, err: tokio_postgres::Error) -> SiriusError {
    let reason = match err.as_db_error() {
        Some(db) => format!("{}: {}", db.code().code(), db.message()),
        None => err.to_string(),
    };
    SiriusError::backend(operation, reason)
}

fn pool_error(operation: &str, err: PoolError) -> SiriusError {
    match err {
        PoolError::Timeout(_) => SiriusError::Storage(StorageError::Timeout {
            operation: operation.to_string(),
        }),
        other => SiriusError::backend(operation, other.to_string()),
    }
}

fn is_foreign_key_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn dish_from_row(row: &Row) -> SiriusResult<Dish> {
    let decode = |e: tokio_postgres::Error| pg_error("dish_decode", e);
    let category: String = row.try_get("category").map_err(decode)?;
    let category = DishCategory::from_db_str(&category)
        .map_err(|e| SiriusError::backend("dish_decode", e.to_string()))?;
    Ok(Dish {
        id: DishId::new(row.try_get("id").map_err(decode)?),
        category,
        name: row.try_get("dish_name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        price: row.try_get("price").map_err(decode)?,
    })
}

fn restaurant_from_row(row: &Row, menu: Vec<DishId>) -> SiriusResult<Restaurant> {
    let decode = |e: tokio_postgres::Error| pg_error("restaurant_decode", e);
    Ok(Restaurant {
        id: RestaurantId::new(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        address: row.try_get("address").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        menu,
    })
}

fn reservation_from_row(row: &Row) -> SiriusResult<Reservation> {
    let decode = |e: tokio_postgres::Error| pg_error("reservation_decode", e);
    Ok(Reservation {
        id: ReservationId::new(row.try_get("id").map_err(decode)?),
        user_id: UserId::new(row.try_get("user_id").map_err(decode)?),
        restaurant_id: RestaurantId::new(row.try_get("restaurant_id").map_err(decode)?),
        date_reserv: row.try_get("date_reserv").map_err(decode)?,
        guest_count: row.try_get("guest_count").map_err(decode)?,
        comment: row.try_get("comment").map_err(decode)?,
        status: row.try_get("status").map_err(decode)?,
    })
}

fn user_from_row(row: &Row) -> SiriusResult<User> {
    let decode = |e: tokio_postgres::Error| pg_error("user_decode", e);
    Ok(User {
        id: UserId::new(row.try_get("id").map_err(decode)?),
        username: row.try_get("username").map_err(decode)?,
    })
}

// ============================================================================
// QUERIES
// ============================================================================

const DISH_BY_ID: &str = "SELECT id, category::text AS category, dish_name, description, price \
     FROM sirius.dish WHERE id = $1";

const DISH_BY_ID_FOR_UPDATE: &str =
    "SELECT id, category::text AS category, dish_name, description, price \
     FROM sirius.dish WHERE id = $1 FOR UPDATE";

const RESTAURANT_BY_ID: &str =
    "SELECT id, name, address, description FROM sirius.restaurant WHERE id = $1";

const RESTAURANT_BY_ID_FOR_UPDATE: &str =
    "SELECT id, name, address, description FROM sirius.restaurant WHERE id = $1 FOR UPDATE";

const RESERVATION_COLUMNS_BY_ID: &str =
    "SELECT id, user_id, restaurant_id, date_reserv, guest_count, comment, status \
     FROM sirius.reservation WHERE id = $1";

async fn load_menu<C>(client: &C, id: RestaurantId) -> SiriusResult<Vec<DishId>>
where
    C: GenericClient + Sync,
{
    let rows = client
        .query(
            "SELECT dish_id FROM sirius.restaurant_dish WHERE restaurant_id = $1 ORDER BY position",
            &[&id.get()],
        )
        .await
        .map_err(|e| pg_error("restaurant_menu_ids", e))?;
    rows.iter()
        .map(|row| {
            row.try_get::<_, i64>(0)
                .map(DishId::new)
                .map_err(|e| pg_error("restaurant_menu_ids", e))
        })
        .collect()
}

async fn load_restaurant<C>(
    client: &C,
    id: RestaurantId,
    for_update: bool,
) -> SiriusResult<Option<Restaurant>>
where
    C: GenericClient + Sync,
{
    let sql = if for_update {
        RESTAURANT_BY_ID_FOR_UPDATE
    } else {
        RESTAURANT_BY_ID
    };
    let Some(row) = client
        .query_opt(sql, &[&id.get()])
        .await
        .map_err(|e| pg_error("restaurant_get", e))?
    else {
        return Ok(None);
    };
    let menu = load_menu(client, id).await?;
    restaurant_from_row(&row, menu).map(Some)
}

async fn restaurant_exists<C>(client: &C, id: RestaurantId) -> SiriusResult<bool>
where
    C: GenericClient + Sync,
{
    client
        .query_opt(
            "SELECT 1 FROM sirius.restaurant WHERE id = $1 FOR SHARE",
            &[&id.get()],
        )
        .await
        .map(|row| row.is_some())
        .map_err(|e| pg_error("restaurant_exists", e))
}

/// Every menu entry must name an existing dish. The rows stay share-locked
/// until the transaction ends.
async fn check_menu<C>(client: &C, menu: &[DishId]) -> SiriusResult<()>
where
    C: GenericClient + Sync,
{
    if menu.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = menu.iter().map(|d| d.get()).collect();
    let rows = client
        .query(
            "SELECT id FROM sirius.dish WHERE id = ANY($1) FOR SHARE",
            &[&ids],
        )
        .await
        .map_err(|e| pg_error("restaurant_menu_check", e))?;
    let found = rows
        .iter()
        .map(|row| row.try_get::<_, i64>(0))
        .collect::<Result<HashSet<i64>, _>>()
        .map_err(|e| pg_error("restaurant_menu_check", e))?;

    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(StorageError::ReferenceNotFound {
            kind: EntityKind::Dish,
            id: *missing,
        }
        .into()),
        None => Ok(()),
    }
}

async fn replace_menu<C>(client: &C, id: RestaurantId, menu: &[DishId]) -> SiriusResult<()>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            "DELETE FROM sirius.restaurant_dish WHERE restaurant_id = $1",
            &[&id.get()],
        )
        .await
        .map_err(|e| pg_error("restaurant_menu_replace", e))?;
    if menu.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = menu.iter().map(|d| d.get()).collect();
    client
        .execute(
            "INSERT INTO sirius.restaurant_dish (restaurant_id, dish_id, position) \
             SELECT $1, m.dish_id, m.ord::int \
             FROM unnest($2::bigint[]) WITH ORDINALITY AS m(dish_id, ord)",
            &[&id.get(), &ids],
        )
        .await
        .map_err(|e| pg_error("restaurant_menu_replace", e))?;
    Ok(())
}

// ============================================================================
// STORE
// ============================================================================

/// [`RecordStore`] over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Pool,
}

impl PgRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn conn(&self, operation: &str) -> SiriusResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| pool_error(operation, e))
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> SiriusResult<()> {
        let conn = self.conn("migrate").await?;
        conn.batch_execute(INIT_MIGRATION)
            .await
            .map_err(|e| pg_error("migrate", e))?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    /// Register a user. Account creation belongs to the auth service; this
    /// exists for seeding and tests.
    pub async fn user_create(&self, username: &str) -> SiriusResult<User> {
        let conn = self.conn("user_create").await?;
        let row = conn
            .query_one(
                "INSERT INTO sirius.\"user\" (username) VALUES ($1) RETURNING id, username",
                &[&username],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    SiriusError::invalid("username", "already taken")
                } else {
                    pg_error("user_create", e)
                }
            })?;
        user_from_row(&row)
    }
}

impl std::fmt::Debug for PgRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PgRecordStore")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    // ========================================================================
    // DISH OPERATIONS
    // ========================================================================

    async fn dish_get(&self, id: DishId) -> SiriusResult<Option<Dish>> {
        let conn = self.conn("dish_get").await?;
        conn.query_opt(DISH_BY_ID, &[&id.get()])
            .await
            .map_err(|e| pg_error("dish_get", e))?
            .map(|row| dish_from_row(&row))
            .transpose()
    }

    async fn dish_list(&self, category: Option<DishCategory>) -> SiriusResult<Vec<Dish>> {
        let conn = self.conn("dish_list").await?;
        let category = category.map(|c| c.as_db_str());
        let rows = conn
            .query(
                "SELECT id, category::text AS category, dish_name, description, price \
                 FROM sirius.dish \
                 WHERE $1::text IS NULL OR category = $1::text::sirius.dish_category \
                 ORDER BY id",
                &[&category],
            )
            .await
            .map_err(|e| pg_error("dish_list", e))?;
        rows.iter().map(dish_from_row).collect()
    }

    async fn dish_create(&self, dish: NewDish) -> SiriusResult<Dish> {
        let conn = self.conn("dish_create").await?;
        let row = conn
            .query_one(
                "INSERT INTO sirius.dish (category, dish_name, description, price) \
                 VALUES ($1::text::sirius.dish_category, $2, $3, $4) \
                 RETURNING id, category::text AS category, dish_name, description, price",
                &[
                    &dish.category.as_db_str(),
                    &dish.name,
                    &dish.description,
                    &dish.price,
                ],
            )
            .await
            .map_err(|e| pg_error("dish_create", e))?;
        dish_from_row(&row)
    }

    async fn dish_update(
        &self,
        id: DishId,
        patch: DishPatch,
    ) -> SiriusResult<Option<Updated<Dish>>> {
        let mut conn = self.conn("dish_update").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("dish_update", e))?;

        let Some(row) = tx
            .query_opt(DISH_BY_ID_FOR_UPDATE, &[&id.get()])
            .await
            .map_err(|e| pg_error("dish_update", e))?
        else {
            return Ok(None);
        };
        let before = dish_from_row(&row)?;
        let next = patch.apply(&before);

        let row = tx
            .query_one(
                "UPDATE sirius.dish \
                 SET category = $2::text::sirius.dish_category, dish_name = $3, \
                     description = $4, price = $5 \
                 WHERE id = $1 \
                 RETURNING id, category::text AS category, dish_name, description, price",
                &[
                    &id.get(),
                    &next.category.as_db_str(),
                    &next.name,
                    &next.description,
                    &next.price,
                ],
            )
            .await
            .map_err(|e| pg_error("dish_update", e))?;
        let after = dish_from_row(&row)?;

        tx.commit().await.map_err(|e| pg_error("dish_update", e))?;
        Ok(Some(Updated { before, after }))
    }

    async fn dish_delete(&self, id: DishId) -> SiriusResult<Option<DeletedDish>> {
        let mut conn = self.conn("dish_delete").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("dish_delete", e))?;

        let Some(row) = tx
            .query_opt(DISH_BY_ID_FOR_UPDATE, &[&id.get()])
            .await
            .map_err(|e| pg_error("dish_delete", e))?
        else {
            return Ok(None);
        };
        let dish = dish_from_row(&row)?;

        // Collected before the delete cascades the links away.
        let menus = tx
            .query(
                "SELECT restaurant_id FROM sirius.restaurant_dish \
                 WHERE dish_id = $1 ORDER BY restaurant_id",
                &[&id.get()],
            )
            .await
            .map_err(|e| pg_error("dish_delete", e))?
            .iter()
            .map(|row| row.try_get::<_, i64>(0).map(RestaurantId::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| pg_error("dish_delete", e))?;

        tx.execute("DELETE FROM sirius.dish WHERE id = $1", &[&id.get()])
            .await
            .map_err(|e| pg_error("dish_delete", e))?;

        tx.commit().await.map_err(|e| pg_error("dish_delete", e))?;
        Ok(Some(DeletedDish { dish, menus }))
    }

    // ========================================================================
    // RESTAURANT OPERATIONS
    // ========================================================================

    async fn restaurant_get(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        let conn = self.conn("restaurant_get").await?;
        load_restaurant(&**conn, id, false).await
    }

    async fn restaurant_list(&self) -> SiriusResult<Vec<Restaurant>> {
        let conn = self.conn("restaurant_list").await?;
        let rows = conn
            .query(
                "SELECT id, name, address, description FROM sirius.restaurant ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| pg_error("restaurant_list", e))?;
        let links = conn
            .query(
                "SELECT restaurant_id, dish_id FROM sirius.restaurant_dish \
                 ORDER BY restaurant_id, position",
                &[],
            )
            .await
            .map_err(|e| pg_error("restaurant_list", e))?;

        let mut menus: BTreeMap<i64, Vec<DishId>> = BTreeMap::new();
        for link in &links {
            let restaurant_id: i64 = link
                .try_get(0)
                .map_err(|e| pg_error("restaurant_list", e))?;
            let dish_id: i64 = link
                .try_get(1)
                .map_err(|e| pg_error("restaurant_list", e))?;
            menus
                .entry(restaurant_id)
                .or_default()
                .push(DishId::new(dish_id));
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row
                    .try_get("id")
                    .map_err(|e| pg_error("restaurant_list", e))?;
                restaurant_from_row(row, menus.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn restaurant_create(&self, restaurant: NewRestaurant) -> SiriusResult<Restaurant> {
        let mut conn = self.conn("restaurant_create").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("restaurant_create", e))?;

        check_menu(&*tx, &restaurant.menu).await?;
        let row = tx
            .query_one(
                "INSERT INTO sirius.restaurant (name, address, description) \
                 VALUES ($1, $2, $3) RETURNING id",
                &[&restaurant.name, &restaurant.address, &restaurant.description],
            )
            .await
            .map_err(|e| pg_error("restaurant_create", e))?;
        let id = RestaurantId::new(
            row.try_get(0)
                .map_err(|e| pg_error("restaurant_create", e))?,
        );

        let created = restaurant.into_restaurant(id);
        replace_menu(&*tx, id, &created.menu).await?;

        tx.commit()
            .await
            .map_err(|e| pg_error("restaurant_create", e))?;
        Ok(created)
    }

    async fn restaurant_update(
        &self,
        id: RestaurantId,
        patch: RestaurantPatch,
    ) -> SiriusResult<Option<Updated<Restaurant>>> {
        let mut conn = self.conn("restaurant_update").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("restaurant_update", e))?;

        let Some(before) = load_restaurant(&*tx, id, true).await? else {
            return Ok(None);
        };
        let after = patch.apply(&before);

        tx.execute(
            "UPDATE sirius.restaurant SET name = $2, address = $3, description = $4 \
             WHERE id = $1",
            &[&id.get(), &after.name, &after.address, &after.description],
        )
        .await
        .map_err(|e| pg_error("restaurant_update", e))?;

        if patch.menu.is_some() {
            check_menu(&*tx, &after.menu).await?;
            replace_menu(&*tx, id, &after.menu).await?;
        }

        tx.commit()
            .await
            .map_err(|e| pg_error("restaurant_update", e))?;
        Ok(Some(Updated { before, after }))
    }

    async fn restaurant_delete(&self, id: RestaurantId) -> SiriusResult<Option<Restaurant>> {
        let mut conn = self.conn("restaurant_delete").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("restaurant_delete", e))?;

        let Some(restaurant) = load_restaurant(&*tx, id, true).await? else {
            return Ok(None);
        };
        // Menu links and reservations cascade.
        tx.execute("DELETE FROM sirius.restaurant WHERE id = $1", &[&id.get()])
            .await
            .map_err(|e| pg_error("restaurant_delete", e))?;

        tx.commit()
            .await
            .map_err(|e| pg_error("restaurant_delete", e))?;
        Ok(Some(restaurant))
    }

    async fn restaurant_menu(
        &self,
        id: RestaurantId,
        category: Option<DishCategory>,
    ) -> SiriusResult<Option<Vec<Dish>>> {
        let conn = self.conn("restaurant_menu").await?;
        let exists = conn
            .query_opt("SELECT 1 FROM sirius.restaurant WHERE id = $1", &[&id.get()])
            .await
            .map_err(|e| pg_error("restaurant_menu", e))?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let category = category.map(|c| c.as_db_str());
        let rows = conn
            .query(
                "SELECT d.id, d.category::text AS category, d.dish_name, d.description, d.price \
                 FROM sirius.dish d \
                 JOIN sirius.restaurant_dish rd ON rd.dish_id = d.id \
                 WHERE rd.restaurant_id = $1 \
                   AND ($2::text IS NULL OR d.category = $2::text::sirius.dish_category) \
                 ORDER BY d.id",
                &[&id.get(), &category],
            )
            .await
            .map_err(|e| pg_error("restaurant_menu", e))?;
        rows.iter().map(dish_from_row).collect::<SiriusResult<Vec<_>>>().map(Some)
    }

    // ========================================================================
    // RESERVATION OPERATIONS
    // ========================================================================

    async fn reservation_get(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        let conn = self.conn("reservation_get").await?;
        conn.query_opt(RESERVATION_COLUMNS_BY_ID, &[&id.get()])
            .await
            .map_err(|e| pg_error("reservation_get", e))?
            .map(|row| reservation_from_row(&row))
            .transpose()
    }

    async fn reservation_list(&self) -> SiriusResult<Vec<Reservation>> {
        let conn = self.conn("reservation_list").await?;
        let rows = conn
            .query(
                "SELECT id, user_id, restaurant_id, date_reserv, guest_count, comment, status \
                 FROM sirius.reservation ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| pg_error("reservation_list", e))?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservation_list_for_user(&self, user_id: UserId) -> SiriusResult<Vec<Reservation>> {
        let conn = self.conn("reservation_list_for_user").await?;
        let rows = conn
            .query(
                "SELECT id, user_id, restaurant_id, date_reserv, guest_count, comment, status \
                 FROM sirius.reservation WHERE user_id = $1 ORDER BY id",
                &[&user_id.get()],
            )
            .await
            .map_err(|e| pg_error("reservation_list_for_user", e))?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservation_create(
        &self,
        user_id: UserId,
        reservation: NewReservation,
    ) -> SiriusResult<Reservation> {
        let mut conn = self.conn("reservation_create").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("reservation_create", e))?;

        if !restaurant_exists(&*tx, reservation.restaurant_id).await? {
            return Err(StorageError::ReferenceNotFound {
                kind: EntityKind::Restaurant,
                id: reservation.restaurant_id.get(),
            }
            .into());
        }

        let row = tx
            .query_one(
                "INSERT INTO sirius.reservation \
                     (user_id, restaurant_id, date_reserv, guest_count, comment) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, user_id, restaurant_id, date_reserv, guest_count, comment, status",
                &[
                    &user_id.get(),
                    &reservation.restaurant_id.get(),
                    &reservation.date_reserv,
                    &reservation.guest_count,
                    &reservation.comment,
                ],
            )
            .await
            .map_err(|e| {
                // The restaurant is locked above, so only the owner can be missing.
                if is_foreign_key_violation(&e) {
                    StorageError::ReferenceNotFound {
                        kind: EntityKind::User,
                        id: user_id.get(),
                    }
                    .into()
                } else {
                    pg_error("reservation_create", e)
                }
            })?;
        let created = reservation_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| pg_error("reservation_create", e))?;
        Ok(created)
    }

    async fn reservation_update(
        &self,
        id: ReservationId,
        patch: ReservationPatch,
    ) -> SiriusResult<Option<Reservation>> {
        let mut conn = self.conn("reservation_update").await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| pg_error("reservation_update", e))?;

        let Some(row) = tx
            .query_opt(
                "SELECT id, user_id, restaurant_id, date_reserv, guest_count, comment, status \
                 FROM sirius.reservation WHERE id = $1 FOR UPDATE",
                &[&id.get()],
            )
            .await
            .map_err(|e| pg_error("reservation_update", e))?
        else {
            return Ok(None);
        };
        let current = reservation_from_row(&row)?;
        let next = patch.apply(&current);

        if next.restaurant_id != current.restaurant_id
            && !restaurant_exists(&*tx, next.restaurant_id).await?
        {
            return Err(StorageError::ReferenceNotFound {
                kind: EntityKind::Restaurant,
                id: next.restaurant_id.get(),
            }
            .into());
        }

        let row = tx
            .query_one(
                "UPDATE sirius.reservation \
                 SET restaurant_id = $2, date_reserv = $3, guest_count = $4, \
                     comment = $5, status = $6 \
                 WHERE id = $1 \
                 RETURNING id, user_id, restaurant_id, date_reserv, guest_count, comment, status",
                &[
                    &id.get(),
                    &next.restaurant_id.get(),
                    &next.date_reserv,
                    &next.guest_count,
                    &next.comment,
                    &next.status,
                ],
            )
            .await
            .map_err(|e| pg_error("reservation_update", e))?;
        let updated = reservation_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| pg_error("reservation_update", e))?;
        Ok(Some(updated))
    }

    async fn reservation_delete(&self, id: ReservationId) -> SiriusResult<Option<Reservation>> {
        let conn = self.conn("reservation_delete").await?;
        conn.query_opt(
            "DELETE FROM sirius.reservation WHERE id = $1 \
             RETURNING id, user_id, restaurant_id, date_reserv, guest_count, comment, status",
            &[&id.get()],
        )
        .await
        .map_err(|e| pg_error("reservation_delete", e))?
        .map(|row| reservation_from_row(&row))
        .transpose()
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    async fn user_get(&self, id: UserId) -> SiriusResult<Option<User>> {
        let conn = self.conn("user_get").await?;
        conn.query_opt(
            "SELECT id, username FROM sirius.\"user\" WHERE id = $1",
            &[&id.get()],
        )
        .await
        .map_err(|e| pg_error("user_get", e))?
        .map(|row| user_from_row(&row))
        .transpose()
    }

    async fn user_update(&self, id: UserId, patch: UserPatch) -> SiriusResult<Option<User>> {
        let Some(username) = patch.username else {
            return self.user_get(id).await;
        };
        let conn = self.conn("user_update").await?;
        conn.query_opt(
            "UPDATE sirius.\"user\" SET username = $2 WHERE id = $1 RETURNING id, username",
            &[&id.get(), &username],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SiriusError::invalid("username", "already taken")
            } else {
                pg_error("user_update", e)
            }
        })?
        .map(|row| user_from_row(&row))
        .transpose()
    }

    async fn user_delete(&self, id: UserId) -> SiriusResult<Option<User>> {
        let conn = self.conn("user_delete").await?;
        // Reservations cascade.
        conn.query_opt(
            "DELETE FROM sirius.\"user\" WHERE id = $1 RETURNING id, username",
            &[&id.get()],
        )
        .await
        .map_err(|e| pg_error("user_delete", e))?
        .map(|row| user_from_row(&row))
        .transpose()
    }

    async fn ping(&self) -> SiriusResult<()> {
        let conn = self.conn("ping").await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| pg_error("ping", e))
    }
}

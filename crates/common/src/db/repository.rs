//! PostgreSQL-backed license store
//!
//! The activation commit is one transaction: a conditional
//! `UPDATE ... SET current_uses = current_uses + 1 WHERE current_uses <
//! max_uses` followed by the log insert. Zero affected rows means another
//! activation got the last slot first.

use crate::db::models::*;
use crate::db::store::{
    ActivationContext, ConsumeOutcome, DailyActivations, FleetCounts, LicenseStore, LicenseUpdate,
    NewLicense,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::keys::generate_key;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Schema, Set, SqlErr, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Repository for license data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Create the tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        let conn = self.write_conn();
        let backend = conn.get_database_backend();
        let schema = Schema::new(backend);

        let mut licenses = schema.create_table_from_entity(LicenseEntity);
        licenses.if_not_exists();
        conn.execute(backend.build(&licenses)).await?;

        let mut activation_log = schema.create_table_from_entity(ActivationLogEntity);
        activation_log.if_not_exists();
        conn.execute(backend.build(&activation_log)).await?;

        for mut index in schema.create_index_from_entity(ActivationLogEntity) {
            index.if_not_exists();
            conn.execute(backend.build(&index)).await?;
        }

        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl LicenseStore for Repository {
    // ========================================================================
    // License Operations
    // ========================================================================

    async fn create(&self, license: NewLicense) -> Result<License> {
        let key = generate_key();

        let model = LicenseActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(key.clone()),
            description: Set(license.description),
            supplier: Set(license.supplier),
            cost: Set(license.cost),
            activated_on: Set(None),
            expiry_date: Set(license.expiry_date),
            max_uses: Set(license.max_uses),
            current_uses: Set(0),
            created_at: Set(Utc::now().into()),
        };

        model
            .insert(self.write_conn())
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateKey { key },
                _ => AppError::Database(err),
            })
    }

    /// Reads the primary: a key issued a moment ago must be activatable.
    async fn find_by_key(&self, key: &str) -> Result<Option<License>> {
        LicenseEntity::find()
            .filter(LicenseColumn::Key.eq(key))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<License>> {
        LicenseEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn list(&self) -> Result<Vec<License>> {
        LicenseEntity::find()
            .order_by_desc(LicenseColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update(&self, id: Uuid, update: LicenseUpdate) -> Result<Option<License>> {
        let Some(existing) = LicenseEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        // Only changed columns are written, so a concurrent increment of
        // current_uses is never overwritten with a stale value.
        let mut license: LicenseActiveModel = existing.into();
        license.description = Set(update.description);
        license.expiry_date = Set(update.expiry_date);
        license.max_uses = Set(update.max_uses);

        let updated = license.update(self.write_conn()).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = LicenseEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Activation
    // ========================================================================

    async fn try_consume(
        &self,
        key: &str,
        context: &ActivationContext,
        at: NaiveDateTime,
    ) -> Result<ConsumeOutcome> {
        let txn = self.write_conn().begin().await?;

        let result = LicenseEntity::update_many()
            .col_expr(
                LicenseColumn::CurrentUses,
                Expr::col(LicenseColumn::CurrentUses).add(1),
            )
            .filter(LicenseColumn::Key.eq(key))
            .filter(Expr::col(LicenseColumn::CurrentUses).lt(Expr::col(LicenseColumn::MaxUses)))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(ConsumeOutcome::Exhausted);
        }

        // The row stays locked by our UPDATE until commit.
        let license = LicenseEntity::find()
            .filter(LicenseColumn::Key.eq(key))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: format!("license {} vanished inside its own transaction", key),
            })?;

        let entry = ActivationLogActiveModel {
            license_key: Set(key.to_owned()),
            activated_at: Set(at),
            device_name: Set(context.device_name.clone()),
            browser: Set(context.browser.clone()),
            ..Default::default()
        };
        entry.insert(&txn).await?;

        txn.commit().await?;

        Ok(ConsumeOutcome::Consumed {
            max_uses: license.max_uses,
            current_uses: license.current_uses,
        })
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    async fn fleet_counts(&self, today: NaiveDate, horizon: NaiveDate) -> Result<FleetCounts> {
        let conn = self.read_conn();

        let total = LicenseEntity::find().count(conn).await?;

        let active = LicenseEntity::find()
            .filter(LicenseColumn::ExpiryDate.gte(today))
            .filter(Expr::col(LicenseColumn::CurrentUses).lt(Expr::col(LicenseColumn::MaxUses)))
            .count(conn)
            .await?;

        let expiring_soon = LicenseEntity::find()
            .filter(LicenseColumn::ExpiryDate.between(today, horizon))
            .count(conn)
            .await?;

        let stmt = Statement::from_string(
            DbBackend::Postgres,
            "SELECT COALESCE(SUM(current_uses), 0)::BIGINT FROM licenses",
        );
        let total_ever_activated = match conn.query_one(stmt).await? {
            Some(row) => row.try_get_by_index::<i64>(0)?.max(0) as u64,
            None => 0,
        };

        Ok(FleetCounts {
            total,
            active,
            total_ever_activated,
            expiring_soon,
        })
    }

    async fn count_activations(&self, since: Option<NaiveDateTime>) -> Result<u64> {
        let mut query = ActivationLogEntity::find();
        if let Some(since) = since {
            query = query.filter(ActivationLogColumn::ActivatedAt.gte(since));
        }

        query.count(self.read_conn()).await.map_err(Into::into)
    }

    async fn activations_by_day(&self, since: NaiveDateTime) -> Result<Vec<DailyActivations>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT CAST(activated_at AS DATE) AS day, COUNT(*) AS activations
            FROM activation_log
            WHERE activated_at >= $1
            GROUP BY day
            ORDER BY day
            "#,
            vec![since.into()],
        );

        self.read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .map(|row| -> Result<DailyActivations> {
                Ok(DailyActivations {
                    day: row.try_get_by_index::<NaiveDate>(0)?,
                    count: row.try_get_by_index::<i64>(1)?.max(0) as u64,
                })
            })
            .collect()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await
    }
}

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    OptionalExtension, RunQueryDsl, delete,
    dsl::{exists, sql},
    expression::BoxableExpression,
    insert_into,
    pg::Pg,
    prelude::*,
    select,
    sql_types::{BigInt, Bool},
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{
            InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
        },
        repositories::subscriptions::{RepositoryError, RepositoryResult, SubscriptionRepository},
        value_objects::{
            month_window::MonthWindow,
            subscriptions::{Pagination, SpendFilter},
        },
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

type SubscriptionPredicate = Box<dyn BoxableExpression<subscriptions::table, Pg, SqlType = Bool>>;

/// Matches the row only while it is still at `version`.
fn current_revision(subscription_id: Uuid, version: i32) -> SubscriptionPredicate {
    Box::new(
        subscriptions::id
            .eq(subscription_id)
            .and(subscriptions::version.eq(version)),
    )
}

/// SQL form of `MonthWindow::includes`.
fn overlaps_window(window: &MonthWindow) -> SubscriptionPredicate {
    let window_start: DateTime<Utc> = window.start().into();
    let window_end: DateTime<Utc> = window.end().into();

    Box::new(
        subscriptions::end_date
            .is_not_null()
            .and(subscriptions::start_date.le(window_end))
            .and(subscriptions::end_date.assume_not_null().ge(window_start))
            .or(subscriptions::end_date
                .is_null()
                .and(subscriptions::start_date.between(window_start, window_end))),
    )
}

fn spend_query(spend_filter: SpendFilter) -> subscriptions::BoxedQuery<'static, Pg, BigInt> {
    let mut query = subscriptions::table
        .select(sql::<BigInt>("CAST(COALESCE(SUM(price), 0) AS BIGINT)"))
        .filter(overlaps_window(&spend_filter.window))
        .into_boxed();

    if let Some(user_id) = spend_filter.user_id {
        query = query.filter(subscriptions::user_id.eq(user_id));
    }
    if let Some(service) = spend_filter.service {
        query = query.filter(subscriptions::service.eq(service));
    }

    query
}

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> RepositoryResult<Uuid> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("create: failed to acquire connection")?;

        let result = insert_into(subscriptions::table)
            .values(&insert_subscription_entity)
            .returning(subscriptions::id)
            .get_result::<Uuid>(&mut conn)
            .with_context(|| {
                format!(
                    "create: failed to insert subscription {}",
                    insert_subscription_entity.id
                )
            })?;

        Ok(result)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> RepositoryResult<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("find_by_id: failed to acquire connection")?;

        subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()
            .with_context(|| format!("find_by_id: failed to load subscription {subscription_id}"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(
        &self,
        subscription_entity: SubscriptionEntity,
    ) -> RepositoryResult<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("update: failed to acquire connection")?;
        let subscription_id = subscription_entity.id;
        let changes = UpdateSubscriptionEntity::next_revision_of(&subscription_entity, Utc::now());

        let updated = update(subscriptions::table)
            .filter(current_revision(subscription_id, subscription_entity.version))
            .set(&changes)
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()
            .with_context(|| format!("update: failed to update subscription {subscription_id}"))?;

        if let Some(updated) = updated {
            return Ok(updated);
        }

        // Zero rows: either the row is gone or another writer bumped the version.
        let still_exists = select(exists(
            subscriptions::table.filter(subscriptions::id.eq(subscription_id)),
        ))
        .get_result::<bool>(&mut conn)
        .with_context(|| format!("update: failed to check existence of subscription {subscription_id}"))?;

        if still_exists {
            Err(RepositoryError::Conflict)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn delete(&self, subscription_id: Uuid) -> RepositoryResult<()> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("delete: failed to acquire connection")?;

        let affected = delete(subscriptions::table.filter(subscriptions::id.eq(subscription_id)))
            .execute(&mut conn)
            .with_context(|| format!("delete: failed to delete subscription {subscription_id}"))?;

        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("list_by_user: failed to acquire connection")?;

        let results = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order((
                subscriptions::start_date.desc(),
                subscriptions::created_at.desc(),
                subscriptions::id.desc(),
            ))
            .offset(pagination.offset)
            .limit(pagination.limit)
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)
            .with_context(|| format!("list_by_user: failed to list subscriptions of {user_id}"))?;

        Ok(results)
    }

    async fn sum_price_over_window(&self, spend_filter: SpendFilter) -> RepositoryResult<i64> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .context("sum_price_over_window: failed to acquire connection")?;

        let total = spend_query(spend_filter)
            .get_result::<i64>(&mut conn)
            .context("sum_price_over_window: failed to aggregate prices")?;

        Ok(total)
    }
}

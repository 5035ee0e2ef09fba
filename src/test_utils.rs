use std::{collections::HashMap, sync::Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{
        InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
    },
    repositories::subscriptions::{RepositoryError, RepositoryResult, SubscriptionRepository},
    value_objects::subscriptions::{Pagination, SpendFilter},
};

/// Process-local stand-in for `SubscriptionPostgres` with the same
/// not-found, conflict and ordering behaviour.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: Mutex<HashMap<Uuid, SubscriptionEntity>>,
}

impl InMemorySubscriptionRepository {
    fn rows(&self) -> RepositoryResult<std::sync::MutexGuard<'_, HashMap<Uuid, SubscriptionEntity>>> {
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Storage(anyhow!("in-memory store poisoned")))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> RepositoryResult<Uuid> {
        let mut rows = self.rows()?;
        let id = insert_subscription_entity.id;
        if rows.contains_key(&id) {
            return Err(RepositoryError::Storage(anyhow!("duplicate key {id}")));
        }

        let now = Utc::now();
        rows.insert(
            id,
            SubscriptionEntity {
                id,
                service: insert_subscription_entity.service,
                price: insert_subscription_entity.price,
                user_id: insert_subscription_entity.user_id,
                start_date: insert_subscription_entity.start_date,
                end_date: insert_subscription_entity.end_date,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> RepositoryResult<SubscriptionEntity> {
        self.rows()?
            .get(&subscription_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(
        &self,
        subscription_entity: SubscriptionEntity,
    ) -> RepositoryResult<SubscriptionEntity> {
        let mut rows = self.rows()?;
        let stored = rows
            .get_mut(&subscription_entity.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != subscription_entity.version {
            return Err(RepositoryError::Conflict);
        }

        let changes = UpdateSubscriptionEntity::next_revision_of(&subscription_entity, Utc::now());
        stored.service = changes.service;
        stored.price = changes.price;
        stored.start_date = changes.start_date;
        stored.end_date = changes.end_date;
        stored.version = changes.version;
        stored.updated_at = changes.updated_at;
        Ok(stored.clone())
    }

    async fn delete(&self, subscription_id: Uuid) -> RepositoryResult<()> {
        self.rows()?
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<SubscriptionEntity>> {
        let mut owned: Vec<SubscriptionEntity> = self
            .rows()?
            .values()
            .filter(|subscription| subscription.user_id == user_id)
            .cloned()
            .collect();

        owned.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });

        Ok(owned
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect())
    }

    async fn sum_price_over_window(&self, spend_filter: SpendFilter) -> RepositoryResult<i64> {
        Ok(self
            .rows()?
            .values()
            .filter(|subscription| spend_filter.matches(subscription))
            .map(|subscription| subscription.price)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{
        month_anchor::parse_month_anchor, month_window::MonthWindow,
    };

    fn insert(user_id: Uuid, start: &str, end: Option<&str>, price: i64) -> InsertSubscriptionEntity {
        InsertSubscriptionEntity {
            id: Uuid::new_v4(),
            service: "X".to_string(),
            price,
            user_id,
            start_date: parse_month_anchor(start).unwrap().into(),
            end_date: end.map(|end| parse_month_anchor(end).unwrap().into()),
        }
    }

    #[tokio::test]
    async fn sum_over_empty_store_is_zero() {
        let repository = InMemorySubscriptionRepository::default();
        let window = MonthWindow::new(
            parse_month_anchor("01-2024").unwrap(),
            parse_month_anchor("12-2024").unwrap(),
        )
        .unwrap();

        let total = repository
            .sum_price_over_window(SpendFilter::new(window, None, None))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let repository = InMemorySubscriptionRepository::default();
        let id = repository
            .create(insert(Uuid::new_v4(), "01-2024", None, 10))
            .await
            .unwrap();

        let read = repository.find_by_id(id).await.unwrap();
        let first = repository
            .update(SubscriptionEntity {
                price: 20,
                ..read.clone()
            })
            .await
            .unwrap();
        assert_eq!(first.version, 2);

        let second = repository
            .update(SubscriptionEntity { price: 30, ..read })
            .await;
        assert!(matches!(second, Err(RepositoryError::Conflict)));
        assert_eq!(repository.find_by_id(id).await.unwrap().price, 20);
    }

    #[tokio::test]
    async fn list_never_exceeds_limit() {
        let repository = InMemorySubscriptionRepository::default();
        let user_id = Uuid::new_v4();
        for month in 1..=12 {
            repository
                .create(insert(user_id, &format!("{month:02}-2024"), None, 1))
                .await
                .unwrap();
        }

        let page = repository
            .list_by_user(user_id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.len(), 10);
        assert!(page.windows(2).all(|w| w[0].start_date >= w[1].start_date));
    }
}

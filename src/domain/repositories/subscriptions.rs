use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    value_objects::subscriptions::{Pagination, SpendFilter},
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("subscription not found")]
    NotFound,
    #[error("subscription version is stale")]
    Conflict,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn create(&self, insert_subscription_entity: InsertSubscriptionEntity)
    -> RepositoryResult<Uuid>;

    async fn find_by_id(&self, subscription_id: Uuid) -> RepositoryResult<SubscriptionEntity>;

    /// Replaces the row only if its stored version still equals
    /// `subscription_entity.version`.
    async fn update(
        &self,
        subscription_entity: SubscriptionEntity,
    ) -> RepositoryResult<SubscriptionEntity>;

    async fn delete(&self, subscription_id: Uuid) -> RepositoryResult<()>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<SubscriptionEntity>>;

    async fn sum_price_over_window(&self, spend_filter: SpendFilter) -> RepositoryResult<i64>;
}

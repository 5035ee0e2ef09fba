use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    repositories::subscriptions::{RepositoryError, SubscriptionRepository},
    value_objects::subscriptions::{
        InsertSubscriptionModel, Pagination, PatchSubscriptionModel, SpendFilter,
        SubscriptionModel, ValidationError, apply_patch, validate_create,
    },
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("SUBSCRIPTION WITH PROVIDED UUID DOESN'T EXIST")]
    NotFound,
    #[error("SUBSCRIPTION WAS MODIFIED CONCURRENTLY")]
    Conflict,
    #[error("INTERNAL SERVER ERROR")]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::Validation(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Conflict => StatusCode::CONFLICT,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for SubscriptionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => SubscriptionError::NotFound,
            RepositoryError::Conflict => SubscriptionError::Conflict,
            RepositoryError::Storage(source) => SubscriptionError::Internal(source),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

fn rejected(operation: &'static str, err: ValidationError) -> SubscriptionError {
    let err = SubscriptionError::from(err);
    info!(
        operation,
        status = err.status_code().as_u16(),
        reason = %err,
        "subscriptions: request rejected"
    );
    err
}

fn repository_failure(
    operation: &'static str,
    subscription_id: Option<Uuid>,
    err: RepositoryError,
) -> SubscriptionError {
    match &err {
        RepositoryError::NotFound => {
            info!(operation, sub_id = ?subscription_id, "subscriptions: subscription not found");
        }
        RepositoryError::Conflict => {
            warn!(operation, sub_id = ?subscription_id, "subscriptions: stale version on update");
        }
        RepositoryError::Storage(source) => {
            error!(
                operation,
                sub_id = ?subscription_id,
                db_error = ?source,
                "subscriptions: storage failure"
            );
        }
    }
    SubscriptionError::from(err)
}

pub struct SubscriptionUseCase<T>
where
    T: SubscriptionRepository + Send + Sync,
{
    subscription_repository: Arc<T>,
}

impl<T> SubscriptionUseCase<T>
where
    T: SubscriptionRepository + Send + Sync,
{
    pub fn new(subscription_repository: Arc<T>) -> Self {
        Self {
            subscription_repository,
        }
    }

    pub async fn create(
        &self,
        insert_subscription_model: InsertSubscriptionModel,
    ) -> UseCaseResult<Uuid> {
        let insert_subscription_entity = validate_create(insert_subscription_model)
            .map_err(|err| rejected("create", err))?;
        let subscription_id = insert_subscription_entity.id;
        let user_id = insert_subscription_entity.user_id;

        let created_id = self
            .subscription_repository
            .create(insert_subscription_entity)
            .await
            .map_err(|err| repository_failure("create", Some(subscription_id), err))?;

        info!(sub_id = %created_id, %user_id, "subscriptions: subscription created");
        Ok(created_id)
    }

    pub async fn get(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionModel> {
        let subscription = self
            .subscription_repository
            .find_by_id(subscription_id)
            .await
            .map_err(|err| repository_failure("get", Some(subscription_id), err))?;

        Ok(SubscriptionModel::from(subscription))
    }

    /// Read-merge-write guarded by the row version. A concurrent writer that
    /// got there first turns this call into [`SubscriptionError::Conflict`].
    pub async fn patch(
        &self,
        subscription_id: Uuid,
        patch_subscription_model: PatchSubscriptionModel,
    ) -> UseCaseResult<SubscriptionModel> {
        if patch_subscription_model.is_empty() {
            return Err(rejected("patch", ValidationError::EmptyInput));
        }

        let existing = self
            .subscription_repository
            .find_by_id(subscription_id)
            .await
            .map_err(|err| repository_failure("patch", Some(subscription_id), err))?;

        let merged = apply_patch(&existing, &patch_subscription_model)
            .map_err(|err| rejected("patch", err))?;

        let updated = self
            .subscription_repository
            .update(merged)
            .await
            .map_err(|err| repository_failure("patch", Some(subscription_id), err))?;

        info!(
            sub_id = %subscription_id,
            version = updated.version,
            "subscriptions: subscription patched"
        );
        Ok(SubscriptionModel::from(updated))
    }

    pub async fn delete(&self, subscription_id: Uuid) -> UseCaseResult<()> {
        self.subscription_repository
            .delete(subscription_id)
            .await
            .map_err(|err| repository_failure("delete", Some(subscription_id), err))?;

        info!(sub_id = %subscription_id, "subscriptions: subscription deleted");
        Ok(())
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> UseCaseResult<Vec<SubscriptionModel>> {
        let subscriptions = self
            .subscription_repository
            .list_by_user(user_id, pagination)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to list user subscriptions");
                SubscriptionError::from(err)
            })?;

        let count = subscriptions.len();
        info!(%user_id, count, "subscriptions: user subscriptions loaded");
        Ok(subscriptions
            .into_iter()
            .map(SubscriptionModel::from)
            .collect())
    }

    pub async fn total_spend(&self, spend_filter: SpendFilter) -> UseCaseResult<i64> {
        let window_start = spend_filter.window.start();
        let window_end = spend_filter.window.end();

        let total = self
            .subscription_repository
            .sum_price_over_window(spend_filter)
            .await
            .map_err(|err| {
                error!(
                    %window_start,
                    %window_end,
                    db_error = ?err,
                    "subscriptions: failed to total spend"
                );
                SubscriptionError::from(err)
            })?;

        info!(%window_start, %window_end, total, "subscriptions: spend totalled");
        Ok(total)
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::{
    application::usercases::subscriptions::{SubscriptionError, SubscriptionUseCase},
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::{
            CreateSubscriptionResponse, InsertSubscriptionModel, ListSubscriptionsQuery,
            MessageResponse, PatchSubscriptionModel, SpendQuery, SubscriptionModel,
            TotalSpendResponse, ValidationError, parse_subscription_id, parse_user_id,
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad, repositories::subscriptions::SubscriptionPostgres,
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(Arc::new(subscriptions_repository));

    router(Arc::new(subscriptions_usecase))
}

pub fn router<T>(subscriptions_usecase: Arc<SubscriptionUseCase<T>>) -> Router
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/subscriptions", post(create::<T>))
        .route("/subscriptions/sum", get(total_spend::<T>))
        .route(
            "/subscriptions/:sub_id",
            get(get_by_id::<T>).patch(patch::<T>).delete(remove::<T>),
        )
        .route("/users/:user_id/subscriptions", get(list_by_user::<T>))
        .with_state(subscriptions_usecase)
}

// Extractor rejections are folded into `ValidationError` so every 400 carries
// the JSON error body.
fn path_param(
    path: Result<Path<String>, PathRejection>,
    invalid: ValidationError,
) -> Result<String, ValidationError> {
    path.map(|Path(raw)| raw).map_err(|rejection| {
        info!(reason = %rejection.body_text(), "subscriptions: path rejected");
        invalid
    })
}

fn query_params<Q>(
    query: Result<Query<Q>, QueryRejection>,
    invalid: ValidationError,
) -> Result<Q, ValidationError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        info!(reason = %rejection.body_text(), "subscriptions: query rejected");
        invalid
    })
}

// Decoded by hand so an empty body and malformed JSON map onto stable messages.
fn decode_body<M>(body: &[u8]) -> Result<M, ValidationError>
where
    M: DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::EmptyInput);
    }
    serde_json::from_slice(body).map_err(|_| ValidationError::InvalidBody)
}

pub async fn create<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    body: Bytes,
) -> Result<Json<CreateSubscriptionResponse>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    info!("subscriptions: create request received");
    let insert_subscription_model = decode_body::<InsertSubscriptionModel>(&body)?;
    let subscription_id = subscriptions_usecase
        .create(insert_subscription_model)
        .await?;

    Ok(Json(CreateSubscriptionResponse { subscription_id }))
}

pub async fn get_by_id<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    sub_id: Result<Path<String>, PathRejection>,
) -> Result<Json<SubscriptionModel>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    let sub_id = path_param(sub_id, ValidationError::InvalidSubscriptionId)?;
    let subscription_id = parse_subscription_id(&sub_id)?;
    info!(sub_id = %subscription_id, "subscriptions: get request received");

    let subscription = subscriptions_usecase.get(subscription_id).await?;
    Ok(Json(subscription))
}

pub async fn patch<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    sub_id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Json<SubscriptionModel>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    let sub_id = path_param(sub_id, ValidationError::InvalidSubscriptionId)?;
    let subscription_id = parse_subscription_id(&sub_id)?;
    info!(sub_id = %subscription_id, "subscriptions: patch request received");

    let patch_subscription_model = decode_body::<PatchSubscriptionModel>(&body)?;
    let subscription = subscriptions_usecase
        .patch(subscription_id, patch_subscription_model)
        .await?;

    Ok(Json(subscription))
}

pub async fn remove<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    sub_id: Result<Path<String>, PathRejection>,
) -> Result<Json<MessageResponse>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    let sub_id = path_param(sub_id, ValidationError::InvalidSubscriptionId)?;
    let subscription_id = parse_subscription_id(&sub_id)?;
    info!(sub_id = %subscription_id, "subscriptions: delete request received");

    subscriptions_usecase.delete(subscription_id).await?;
    Ok(Json(MessageResponse {
        message: "SUBSCRIPTION DELETED".to_string(),
    }))
}

pub async fn list_by_user<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    user_id: Result<Path<String>, PathRejection>,
    query: Result<Query<ListSubscriptionsQuery>, QueryRejection>,
) -> Result<Json<Vec<SubscriptionModel>>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    let user_id = parse_user_id(&path_param(user_id, ValidationError::InvalidUserId)?)?;
    let pagination =
        query_params(query, ValidationError::InvalidPagination)?.into_pagination()?;
    info!(
        %user_id,
        offset = pagination.offset,
        limit = pagination.limit,
        "subscriptions: list request received"
    );

    let subscriptions = subscriptions_usecase
        .list_by_user(user_id, pagination)
        .await?;
    Ok(Json(subscriptions))
}

pub async fn total_spend<T>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<T>>>,
    query: Result<Query<SpendQuery>, QueryRejection>,
) -> Result<Json<TotalSpendResponse>, SubscriptionError>
where
    T: SubscriptionRepository + Send + Sync,
{
    info!("subscriptions: total spend request received");
    let spend_filter = query_params(query, ValidationError::InvalidQuery)?.into_filter()?;
    let total_sum = subscriptions_usecase.total_spend(spend_filter).await?;

    Ok(Json(TotalSpendResponse { total_sum }))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};
use crate::domain::value_objects::{
    month_anchor::{MonthAnchor, parse_month_anchor},
    month_window::MonthWindow,
};

pub const DEFAULT_LIST_OFFSET: i64 = 0;
pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Rejections of client input. The display strings are part of the HTTP
/// contract and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("SUBSCRIPTION UUID IS INVALID")]
    InvalidSubscriptionId,
    #[error("USER UUID IS INVALID")]
    InvalidUserId,
    #[error("START DATE IS INVALID")]
    InvalidStartDate,
    #[error("END DATE IS INVALID")]
    InvalidEndDate,
    #[error("START DATE MUST BE BEFORE OR EQUAL TO END DATE")]
    InvalidInterval,
    #[error("BODY IS EMPTY")]
    EmptyInput,
    #[error("BODY IS INVALID")]
    InvalidBody,
    #[error("SERVICE NAME IS EMPTY")]
    EmptyServiceName,
    #[error("PRICE MUST BE NON-NEGATIVE")]
    NegativePrice,
    #[error("PAGINATION PARAMETERS ARE INVALID")]
    InvalidPagination,
    #[error("QUERY PARAMETERS ARE INVALID")]
    InvalidQuery,
    #[error("PARAMETER {0} IS REQUIRED")]
    MissingParameter(&'static str),
}

pub fn parse_subscription_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidSubscriptionId)
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidUserId)
}

pub fn mint_subscription_id() -> Uuid {
    Uuid::new_v4()
}

fn parse_start_date(raw: &str) -> Result<MonthAnchor, ValidationError> {
    parse_month_anchor(raw).map_err(|_| ValidationError::InvalidStartDate)
}

/// `None` and `""` both mean the subscription is open-ended.
fn parse_end_date(raw: Option<&str>) -> Result<Option<MonthAnchor>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_month_anchor(raw)
            .map(Some)
            .map_err(|_| ValidationError::InvalidEndDate),
    }
}

fn ensure_interval(
    start_date: MonthAnchor,
    end_date: Option<MonthAnchor>,
) -> Result<(), ValidationError> {
    match end_date {
        Some(end_date) if start_date > end_date => Err(ValidationError::InvalidInterval),
        _ => Ok(()),
    }
}

// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsertSubscriptionModel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "service_name", default)]
    pub service: String,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Only `price`, `start_date` and `end_date` are mutable; any other key makes
/// the body invalid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSubscriptionModel {
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub end_date: Option<Option<String>>,
}

impl PatchSubscriptionModel {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }
}

/// Builds a row ready for insertion from untrusted create input.
///
/// A client-supplied `id` is kept; otherwise a fresh one is minted here and
/// never reassigned afterwards.
pub fn validate_create(
    insert_subscription_model: InsertSubscriptionModel,
) -> Result<InsertSubscriptionEntity, ValidationError> {
    let id = match insert_subscription_model
        .id
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
    {
        Some(raw) => parse_subscription_id(raw)?,
        None => mint_subscription_id(),
    };

    let service = insert_subscription_model.service.trim();
    if service.is_empty() {
        return Err(ValidationError::EmptyServiceName);
    }

    let price = insert_subscription_model
        .price
        .ok_or(ValidationError::MissingParameter("price"))?;
    if price < 0 {
        return Err(ValidationError::NegativePrice);
    }

    let user_id = parse_user_id(&insert_subscription_model.user_id)?;
    let start_date = parse_start_date(&insert_subscription_model.start_date)?;
    let end_date = parse_end_date(insert_subscription_model.end_date.as_deref())?;
    ensure_interval(start_date, end_date)?;

    Ok(InsertSubscriptionEntity {
        id,
        service: service.to_string(),
        price,
        user_id,
        start_date: start_date.into(),
        end_date: end_date.map(Into::into),
    })
}

/// Merges `patch` into a copy of `existing`. The interval invariant is checked
/// once, against the merged result.
pub fn apply_patch(
    existing: &SubscriptionEntity,
    patch: &PatchSubscriptionModel,
) -> Result<SubscriptionEntity, ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let mut merged = existing.clone();

    if let Some(price) = patch.price {
        if price < 0 {
            return Err(ValidationError::NegativePrice);
        }
        merged.price = price;
    }

    if let Some(raw) = patch.start_date.as_deref() {
        merged.start_date = parse_start_date(raw)?.into();
    }

    if let Some(end_date) = patch.end_date.as_ref() {
        merged.end_date = parse_end_date(end_date.as_deref())?.map(Into::into);
    }

    ensure_interval(
        MonthAnchor::from_datetime(merged.start_date),
        merged.end_date.map(MonthAnchor::from_datetime),
    )?;

    Ok(merged)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionModel {
    pub id: Uuid,
    #[serde(rename = "service_name")]
    pub service: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: MonthAnchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<MonthAnchor>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for SubscriptionModel {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            service: value.service,
            price: value.price,
            user_id: value.user_id,
            start_date: MonthAnchor::from_datetime(value.start_date),
            end_date: value.end_date.map(MonthAnchor::from_datetime),
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: DEFAULT_LIST_OFFSET,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(offset: i64, limit: i64) -> Result<Self, ValidationError> {
        if offset < 0 || limit <= 0 || limit > MAX_LIST_LIMIT {
            return Err(ValidationError::InvalidPagination);
        }
        Ok(Self { offset, limit })
    }
}

/// Raw `?offset=&limit=` query. Values stay strings so malformed numbers map to
/// [`ValidationError::InvalidPagination`] rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl ListSubscriptionsQuery {
    pub fn into_pagination(self) -> Result<Pagination, ValidationError> {
        fn number(raw: Option<String>, default: i64) -> Result<i64, ValidationError> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(default),
                Some(raw) => raw
                    .parse()
                    .map_err(|_| ValidationError::InvalidPagination),
            }
        }

        Pagination::new(
            number(self.offset, DEFAULT_LIST_OFFSET)?,
            number(self.limit, DEFAULT_LIST_LIMIT)?,
        )
    }
}

/// Which subscriptions take part in a spend total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendFilter {
    pub window: MonthWindow,
    pub user_id: Option<Uuid>,
    pub service: Option<String>,
}

impl SpendFilter {
    pub fn new(window: MonthWindow, user_id: Option<Uuid>, service: Option<String>) -> Self {
        let service = service
            .map(|service| service.trim().to_string())
            .filter(|service| !service.is_empty());

        Self {
            window,
            user_id,
            service,
        }
    }

    pub fn matches(&self, subscription: &SubscriptionEntity) -> bool {
        if self
            .user_id
            .is_some_and(|user_id| user_id != subscription.user_id)
        {
            return false;
        }
        if self
            .service
            .as_deref()
            .is_some_and(|service| service != subscription.service)
        {
            return false;
        }

        self.window.includes(
            MonthAnchor::from_datetime(subscription.start_date),
            subscription.end_date.map(MonthAnchor::from_datetime),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub user_id: Option<String>,
    pub service: Option<String>,
}

impl SpendQuery {
    pub fn into_filter(self) -> Result<SpendFilter, ValidationError> {
        let start = self
            .start
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(ValidationError::MissingParameter("start"))?;
        let end = self
            .end
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(ValidationError::MissingParameter("end"))?;

        let start = parse_start_date(&start)?;
        let end = parse_month_anchor(&end).map_err(|_| ValidationError::InvalidEndDate)?;
        let window = MonthWindow::new(start, end)?;

        let user_id = match self.user_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_user_id(raw)?),
        };

        Ok(SpendFilter::new(window, user_id, self.service))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubscriptionResponse {
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalSpendResponse {
    pub total_sum: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

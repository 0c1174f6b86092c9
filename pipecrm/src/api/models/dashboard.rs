use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::pipeline::DealResponse;
use crate::db::models::deals::Deal;

/// How many of the summarized deals are listed individually
pub const RECENT_DEALS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub total_deals: usize,
    /// Sum of deal values; deals without a value count as zero
    #[schema(value_type = String)]
    pub total_value: Decimal,
    pub recent_deals: Vec<DealResponse>,
}

impl DashboardResponse {
    /// Summarize deals ordered most recently updated first
    pub fn summarize(deals: Vec<Deal>) -> Self {
        let total_deals = deals.len();
        let total_value = deals.iter().filter_map(|d| d.value).sum();
        let recent_deals = deals.into_iter().take(RECENT_DEALS).map(Into::into).collect();

        Self {
            total_deals,
            total_value,
            recent_deals,
        }
    }
}

use super::catalog::{CatalogItem, ItemKind};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 优化目标；time/quality 目前与 cost 排序相同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeFor {
    #[default]
    Cost,
    Time,
    Quality,
}

/// 替代候选项
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub item: CatalogItem,
    pub price: BigDecimal,
    pub reason: String,
    pub confidence: BigDecimal,
}

/// 待写入的替代方案
#[derive(Debug, Clone)]
pub struct NewSubstitution {
    pub estimate_id: i64,
    pub line_item_id: i64,
    pub kind: ItemKind,
    pub original_item_id: i64,
    pub alternative_item_id: i64,
    pub original_price: BigDecimal,
    pub alternative_price: BigDecimal,
    pub reason: String,
    pub confidence_score: BigDecimal,
}

impl NewSubstitution {
    /// 节省金额 = 原价 - 替代价 (可为负)
    pub fn cost_savings(&self) -> BigDecimal {
        &self.original_price - &self.alternative_price
    }
}

/// 估算单替代方案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub id: i64,
    pub estimate_id: i64,
    pub line_item_id: i64,
    pub kind: ItemKind,
    pub original_item_id: i64,
    pub alternative_item_id: i64,
    pub original_price: BigDecimal,
    pub alternative_price: BigDecimal,
    pub cost_savings: BigDecimal,
    pub reason: String,
    pub confidence_score: BigDecimal,
    pub is_applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Substitution {
    pub fn from_new(id: i64, new: NewSubstitution, created_at: DateTime<Utc>) -> Self {
        let cost_savings = new.cost_savings();
        Self {
            id,
            estimate_id: new.estimate_id,
            line_item_id: new.line_item_id,
            kind: new.kind,
            original_item_id: new.original_item_id,
            alternative_item_id: new.alternative_item_id,
            original_price: new.original_price,
            alternative_price: new.alternative_price,
            cost_savings,
            reason: new.reason,
            confidence_score: new.confidence_score,
            is_applied: false,
            applied_at: None,
            created_at,
        }
    }
}

/// 优化结果
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub estimate_id: i64,
    pub original_cost: BigDecimal,
    pub potential_savings: BigDecimal,
    pub optimized_cost: BigDecimal,
    pub substitutions: Vec<Substitution>,
}

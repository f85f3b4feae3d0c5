use super::catalog::ItemRef;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 价格记录 (爬取得到的供应商报价)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: i64,
    pub item: ItemRef,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub price: BigDecimal,
    pub rental_price_daily: Option<BigDecimal>,
    pub rental_price_weekly: Option<BigDecimal>,
    pub location: String,
    pub in_stock: bool,
    pub is_active: bool,
    pub captured_at: DateTime<Utc>,
}

impl PriceRecord {
    /// 按费率类型取价格字段，字段缺失时返回 None
    pub fn rate(&self, kind: RateKind) -> Option<&BigDecimal> {
        match kind {
            RateKind::Daily => self.rental_price_daily.as_ref(),
            RateKind::Weekly => self.rental_price_weekly.as_ref(),
            RateKind::Purchase => Some(&self.price),
        }
    }
}

/// 价格字段选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Daily,
    Weekly,
    #[default]
    Purchase,
}

/// 每日价格统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    pub date: NaiveDate,
    pub avg_price: BigDecimal,
    pub min_price: BigDecimal,
    pub max_price: BigDecimal,
    pub data_points: usize,
}

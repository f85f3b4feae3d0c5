//! 数据库行结构与领域模型之间的转换

use crate::error::{EstimateError, Result};
use crate::models::{
    CatalogItem, Estimate, ItemKind, ItemRef, LineItem, LineKind, MachineryLine, MaterialLine,
    PriceRecord, Substitution,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct CatalogItemRow {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub sku: String,
    pub category_id: i64,
    pub category_name: String,
    pub unit: String,
    pub is_active: bool,
}

impl TryFrom<CatalogItemRow> for CatalogItem {
    type Error = EstimateError;

    fn try_from(row: CatalogItemRow) -> Result<Self> {
        Ok(CatalogItem {
            id: row.id,
            kind: row.kind.parse()?,
            name: row.name,
            sku: row.sku,
            category_id: row.category_id,
            category_name: row.category_name,
            unit: row.unit,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PriceRecordRow {
    pub id: i64,
    pub material_id: Option<i64>,
    pub machinery_id: Option<i64>,
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

impl TryFrom<PriceRecordRow> for PriceRecord {
    type Error = EstimateError;

    fn try_from(row: PriceRecordRow) -> Result<Self> {
        let item = match (row.material_id, row.machinery_id) {
            (Some(id), None) => ItemRef::material(id),
            (None, Some(id)) => ItemRef::machinery(id),
            _ => {
                return Err(EstimateError::Data(format!(
                    "price record {} must reference exactly one catalog item",
                    row.id
                )))
            }
        };
        Ok(PriceRecord {
            id: row.id,
            item,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            price: row.price,
            rental_price_daily: row.rental_price_daily,
            rental_price_weekly: row.rental_price_weekly,
            location: row.location,
            in_stock: row.in_stock,
            is_active: row.is_active,
            captured_at: row.captured_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EstimateRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub materials_cost: BigDecimal,
    pub labor_cost: BigDecimal,
    pub machinery_cost: BigDecimal,
    pub overhead_cost: BigDecimal,
    pub subtotal: BigDecimal,
    pub vat_rate: BigDecimal,
    pub vat_amount: BigDecimal,
    pub total_cost: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EstimateRow {
    pub fn into_estimate(self, lines: Vec<LineItem>) -> Result<Estimate> {
        Ok(Estimate {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            status: self.status.parse()?,
            materials_cost: self.materials_cost,
            labor_cost: self.labor_cost,
            machinery_cost: self.machinery_cost,
            overhead_cost: self.overhead_cost,
            subtotal: self.subtotal,
            vat_rate: self.vat_rate,
            vat_amount: self.vat_amount,
            total_cost: self.total_cost,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 明细行；机械的时长存放在 quantity 列
#[derive(Debug, Clone, FromRow)]
pub struct LineRow {
    pub id: i64,
    pub estimate_id: i64,
    pub kind: String,
    pub item_id: i64,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub waste_factor: Option<BigDecimal>,
    pub rental_type: Option<String>,
    pub transport_cost: Option<BigDecimal>,
    pub setup_cost: Option<BigDecimal>,
    pub total_cost: BigDecimal,
    pub supplier: String,
    pub supplier_location: String,
    pub notes: String,
}

impl TryFrom<LineRow> for LineItem {
    type Error = EstimateError;

    fn try_from(row: LineRow) -> Result<Self> {
        let detail = match row.kind.parse::<ItemKind>()? {
            ItemKind::Material => LineKind::Material(MaterialLine {
                material_id: row.item_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
                waste_factor: row.waste_factor.unwrap_or_else(BigDecimal::zero),
                supplier: row.supplier,
                supplier_location: row.supplier_location,
                notes: row.notes,
            }),
            ItemKind::Machinery => {
                let rental_type = row
                    .rental_type
                    .as_deref()
                    .ok_or_else(|| EstimateError::Data(format!("machinery line {} has no rental type", row.id)))?
                    .parse()?;
                LineKind::Machinery(MachineryLine {
                    machinery_id: row.item_id,
                    rental_type,
                    duration: row.quantity,
                    unit_price: row.unit_price,
                    transport_cost: row.transport_cost.unwrap_or_else(BigDecimal::zero),
                    setup_cost: row.setup_cost.unwrap_or_else(BigDecimal::zero),
                    supplier: row.supplier,
                    supplier_location: row.supplier_location,
                    notes: row.notes,
                })
            }
        };
        Ok(LineItem {
            id: Some(row.id),
            estimate_id: row.estimate_id,
            detail,
            total_cost: row.total_cost,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SubstitutionRow {
    pub id: i64,
    pub estimate_id: i64,
    pub line_item_id: i64,
    pub kind: String,
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

impl TryFrom<SubstitutionRow> for Substitution {
    type Error = EstimateError;

    fn try_from(row: SubstitutionRow) -> Result<Self> {
        Ok(Substitution {
            id: row.id,
            estimate_id: row.estimate_id,
            line_item_id: row.line_item_id,
            kind: row.kind.parse()?,
            original_item_id: row.original_item_id,
            alternative_item_id: row.alternative_item_id,
            original_price: row.original_price,
            alternative_price: row.alternative_price,
            cost_savings: row.cost_savings,
            reason: row.reason,
            confidence_score: row.confidence_score,
            is_applied: row.is_applied,
            applied_at: row.applied_at,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RentalType;
    use std::str::FromStr;

    fn line_row(kind: &str, rental_type: Option<&str>) -> LineRow {
        LineRow {
            id: 5,
            estimate_id: 2,
            kind: kind.to_string(),
            item_id: 101,
            quantity: BigDecimal::from(3),
            unit_price: BigDecimal::from_str("180.00").unwrap(),
            waste_factor: None,
            rental_type: rental_type.map(str::to_string),
            transport_cost: Some(BigDecimal::from(40)),
            setup_cost: None,
            total_cost: BigDecimal::from_str("580.00").unwrap(),
            supplier: String::new(),
            supplier_location: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_machinery_row_maps_duration_and_defaults() {
        let line = LineItem::try_from(line_row("machinery", Some("weekly"))).unwrap();
        match line.detail {
            LineKind::Machinery(m) => {
                assert_eq!(m.rental_type, RentalType::Weekly);
                assert_eq!(m.duration, BigDecimal::from(3));
                assert_eq!(m.setup_cost, BigDecimal::zero());
            }
            other => panic!("unexpected line {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        assert!(matches!(
            LineItem::try_from(line_row("machinery", None)),
            Err(EstimateError::Data(_))
        ));
        assert!(matches!(
            LineItem::try_from(line_row("tool", None)),
            Err(EstimateError::Data(_))
        ));
    }
}

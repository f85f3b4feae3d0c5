use super::catalog::{ItemKind, ItemRef};
use super::pricing::RateKind;
use crate::error::EstimateError;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 估算单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Pending => "pending",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for EstimateStatus {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EstimateStatus::Draft),
            "pending" => Ok(EstimateStatus::Pending),
            "approved" => Ok(EstimateStatus::Approved),
            "rejected" => Ok(EstimateStatus::Rejected),
            other => Err(EstimateError::Data(format!("unknown estimate status '{}'", other))),
        }
    }
}

/// 机械租赁方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalType {
    Daily,
    Weekly,
    Monthly,
    Purchase,
}

impl RentalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalType::Daily => "daily",
            RentalType::Weekly => "weekly",
            RentalType::Monthly => "monthly",
            RentalType::Purchase => "purchase",
        }
    }

    /// 对应的市场价字段；按月租赁没有市场价
    pub fn rate_kind(&self) -> Option<RateKind> {
        match self {
            RentalType::Daily => Some(RateKind::Daily),
            RentalType::Weekly => Some(RateKind::Weekly),
            RentalType::Monthly => None,
            RentalType::Purchase => Some(RateKind::Purchase),
        }
    }
}

impl FromStr for RentalType {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(RentalType::Daily),
            "weekly" => Ok(RentalType::Weekly),
            "monthly" => Ok(RentalType::Monthly),
            "purchase" => Ok(RentalType::Purchase),
            other => Err(EstimateError::Data(format!("unknown rental type '{}'", other))),
        }
    }
}

/// 材料明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub material_id: i64,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub waste_factor: BigDecimal,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub supplier_location: String,
    #[serde(default)]
    pub notes: String,
}

/// 机械明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineryLine {
    pub machinery_id: i64,
    pub rental_type: RentalType,
    pub duration: BigDecimal,
    pub unit_price: BigDecimal,
    pub transport_cost: BigDecimal,
    pub setup_cost: BigDecimal,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub supplier_location: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineKind {
    Material(MaterialLine),
    Machinery(MachineryLine),
}

impl LineKind {
    pub fn item(&self) -> ItemRef {
        match self {
            LineKind::Material(m) => ItemRef::material(m.material_id),
            LineKind::Machinery(m) => ItemRef::machinery(m.machinery_id),
        }
    }

    pub fn unit_price(&self) -> &BigDecimal {
        match self {
            LineKind::Material(m) => &m.unit_price,
            LineKind::Machinery(m) => &m.unit_price,
        }
    }

    /// 替换目录项与单价 (应用替代方案)
    pub fn swap_item(&mut self, item_id: i64, unit_price: BigDecimal) {
        match self {
            LineKind::Material(m) => {
                m.material_id = item_id;
                m.unit_price = unit_price;
            }
            LineKind::Machinery(m) => {
                m.machinery_id = item_id;
                m.unit_price = unit_price;
            }
        }
    }
}

/// 估算明细行；id 为空表示尚未持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Option<i64>,
    pub estimate_id: i64,
    #[serde(flatten)]
    pub detail: LineKind,
    pub total_cost: BigDecimal,
}

impl LineItem {
    pub fn new(estimate_id: i64, detail: LineKind) -> Self {
        Self {
            id: None,
            estimate_id,
            detail,
            total_cost: BigDecimal::zero(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.detail.item().kind
    }
}

/// 估算单 (聚合根)，拥有明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub status: EstimateStatus,
    pub materials_cost: BigDecimal,
    pub labor_cost: BigDecimal,
    pub machinery_cost: BigDecimal,
    pub overhead_cost: BigDecimal,
    pub subtotal: BigDecimal,
    pub vat_rate: BigDecimal,
    pub vat_amount: BigDecimal,
    pub total_cost: BigDecimal,
    pub lines: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Estimate {
    /// 新建草稿，金额全部为零，待聚合
    pub fn draft(project_id: i64, name: impl Into<String>, vat_rate: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            name: name.into(),
            description: String::new(),
            status: EstimateStatus::Draft,
            materials_cost: BigDecimal::zero(),
            labor_cost: BigDecimal::zero(),
            machinery_cost: BigDecimal::zero(),
            overhead_cost: BigDecimal::zero(),
            subtotal: BigDecimal::zero(),
            vat_rate,
            vat_amount: BigDecimal::zero(),
            total_cost: BigDecimal::zero(),
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line(&self, line_id: i64) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.id == Some(line_id))
    }

    pub fn line_mut(&mut self, line_id: i64) -> Option<&mut LineItem> {
        self.lines.iter_mut().find(|l| l.id == Some(line_id))
    }

    pub fn contains_item(&self, item: ItemRef) -> bool {
        self.lines.iter().any(|l| l.detail.item() == item)
    }

    /// 按类别取明细，保持存储顺序
    pub fn lines_of(&self, kind: ItemKind) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().filter(move |l| l.kind() == kind)
    }
}

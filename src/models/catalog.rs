use crate::error::EstimateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 目录项类别: 材料 / 机械
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Material,
    Machinery,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Material => "material",
            ItemKind::Machinery => "machinery",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "material" | "materials" => Ok(ItemKind::Material),
            "machinery" => Ok(ItemKind::Machinery),
            other => Err(EstimateError::Data(format!("unknown item kind '{}'", other))),
        }
    }
}

/// 目录项引用 (类别 + ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemRef {
    pub fn material(id: i64) -> Self {
        Self { kind: ItemKind::Material, id }
    }

    pub fn machinery(id: i64) -> Self {
        Self { kind: ItemKind::Machinery, id }
    }
}

/// 材料/机械目录项，对估算逻辑只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: ItemKind,
    pub name: String,
    pub sku: String,
    pub category_id: i64,
    pub category_name: String,
    pub unit: String,
    pub is_active: bool,
}

impl CatalogItem {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef { kind: self.kind, id: self.id }
    }
}

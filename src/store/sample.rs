use super::MemoryStore;
use crate::models::{CatalogItem, ItemKind, ItemRef, PriceRecord};
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use std::str::FromStr;

const SUPPLIERS: &[&str] = &["Travis Perkins", "Wickes", "Jewson", "Buildbase"];
const LOCATIONS: &[&str] = &["London", "Manchester", "Birmingham", "Leeds"];

// (名称, 类别ID, 类别名, 单位, SKU, 基准价)
const MATERIALS: &[(&str, i64, &str, &str, &str, &str)] = &[
    ("Portland Cement", 1, "Cement & Aggregates", "bag", "CEM001", "6.50"),
    ("Sharp Sand", 1, "Cement & Aggregates", "tonne", "SND001", "45.00"),
    ("Building Sand", 1, "Cement & Aggregates", "tonne", "SND002", "42.00"),
    ("Red Facing Brick", 2, "Bricks & Blocks", "piece", "BRK001", "0.45"),
    ("Concrete Block 100mm", 2, "Bricks & Blocks", "piece", "BLK001", "1.20"),
    ("Engineering Brick Class B", 2, "Bricks & Blocks", "piece", "BRK002", "0.55"),
    ("Plywood 18mm", 3, "Timber & Sheet Materials", "sheet", "PLY001", "28.00"),
    ("OSB Board 11mm", 3, "Timber & Sheet Materials", "sheet", "OSB001", "12.00"),
];

// (名称, 类别ID, 类别名, SKU, 购置价, 日租, 周租)
const MACHINERY: &[(&str, i64, &str, &str, &str, &str, &str)] = &[
    ("Mini Excavator 1.5t", 101, "Excavators", "EXC001", "25000.00", "180.00", "650.00"),
    ("Midi Excavator 5t", 101, "Excavators", "EXC002", "52000.00", "260.00", "940.00"),
    ("Micro Excavator 0.8t", 101, "Excavators", "EXC003", "14500.00", "120.00", "430.00"),
    ("Site Dumper 1t", 102, "Dumpers", "DMP001", "9800.00", "85.00", "290.00"),
    ("Tracked Dumper 0.5t", 102, "Dumpers", "DMP002", "7200.00", "70.00", "240.00"),
];

fn money(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap_or_default()
}

/// 示例目录与价格 (每个目录项在各地区各一条报价)
pub fn seed(store: &MemoryStore) {
    let now = Utc::now();
    let mut next_id = 0i64;

    for (name, category_id, category_name, unit, sku, base) in MATERIALS {
        next_id += 1;
        store.add_catalog_item(CatalogItem {
            id: next_id,
            kind: ItemKind::Material,
            name: name.to_string(),
            sku: sku.to_string(),
            category_id: *category_id,
            category_name: category_name.to_string(),
            unit: unit.to_string(),
            is_active: true,
        });

        for (idx, location) in LOCATIONS.iter().enumerate() {
            // 各地区在基准价上浮 0%/5%/10%/15%
            let uplift = BigDecimal::new((100 + 5 * idx as i64).into(), 2);
            store.add_price(PriceRecord {
                id: 0,
                item: ItemRef::material(next_id),
                supplier_id: (idx % SUPPLIERS.len()) as i64 + 1,
                supplier_name: SUPPLIERS[idx % SUPPLIERS.len()].to_string(),
                price: crate::service::costing::round_money(&(money(base) * uplift)),
                rental_price_daily: None,
                rental_price_weekly: None,
                location: location.to_string(),
                in_stock: true,
                is_active: true,
                captured_at: now - Duration::hours(idx as i64),
            });
        }
    }

    for (idx, (name, category_id, category_name, sku, purchase, daily, weekly)) in MACHINERY.iter().enumerate() {
        let id = 100 + idx as i64 + 1;
        store.add_catalog_item(CatalogItem {
            id,
            kind: ItemKind::Machinery,
            name: name.to_string(),
            sku: sku.to_string(),
            category_id: *category_id,
            category_name: category_name.to_string(),
            unit: "unit".to_string(),
            is_active: true,
        });

        for (loc_idx, location) in LOCATIONS.iter().enumerate() {
            store.add_price(PriceRecord {
                id: 0,
                item: ItemRef::machinery(id),
                supplier_id: (loc_idx % SUPPLIERS.len()) as i64 + 1,
                supplier_name: SUPPLIERS[loc_idx % SUPPLIERS.len()].to_string(),
                price: money(purchase),
                rental_price_daily: Some(money(daily)),
                rental_price_weekly: Some(money(weekly)),
                location: location.to_string(),
                in_stock: loc_idx % 2 == 0,
                is_active: true,
                captured_at: now - Duration::hours(loc_idx as i64),
            });
        }
    }

    tracing::info!("Seeded memory store with {} catalog items", store.catalog_len());
}

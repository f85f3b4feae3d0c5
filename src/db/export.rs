use crate::error::{EstimateError, Result};
use crate::models::{Estimate, ItemRef, LineKind};
use std::collections::HashMap;

const HEADER: [&str; 9] = [
    "line_id",
    "kind",
    "item",
    "quantity",
    "unit_price",
    "adjustment",
    "extra_costs",
    "supplier",
    "total_cost",
];

fn write_estimate<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    estimate: &Estimate,
    names: &HashMap<ItemRef, String>,
) -> Result<()> {
    writer.write_record(HEADER)?;

    for line in &estimate.lines {
        let item = line.detail.item();
        let name = names
            .get(&item)
            .cloned()
            .unwrap_or_else(|| format!("{} {}", item.kind, item.id));
        let line_id = line.id.map(|id| id.to_string()).unwrap_or_default();

        let (quantity, adjustment, extra, supplier) = match &line.detail {
            LineKind::Material(m) => (
                m.quantity.to_string(),
                format!("waste {}", m.waste_factor),
                String::new(),
                m.supplier.clone(),
            ),
            LineKind::Machinery(m) => (
                m.duration.to_string(),
                m.rental_type.as_str().to_string(),
                (&m.transport_cost + &m.setup_cost).to_string(),
                m.supplier.clone(),
            ),
        };

        writer.write_record([
            line_id,
            item.kind.to_string(),
            name,
            quantity,
            line.detail.unit_price().to_string(),
            adjustment,
            extra,
            supplier,
            line.total_cost.to_string(),
        ])?;
    }

    // 汇总行
    let totals = [
        ("materials_cost", &estimate.materials_cost),
        ("machinery_cost", &estimate.machinery_cost),
        ("labor_cost", &estimate.labor_cost),
        ("overhead_cost", &estimate.overhead_cost),
        ("subtotal", &estimate.subtotal),
        ("vat_amount", &estimate.vat_amount),
        ("total_cost", &estimate.total_cost),
    ];
    for (label, amount) in totals {
        let amount = amount.to_string();
        writer.write_record(["", "", label, "", "", "", "", "", amount.as_str()])?;
    }

    writer
        .flush()
        .map_err(|e| EstimateError::Export(e.to_string()))?;
    Ok(())
}

/// 估算明细导出为 CSV 文本
pub fn estimate_to_csv(estimate: &Estimate, names: &HashMap<ItemRef, String>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_estimate(&mut writer, estimate, names)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| EstimateError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| EstimateError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, MaterialLine};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn test_csv_has_every_line_and_totals() {
        let mut estimate = Estimate::draft(1, "Porch", BigDecimal::from_str("0.2").unwrap());
        for id in [4, 9] {
            let mut line = LineItem::new(
                1,
                LineKind::Material(MaterialLine {
                    material_id: id,
                    quantity: BigDecimal::from(2),
                    unit_price: BigDecimal::from(3),
                    waste_factor: BigDecimal::from(0),
                    supplier: "Wickes".to_string(),
                    supplier_location: String::new(),
                    notes: String::new(),
                }),
            );
            line.id = Some(id * 10);
            estimate.lines.push(line);
        }
        let mut names = HashMap::new();
        names.insert(ItemRef::material(4), "Red Facing Brick".to_string());

        let csv_text = estimate_to_csv(&estimate, &names).unwrap();
        let rows: Vec<&str> = csv_text.lines().collect();
        assert_eq!(rows.len(), 1 + 2 + 7);
        assert!(rows[1].starts_with("40,material,Red Facing Brick,2,3"));
        assert!(rows[2].contains("material 9"));
        assert!(rows.last().unwrap().contains("total_cost"));
    }
}

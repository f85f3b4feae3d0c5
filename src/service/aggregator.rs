use super::costing::{ensure_amount, line_total, round_money, RATE, TOTAL};
use crate::error::Result;
use crate::models::{Estimate, ItemKind};
use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;

/// 重新聚合估算单
///
/// 每次写入前调用：逐行重算明细成本并舍入到分，材料/机械小计为已舍入明细之和，
/// 再加人工与管理费得到小计；只有增值税额另行舍入。
/// 任意一行计算失败则整体失败，不返回部分结果。
pub fn recalculate(mut estimate: Estimate) -> Result<Estimate> {
    ensure_amount("vat_rate", &estimate.vat_rate, RATE)?;
    ensure_amount("labor_cost", &estimate.labor_cost, TOTAL)?;
    ensure_amount("overhead_cost", &estimate.overhead_cost, TOTAL)?;

    let mut materials = BigDecimal::zero();
    let mut machinery = BigDecimal::zero();

    for line in estimate.lines.iter_mut() {
        let total = round_money(&line_total(&line.detail)?);
        ensure_amount("line total", &total, TOTAL)?;
        match line.kind() {
            ItemKind::Material => materials += &total,
            ItemKind::Machinery => machinery += &total,
        }
        line.total_cost = total;
    }

    estimate.materials_cost = materials.with_scale(2);
    estimate.machinery_cost = machinery.with_scale(2);
    estimate.labor_cost = round_money(&estimate.labor_cost);
    estimate.overhead_cost = round_money(&estimate.overhead_cost);

    let subtotal = &estimate.materials_cost
        + &estimate.labor_cost
        + &estimate.machinery_cost
        + &estimate.overhead_cost;
    let vat_amount = round_money(&(&subtotal * &estimate.vat_rate));
    let total_cost = &subtotal + &vat_amount;
    ensure_amount("total_cost", &total_cost, TOTAL)?;

    estimate.subtotal = subtotal;
    estimate.vat_amount = vat_amount;
    estimate.total_cost = total_cost;
    estimate.updated_at = Utc::now();

    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EstimateError;
    use crate::models::{LineItem, LineKind, MachineryLine, MaterialLine, RentalType};
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn material(id: i64, quantity: &str, price: &str, waste: &str) -> LineItem {
        LineItem::new(
            1,
            LineKind::Material(MaterialLine {
                material_id: id,
                quantity: d(quantity),
                unit_price: d(price),
                waste_factor: d(waste),
                supplier: String::new(),
                supplier_location: String::new(),
                notes: String::new(),
            }),
        )
    }

    fn machinery(id: i64, duration: &str, price: &str) -> LineItem {
        LineItem::new(
            1,
            LineKind::Machinery(MachineryLine {
                machinery_id: id,
                rental_type: RentalType::Daily,
                duration: d(duration),
                unit_price: d(price),
                transport_cost: d("0"),
                setup_cost: d("0"),
                supplier: String::new(),
                supplier_location: String::new(),
                notes: String::new(),
            }),
        )
    }

    #[test]
    fn test_vat_rollup() {
        let mut estimate = Estimate::draft(1, "Extension", d("0.20"));
        estimate.lines.push(material(1, "20", "5.00", "0"));
        estimate.lines.push(machinery(2, "1", "25.00"));
        estimate.labor_cost = d("50.00");

        let estimate = recalculate(estimate).unwrap();
        assert_eq!(estimate.materials_cost, d("100.00"));
        assert_eq!(estimate.machinery_cost, d("25.00"));
        assert_eq!(estimate.subtotal, d("175.00"));
        assert_eq!(estimate.vat_amount, d("35.00"));
        assert_eq!(estimate.total_cost, d("210.00"));
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut estimate = Estimate::draft(1, "Garage", d("0.175"));
        estimate.lines.push(material(1, "3", "0.33", "0.1"));
        estimate.lines.push(machinery(2, "2.5", "89.99"));
        estimate.overhead_cost = d("12.34");

        let first = recalculate(estimate).unwrap();
        let second = recalculate(first.clone()).unwrap();
        assert_eq!(first.subtotal, second.subtotal);
        assert_eq!(first.vat_amount, second.vat_amount);
        assert_eq!(first.total_cost, second.total_cost);
    }

    #[test]
    fn test_total_matches_single_rounding() {
        let mut estimate = Estimate::draft(1, "Loft", d("0.2"));
        estimate.lines.push(material(1, "7.3", "1.15", "0.07"));
        estimate.labor_cost = d("33.33");

        let estimate = recalculate(estimate).unwrap();
        let expected = round_money(&(&estimate.subtotal + &estimate.subtotal * &estimate.vat_rate));
        assert_eq!(estimate.total_cost, expected);
    }

    #[test]
    fn test_invalid_line_aborts_recalculation() {
        let mut estimate = Estimate::draft(1, "Patio", d("0.2"));
        estimate.lines.push(material(1, "10", "5.00", "0"));
        estimate.lines.push(material(2, "-1", "5.00", "0"));

        assert!(matches!(recalculate(estimate), Err(EstimateError::Validation(_))));
    }

    #[test]
    fn test_line_totals_are_refreshed() {
        let mut estimate = Estimate::draft(1, "Shed", d("0"));
        let mut line = material(1, "10", "5.00", "0.10");
        line.total_cost = d("999");
        estimate.lines.push(line);

        let estimate = recalculate(estimate).unwrap();
        assert_eq!(estimate.lines[0].total_cost, d("55.00"));
        assert_eq!(estimate.total_cost, d("55.00"));
    }

    #[test]
    fn test_category_sums_match_stored_line_totals() {
        let mut estimate = Estimate::draft(1, "Hallway", d("0.2"));
        estimate.lines.push(material(1, "1", "0.01", "0.5"));
        estimate.lines.push(material(2, "1", "0.01", "0.5"));
        estimate.lines.push(machinery(3, "0.5", "0.05"));

        let estimate = recalculate(estimate).unwrap();
        let stored: BigDecimal = estimate
            .lines
            .iter()
            .filter(|l| l.kind() == ItemKind::Material)
            .fold(BigDecimal::zero(), |acc, l| acc + &l.total_cost);
        assert_eq!(estimate.lines[0].total_cost, d("0.02"));
        assert_eq!(stored, d("0.04"));
        assert_eq!(estimate.materials_cost, stored);
        assert_eq!(estimate.machinery_cost, estimate.lines[2].total_cost);
    }

    #[test]
    fn test_rates_and_costs_beyond_column_precision_are_rejected() {
        let estimate = Estimate::draft(1, "Porch", d("10"));
        assert!(matches!(recalculate(estimate), Err(EstimateError::Validation(_))));

        let estimate = Estimate::draft(1, "Porch", d("0.12345"));
        assert!(matches!(recalculate(estimate), Err(EstimateError::Validation(_))));

        let mut estimate = Estimate::draft(1, "Porch", d("0.2"));
        estimate.labor_cost = d("10.005");
        assert!(matches!(recalculate(estimate), Err(EstimateError::Validation(_))));
    }
}

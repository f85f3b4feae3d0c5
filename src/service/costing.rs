use crate::error::{EstimateError, Result};
use crate::models::{LineKind, MachineryLine, MaterialLine};
use bigdecimal::{BigDecimal, One, Zero};

/// 金额保留两位小数 (四舍五入)
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

/// 数值精度：小数位与整数位上限，与表结构中的 NUMERIC 列一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub scale: i64,
    pub int_digits: i64,
}

/// 数量、单价、附加费用 NUMERIC(10,2)
pub const AMOUNT: Precision = Precision { scale: 2, int_digits: 8 };
/// 损耗率、增值税率 NUMERIC(5,4)
pub const RATE: Precision = Precision { scale: 4, int_digits: 1 };
/// 明细与估算单金额 NUMERIC(12,2)
pub const TOTAL: Precision = Precision { scale: 2, int_digits: 10 };

/// 非负，且小数位与量级都在列精度内
pub fn ensure_amount(field: &str, value: &BigDecimal, precision: Precision) -> Result<()> {
    if *value < BigDecimal::zero() {
        return Err(EstimateError::validation(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    if value.with_scale(precision.scale) != *value {
        return Err(EstimateError::validation(format!(
            "{} allows at most {} decimal places, got {}",
            field, precision.scale, value
        )));
    }
    if *value >= BigDecimal::new(1.into(), -precision.int_digits) {
        return Err(EstimateError::validation(format!(
            "{} must be below 1e{}, got {}",
            field, precision.int_digits, value
        )));
    }
    Ok(())
}

/// 材料成本 = 数量 × (1 + 损耗率) × 单价
pub fn material_total(
    quantity: &BigDecimal,
    unit_price: &BigDecimal,
    waste_factor: &BigDecimal,
) -> Result<BigDecimal> {
    ensure_amount("quantity", quantity, AMOUNT)?;
    ensure_amount("unit_price", unit_price, AMOUNT)?;
    ensure_amount("waste_factor", waste_factor, RATE)?;

    let adjusted_quantity = quantity * (BigDecimal::one() + waste_factor);
    Ok(adjusted_quantity * unit_price)
}

/// 机械成本 = 时长 × 单价 + 运输费 + 安装费
pub fn machinery_total(
    duration: &BigDecimal,
    unit_price: &BigDecimal,
    transport_cost: &BigDecimal,
    setup_cost: &BigDecimal,
) -> Result<BigDecimal> {
    ensure_amount("duration", duration, AMOUNT)?;
    ensure_amount("unit_price", unit_price, AMOUNT)?;
    ensure_amount("transport_cost", transport_cost, AMOUNT)?;
    ensure_amount("setup_cost", setup_cost, AMOUNT)?;

    Ok(duration * unit_price + transport_cost + setup_cost)
}

/// 单行成本，未舍入
pub fn line_total(line: &LineKind) -> Result<BigDecimal> {
    match line {
        LineKind::Material(MaterialLine {
            quantity,
            unit_price,
            waste_factor,
            ..
        }) => material_total(quantity, unit_price, waste_factor),
        LineKind::Machinery(MachineryLine {
            duration,
            unit_price,
            transport_cost,
            setup_cost,
            ..
        }) => machinery_total(duration, unit_price, transport_cost, setup_cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RentalType;
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_material_total_with_waste() {
        let total = material_total(&d("10"), &d("5.00"), &d("0.10")).unwrap();
        assert_eq!(total, d("55.00"));
    }

    #[test]
    fn test_material_total_is_exact_before_rounding() {
        let total = material_total(&d("3.33"), &d("0.33"), &d("0")).unwrap();
        assert_eq!(total, d("1.0989"));
        assert_eq!(round_money(&total), d("1.10"));
    }

    #[test]
    fn test_inputs_beyond_column_precision_are_rejected() {
        let err = material_total(&d("1.234"), &d("5.00"), &d("0")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        let err = material_total(&d("1"), &d("5.00"), &d("0.12345")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        let err = material_total(&d("1"), &d("100000000"), &d("0")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        let err = machinery_total(&d("1"), &d("5"), &d("0.001"), &d("0")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        // 尾随零不算多余小数位
        assert!(material_total(&d("1.500"), &d("99999999.99"), &d("0.1000")).is_ok());
        assert!(ensure_amount("vat_rate", &d("10"), RATE).is_err());
        assert!(ensure_amount("vat_rate", &d("9.9999"), RATE).is_ok());
    }

    #[test]
    fn test_machinery_total_adds_ancillary_costs() {
        let line = LineKind::Machinery(MachineryLine {
            machinery_id: 1,
            rental_type: RentalType::Daily,
            duration: d("3"),
            unit_price: d("120.00"),
            transport_cost: d("45.00"),
            setup_cost: d("15.50"),
            supplier: String::new(),
            supplier_location: String::new(),
            notes: String::new(),
        });
        assert_eq!(line_total(&line).unwrap(), d("420.50"));
    }

    #[test]
    fn test_negative_inputs_are_rejected() {
        let err = material_total(&d("-1"), &d("5"), &d("0")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        let err = material_total(&d("1"), &d("5"), &d("-0.1")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));

        let err = machinery_total(&d("1"), &d("5"), &d("0"), &d("-2")).unwrap_err();
        assert!(matches!(err, EstimateError::Validation(_)));
    }

    #[test]
    fn test_line_total_is_idempotent() {
        let line = LineKind::Material(MaterialLine {
            material_id: 7,
            quantity: d("12.5"),
            unit_price: d("3.99"),
            waste_factor: d("0.05"),
            supplier: String::new(),
            supplier_location: String::new(),
            notes: String::new(),
        });
        assert_eq!(line_total(&line).unwrap(), line_total(&line).unwrap());
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(&d("2.345")), d("2.35"));
        assert_eq!(round_money(&d("2.344")), d("2.34"));
        assert_eq!(round_money(&d("7")).to_string(), "7.00");
    }
}

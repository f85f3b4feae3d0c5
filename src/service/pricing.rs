use crate::models::{PriceHistoryPoint, PriceRecord, RateKind};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

fn matches_location(record: &PriceRecord, location: Option<&str>) -> bool {
    match location.map(str::trim).filter(|l| !l.is_empty()) {
        Some(loc) => record.location.to_lowercase().contains(&loc.to_lowercase()),
        None => true,
    }
}

/// 最新的有效价格记录 (按采集时间，时间相同取 id 较大者)
pub fn latest_record<'a>(records: &'a [PriceRecord], location: Option<&str>) -> Option<&'a PriceRecord> {
    records
        .iter()
        .filter(|r| r.is_active && matches_location(r, location))
        .max_by(|a, b| a.captured_at.cmp(&b.captured_at).then_with(|| a.id.cmp(&b.id)))
}

/// 当前市场价
///
/// 没有匹配记录，或最新记录缺少所选费率字段时返回 None；
/// None 表示没有市场数据，不能当作零价。
pub fn current_price(records: &[PriceRecord], location: Option<&str>, rate: RateKind) -> Option<BigDecimal> {
    latest_record(records, location).and_then(|r| r.rate(rate).cloned())
}

/// 指定地区是否有现货
pub fn is_available(records: &[PriceRecord], location: Option<&str>) -> bool {
    records
        .iter()
        .any(|r| r.is_active && r.in_stock && matches_location(r, location))
}

/// 按自然日汇总价格 (最新日期在前)
pub fn price_history(
    records: &[PriceRecord],
    location: Option<&str>,
    since: DateTime<Utc>,
) -> Vec<PriceHistoryPoint> {
    let mut window: Vec<&PriceRecord> = records
        .iter()
        .filter(|r| r.captured_at >= since && matches_location(r, location))
        .collect();
    window.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));

    let mut by_day: IndexMap<_, Vec<&BigDecimal>> = IndexMap::new();
    for record in window {
        by_day
            .entry(record.captured_at.date_naive())
            .or_default()
            .push(&record.price);
    }

    by_day
        .into_iter()
        .filter_map(|(date, prices)| {
            let min_price = prices.iter().min().map(|p| (*p).clone())?;
            let max_price = prices.iter().max().map(|p| (*p).clone())?;
            let sum = prices.iter().fold(BigDecimal::zero(), |acc, p| acc + *p);
            let avg_price = super::costing::round_money(&(sum / BigDecimal::from(prices.len() as i64)));
            Some(PriceHistoryPoint {
                date,
                avg_price,
                min_price,
                max_price,
                data_points: prices.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemRef;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn record(id: i64, price: &str, location: &str, hours_ago: i64) -> PriceRecord {
        let base = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        PriceRecord {
            id,
            item: ItemRef::material(1),
            supplier_id: 1,
            supplier_name: "Jewson".to_string(),
            price: d(price),
            rental_price_daily: None,
            rental_price_weekly: None,
            location: location.to_string(),
            in_stock: true,
            is_active: true,
            captured_at: base - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_latest_active_record_wins() {
        let mut stale = record(1, "9.00", "London", 1);
        stale.is_active = false;
        let records = vec![record(2, "8.00", "London", 5), stale, record(3, "7.50", "Leeds", 3)];

        assert_eq!(current_price(&records, None, RateKind::Purchase), Some(d("7.50")));
    }

    #[test]
    fn test_location_filter_is_case_insensitive_substring() {
        let records = vec![record(1, "8.00", "Greater London", 5), record(2, "7.50", "Leeds", 1)];

        assert_eq!(current_price(&records, Some("london"), RateKind::Purchase), Some(d("8.00")));
        assert_eq!(current_price(&records, Some("Glasgow"), RateKind::Purchase), None);
    }

    #[test]
    fn test_tie_broken_by_record_id() {
        let records = vec![record(4, "6.00", "London", 2), record(9, "6.50", "London", 2)];
        assert_eq!(current_price(&records, None, RateKind::Purchase), Some(d("6.50")));
    }

    #[test]
    fn test_missing_rental_field_returns_none() {
        let mut rec = record(1, "25000.00", "London", 1);
        rec.rental_price_daily = Some(d("180.00"));
        let records = vec![rec];

        assert_eq!(current_price(&records, None, RateKind::Daily), Some(d("180.00")));
        assert_eq!(current_price(&records, None, RateKind::Weekly), None);
        assert_eq!(current_price(&records, None, RateKind::Purchase), Some(d("25000.00")));
    }

    #[test]
    fn test_no_records_means_no_price() {
        assert_eq!(current_price(&[], None, RateKind::Purchase), None);
    }

    #[test]
    fn test_availability_requires_stock() {
        let mut out = record(1, "5.00", "Leeds", 1);
        out.in_stock = false;
        let records = vec![out, record(2, "5.00", "London", 1)];

        assert!(is_available(&records, Some("london")));
        assert!(!is_available(&records, Some("leeds")));
    }

    #[test]
    fn test_history_groups_by_day() {
        let records = vec![
            record(1, "10.00", "London", 0),
            record(2, "12.00", "London", 1),
            record(3, "11.00", "London", 30),
            record(4, "99.00", "London", 24 * 40),
        ];
        let since = Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap();

        let history = price_history(&records, None, since);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].data_points, 2);
        assert_eq!(history[0].avg_price, d("11.00"));
        assert_eq!(history[0].min_price, d("10.00"));
        assert_eq!(history[0].max_price, d("12.00"));
        assert_eq!(history[1].avg_price, d("11.00"));
    }
}

use crate::models::{Candidate, CatalogItem, ItemKind, OptimizeFor};
use bigdecimal::BigDecimal;

/// 每个明细默认保留的候选数
pub const DEFAULT_ALTERNATIVES_PER_ITEM: usize = 2;

fn confidence_for(kind: ItemKind) -> BigDecimal {
    match kind {
        ItemKind::Material => BigDecimal::new(8.into(), 1),
        ItemKind::Machinery => BigDecimal::new(7.into(), 1),
    }
}

fn reason_for(candidate: &CatalogItem) -> String {
    match candidate.kind {
        ItemKind::Material => format!(
            "Alternative {} with similar specifications",
            candidate.category_name
        ),
        ItemKind::Machinery => format!("Alternative {} with similar capacity", candidate.category_name),
    }
}

/// 同类替代项排序
///
/// `peers` 为同类别的目录项 (可含原项与停用项，此处过滤)；
/// `price_of` 返回候选项当前价，无价的候选项直接剔除。
/// 所有优化目标目前都按价格升序 (稳定排序)。
pub fn rank_alternatives<F>(
    item: &CatalogItem,
    peers: Vec<CatalogItem>,
    optimize_for: OptimizeFor,
    limit: usize,
    mut price_of: F,
) -> Vec<Candidate>
where
    F: FnMut(&CatalogItem) -> Option<BigDecimal>,
{
    let mut candidates: Vec<Candidate> = peers
        .into_iter()
        .filter(|c| {
            c.is_active && c.id != item.id && c.kind == item.kind && c.category_id == item.category_id
        })
        .filter_map(|c| {
            let price = price_of(&c)?;
            Some(Candidate {
                reason: reason_for(&c),
                confidence: confidence_for(c.kind),
                price,
                item: c,
            })
        })
        .collect();

    match optimize_for {
        OptimizeFor::Cost | OptimizeFor::Time | OptimizeFor::Quality => {
            candidates.sort_by(|a, b| a.price.cmp(&b.price));
        }
    }

    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn item(id: i64, category_id: i64, kind: ItemKind) -> CatalogItem {
        CatalogItem {
            id,
            kind,
            name: format!("Item {}", id),
            sku: format!("SKU{:03}", id),
            category_id,
            category_name: "Bricks & Blocks".to_string(),
            unit: "piece".to_string(),
            is_active: true,
        }
    }

    fn prices(pairs: &[(i64, &str)]) -> HashMap<i64, BigDecimal> {
        pairs.iter().map(|(id, p)| (*id, d(p))).collect()
    }

    #[test]
    fn test_cheapest_first() {
        let original = item(1, 10, ItemKind::Material);
        let peers = vec![original.clone(), item(2, 10, ItemKind::Material), item(3, 10, ItemKind::Material)];
        let table = prices(&[(1, "50.00"), (2, "40.00"), (3, "30.00")]);

        let ranked = rank_alternatives(&original, peers, OptimizeFor::Cost, 2, |c| table.get(&c.id).cloned());
        let ordered: Vec<_> = ranked.iter().map(|c| c.price.clone()).collect();
        assert_eq!(ordered, vec![d("30.00"), d("40.00")]);
    }

    #[test]
    fn test_excludes_original_unpriced_and_inactive() {
        let original = item(1, 10, ItemKind::Material);
        let mut inactive = item(4, 10, ItemKind::Material);
        inactive.is_active = false;
        let peers = vec![
            original.clone(),
            item(2, 10, ItemKind::Material),
            item(3, 10, ItemKind::Material),
            inactive,
            item(5, 11, ItemKind::Material),
        ];
        let table = prices(&[(1, "1.00"), (3, "2.00"), (4, "0.50"), (5, "0.10")]);

        let ranked = rank_alternatives(&original, peers, OptimizeFor::Cost, 10, |c| table.get(&c.id).cloned());
        let ids: Vec<_> = ranked.iter().map(|c| c.item.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_confidence_and_reason_by_kind() {
        let original = item(1, 20, ItemKind::Machinery);
        let peers = vec![item(2, 20, ItemKind::Machinery)];

        let ranked = rank_alternatives(&original, peers, OptimizeFor::Quality, 2, |_| Some(d("100")));
        assert_eq!(ranked[0].confidence, d("0.7"));
        assert!(ranked[0].reason.ends_with("similar capacity"));
        assert!(ranked[0].confidence <= BigDecimal::from(1));
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let original = item(1, 10, ItemKind::Material);
        let peers = (2..=6).map(|id| item(id, 10, ItemKind::Material)).collect();
        let table = prices(&[(2, "9"), (3, "3"), (4, "7"), (5, "1"), (6, "5")]);

        let ranked = rank_alternatives(&original, peers, OptimizeFor::Time, 3, |c| table.get(&c.id).cloned());
        let ids: Vec<_> = ranked.iter().map(|c| c.item.id).collect();
        assert_eq!(ids, vec![5, 3, 6]);
    }
}

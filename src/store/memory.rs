use super::EstimateStore;
use crate::error::{EstimateError, Result};
use crate::models::{CatalogItem, Estimate, ItemKind, ItemRef, NewSubstitution, PriceRecord, Substitution};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

/// 内存存储 (并发安全 HashMap)，用于测试与演示
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: DashMap<ItemRef, CatalogItem>,
    prices: DashMap<ItemRef, Vec<PriceRecord>>,
    estimates: DashMap<i64, Estimate>,
    substitutions: DashMap<i64, Substitution>,
    estimate_seq: AtomicI64,
    line_seq: AtomicI64,
    substitution_seq: AtomicI64,
    price_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_catalog_item(&self, item: CatalogItem) {
        self.catalog.insert(item.item_ref(), item);
    }

    /// 写入价格记录；id 为 0 时自动分配
    pub fn add_price(&self, mut record: PriceRecord) -> i64 {
        if record.id == 0 {
            record.id = self.price_seq.fetch_add(1, Ordering::SeqCst) + 1;
        }
        let id = record.id;
        self.prices.entry(record.item).or_default().push(record);
        id
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    fn next(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn assign_line_ids(&self, estimate: &mut Estimate) {
        for line in estimate.lines.iter_mut() {
            line.estimate_id = estimate.id;
            if line.id.is_none() {
                line.id = Some(Self::next(&self.line_seq));
            }
        }
        sort_lines(estimate);
    }

    fn write_back(&self, mut estimate: Estimate) -> Result<Estimate> {
        let Some(previous) = self.estimates.get(&estimate.id).map(|e| e.clone()) else {
            return Err(EstimateError::not_found("Estimate", estimate.id));
        };

        self.assign_line_ids(&mut estimate);
        estimate.created_at = previous.created_at;

        let kept: HashSet<i64> = estimate.lines.iter().filter_map(|l| l.id).collect();
        let removed: HashSet<i64> = previous
            .lines
            .iter()
            .filter_map(|l| l.id)
            .filter(|id| !kept.contains(id))
            .collect();
        if !removed.is_empty() {
            self.substitutions.retain(|_, s| !removed.contains(&s.line_item_id));
        }

        self.estimates.insert(estimate.id, estimate.clone());
        Ok(estimate)
    }
}

fn sort_lines(estimate: &mut Estimate) {
    estimate.lines.sort_by_key(|l| {
        let kind_rank = match l.kind() {
            ItemKind::Material => 0,
            ItemKind::Machinery => 1,
        };
        (kind_rank, l.id)
    });
}

#[async_trait]
impl EstimateStore for MemoryStore {
    async fn catalog_item(&self, item: ItemRef) -> Result<Option<CatalogItem>> {
        Ok(self.catalog.get(&item).map(|c| c.clone()))
    }

    async fn category_items(&self, kind: ItemKind, category_id: i64) -> Result<Vec<CatalogItem>> {
        let mut items: Vec<CatalogItem> = self
            .catalog
            .iter()
            .filter(|c| c.kind == kind && c.category_id == category_id)
            .map(|c| c.value().clone())
            .collect();
        items.sort_by_key(|c| c.id);
        Ok(items)
    }

    async fn active_prices(&self, item: ItemRef) -> Result<Vec<PriceRecord>> {
        Ok(self
            .prices
            .get(&item)
            .map(|records| records.iter().filter(|r| r.is_active).cloned().collect())
            .unwrap_or_default())
    }

    async fn prices_since(&self, item: ItemRef, since: DateTime<Utc>) -> Result<Vec<PriceRecord>> {
        Ok(self
            .prices
            .get(&item)
            .map(|records| records.iter().filter(|r| r.captured_at >= since).cloned().collect())
            .unwrap_or_default())
    }

    async fn load_estimate(&self, estimate_id: i64) -> Result<Option<Estimate>> {
        Ok(self.estimates.get(&estimate_id).map(|e| e.clone()))
    }

    async fn insert_estimate(&self, mut estimate: Estimate) -> Result<Estimate> {
        estimate.id = Self::next(&self.estimate_seq);
        self.assign_line_ids(&mut estimate);
        self.estimates.insert(estimate.id, estimate.clone());
        Ok(estimate)
    }

    async fn save_estimate(&self, estimate: Estimate) -> Result<Estimate> {
        self.write_back(estimate)
    }

    async fn insert_substitution(&self, new: NewSubstitution) -> Result<Substitution> {
        if !self.estimates.contains_key(&new.estimate_id) {
            return Err(EstimateError::not_found("Estimate", new.estimate_id));
        }
        let id = Self::next(&self.substitution_seq);
        let substitution = Substitution::from_new(id, new, Utc::now());
        self.substitutions.insert(id, substitution.clone());
        Ok(substitution)
    }

    async fn substitution(&self, estimate_id: i64, substitution_id: i64) -> Result<Option<Substitution>> {
        Ok(self
            .substitutions
            .get(&substitution_id)
            .filter(|s| s.estimate_id == estimate_id)
            .map(|s| s.clone()))
    }

    async fn list_substitutions(&self, estimate_id: i64) -> Result<Vec<Substitution>> {
        let mut subs: Vec<Substitution> = self
            .substitutions
            .iter()
            .filter(|s| s.estimate_id == estimate_id)
            .map(|s| s.value().clone())
            .collect();
        subs.sort_by_key(|s| s.id);
        Ok(subs)
    }

    async fn commit_applied(&self, estimate: Estimate, substitution: &Substitution) -> Result<Estimate> {
        // 持有条目锁完成检查与标记，与条件 UPDATE 等价
        {
            let mut stored = self
                .substitutions
                .get_mut(&substitution.id)
                .ok_or_else(|| EstimateError::not_found("Substitution", substitution.id))?;
            if stored.is_applied {
                return Err(EstimateError::AlreadyApplied(substitution.id));
            }
            stored.is_applied = true;
            stored.applied_at = substitution.applied_at;
        }

        match self.write_back(estimate) {
            Ok(saved) => Ok(saved),
            Err(e) => {
                if let Some(mut stored) = self.substitutions.get_mut(&substitution.id) {
                    stored.is_applied = false;
                    stored.applied_at = None;
                }
                Err(e)
            }
        }
    }
}

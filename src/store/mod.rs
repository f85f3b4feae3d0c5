//! 存储抽象：目录/价格只读，估算单及其明细、替代方案由服务层独占写入。

pub mod memory;
pub mod sample;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{CatalogItem, Estimate, ItemKind, ItemRef, NewSubstitution, PriceRecord, Substitution};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait EstimateStore: Send + Sync {
    async fn catalog_item(&self, item: ItemRef) -> Result<Option<CatalogItem>>;

    /// 同类别的全部目录项 (含停用项，按 id 升序)
    async fn category_items(&self, kind: ItemKind, category_id: i64) -> Result<Vec<CatalogItem>>;

    /// 某目录项的有效价格记录
    async fn active_prices(&self, item: ItemRef) -> Result<Vec<PriceRecord>>;

    /// 某目录项自 `since` 起采集的全部价格记录
    async fn prices_since(&self, item: ItemRef, since: DateTime<Utc>) -> Result<Vec<PriceRecord>>;

    /// 读取估算单及明细 (材料在前，各自按 id 升序)
    async fn load_estimate(&self, estimate_id: i64) -> Result<Option<Estimate>>;

    /// 新建估算单及明细，返回带 id 的聚合
    async fn insert_estimate(&self, estimate: Estimate) -> Result<Estimate>;

    /// 整体写回估算单：更新表头，写入/更新明细，删除已移除的明细
    async fn save_estimate(&self, estimate: Estimate) -> Result<Estimate>;

    async fn insert_substitution(&self, new: NewSubstitution) -> Result<Substitution>;

    async fn substitution(&self, estimate_id: i64, substitution_id: i64) -> Result<Option<Substitution>>;

    async fn list_substitutions(&self, estimate_id: i64) -> Result<Vec<Substitution>>;

    /// 同一事务内写回估算单并标记替代方案已应用
    async fn commit_applied(&self, estimate: Estimate, substitution: &Substitution) -> Result<Estimate>;
}

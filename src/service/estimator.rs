use super::{aggregator, pricing, substitution};
use crate::config::EstimationConfig;
use crate::error::{EstimateError, Result};
use crate::models::{
    Candidate, CatalogItem, Estimate, EstimateStatus, ItemKind, ItemRef, LineItem, LineKind,
    MachineryLine, MaterialLine, OptimizeFor, PriceHistoryPoint, PriceRecord, RateKind, RentalType,
};
use crate::store::EstimateStore;
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 材料明细输入；未给单价时取当前市场价
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialInput {
    pub material_id: i64,
    pub quantity: BigDecimal,
    pub unit_price: Option<BigDecimal>,
    pub waste_factor: Option<BigDecimal>,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub supplier_location: String,
    #[serde(default)]
    pub notes: String,
}

/// 机械明细输入
#[derive(Debug, Clone, Deserialize)]
pub struct MachineryInput {
    pub machinery_id: i64,
    pub rental_type: RentalType,
    pub duration: BigDecimal,
    pub unit_price: Option<BigDecimal>,
    pub transport_cost: Option<BigDecimal>,
    pub setup_cost: Option<BigDecimal>,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub supplier_location: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineInput {
    Material(MaterialInput),
    Machinery(MachineryInput),
}

/// 生成估算单请求
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateEstimate {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub materials: Vec<MaterialInput>,
    #[serde(default)]
    pub machinery: Vec<MachineryInput>,
    pub labor_cost: Option<BigDecimal>,
    pub overhead_cost: Option<BigDecimal>,
    pub vat_rate: Option<BigDecimal>,
    pub location: Option<String>,
}

/// 固定费用修改；未给出的字段保持不变
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostUpdate {
    pub labor_cost: Option<BigDecimal>,
    pub overhead_cost: Option<BigDecimal>,
    pub vat_rate: Option<BigDecimal>,
}

/// 估算服务：估算单聚合的唯一写入方
///
/// 每个写操作都在内存中得到新的聚合 (经 [`aggregator::recalculate`])，
/// 再整体交给存储层写回。
pub struct EstimateService {
    pub(crate) store: Arc<dyn EstimateStore>,
    pub(crate) settings: EstimationConfig,
}

impl EstimateService {
    pub fn new(store: Arc<dyn EstimateStore>, settings: EstimationConfig) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &EstimationConfig {
        &self.settings
    }

    pub(crate) async fn require_item(&self, item: ItemRef) -> Result<CatalogItem> {
        let entity = match item.kind {
            ItemKind::Material => "Material",
            ItemKind::Machinery => "Machinery",
        };
        self.store
            .catalog_item(item)
            .await?
            .ok_or_else(|| EstimateError::not_found(entity, item.id))
    }

    pub(crate) async fn require_estimate(&self, estimate_id: i64) -> Result<Estimate> {
        self.store
            .load_estimate(estimate_id)
            .await?
            .ok_or_else(|| EstimateError::not_found("Estimate", estimate_id))
    }

    // ---------------------------------------------------------------------
    // 价格查询
    // ---------------------------------------------------------------------

    /// 当前市场价 (无市场数据时为 None)
    pub async fn current_price(
        &self,
        item: ItemRef,
        location: Option<&str>,
        rate: RateKind,
    ) -> Result<Option<BigDecimal>> {
        self.require_item(item).await?;
        let records = self.store.active_prices(item).await?;
        Ok(pricing::current_price(&records, location, rate))
    }

    pub async fn availability(&self, item: ItemRef, location: Option<&str>) -> Result<bool> {
        self.require_item(item).await?;
        let records = self.store.active_prices(item).await?;
        Ok(pricing::is_available(&records, location))
    }

    pub async fn price_history(
        &self,
        item: ItemRef,
        location: Option<&str>,
        days: Option<i64>,
    ) -> Result<Vec<PriceHistoryPoint>> {
        let days = days.unwrap_or(self.settings.history_days);
        if !(1..=365).contains(&days) {
            return Err(EstimateError::validation(format!(
                "history window must be between 1 and 365 days, got {}",
                days
            )));
        }
        self.require_item(item).await?;

        let since = Utc::now() - Duration::days(days);
        let records = self.store.prices_since(item, since).await?;
        Ok(pricing::price_history(&records, location, since))
    }

    // ---------------------------------------------------------------------
    // 替代项查询
    // ---------------------------------------------------------------------

    /// 同类别替代项，按当前价排序
    pub async fn find_alternatives(
        &self,
        item: ItemRef,
        location: Option<&str>,
        optimize_for: OptimizeFor,
        limit: usize,
        rate: RateKind,
    ) -> Result<Vec<Candidate>> {
        let original = self.require_item(item).await?;
        let peers = self.store.category_items(original.kind, original.category_id).await?;

        let priced: Vec<&CatalogItem> = peers
            .iter()
            .filter(|c| c.is_active && c.id != original.id)
            .collect();
        let price_lists = futures::future::try_join_all(
            priced.iter().map(|c| self.store.active_prices(c.item_ref())),
        )
        .await?;
        let prices: HashMap<i64, Vec<PriceRecord>> = priced
            .iter()
            .map(|c| c.id)
            .zip(price_lists)
            .collect();

        let candidates = substitution::rank_alternatives(&original, peers, optimize_for, limit, |c| {
            prices
                .get(&c.id)
                .and_then(|records| pricing::current_price(records, location, rate))
        });

        tracing::debug!(
            "Found {} alternatives for {} {} (location: {:?})",
            candidates.len(),
            original.kind,
            original.id,
            location
        );
        Ok(candidates)
    }

    // ---------------------------------------------------------------------
    // 明细解析
    // ---------------------------------------------------------------------

    /// 市场价兜底：无人工单价时取当前价，仍无则为零
    async fn resolve_price(
        &self,
        item: ItemRef,
        manual: Option<BigDecimal>,
        rate: Option<RateKind>,
        location: Option<&str>,
    ) -> Result<BigDecimal> {
        if let Some(price) = manual {
            return Ok(price);
        }

        let market = match rate {
            Some(rate) => {
                let records = self.store.active_prices(item).await?;
                pricing::current_price(&records, location, rate)
            }
            None => None,
        };

        Ok(market.unwrap_or_else(|| {
            tracing::warn!(
                "No market price for {} {} (location: {:?}), using zero unit price",
                item.kind,
                item.id,
                location
            );
            BigDecimal::zero()
        }))
    }

    async fn resolve_line(
        &self,
        input: LineInput,
        location: Option<&str>,
        previous: Option<&LineKind>,
    ) -> Result<LineKind> {
        let item = match &input {
            LineInput::Material(m) => ItemRef::material(m.material_id),
            LineInput::Machinery(m) => ItemRef::machinery(m.machinery_id),
        };
        let catalog_item = self.require_item(item).await?;
        if !catalog_item.is_active {
            return Err(EstimateError::validation(format!(
                "{} {} is not active",
                item.kind, item.id
            )));
        }

        // 修改同一目录项且未给单价时保留原单价
        let kept_price = previous
            .filter(|p| p.item() == item)
            .map(|p| p.unit_price().clone());

        match input {
            LineInput::Material(m) => {
                let manual = m.unit_price.or(kept_price);
                let unit_price = self
                    .resolve_price(item, manual, Some(RateKind::Purchase), location)
                    .await?;
                Ok(LineKind::Material(MaterialLine {
                    material_id: m.material_id,
                    quantity: m.quantity,
                    unit_price,
                    waste_factor: m
                        .waste_factor
                        .unwrap_or_else(|| self.settings.default_waste_factor.clone()),
                    supplier: m.supplier,
                    supplier_location: m.supplier_location,
                    notes: m.notes,
                }))
            }
            LineInput::Machinery(m) => {
                let manual = m.unit_price.or(kept_price);
                let unit_price = self
                    .resolve_price(item, manual, m.rental_type.rate_kind(), location)
                    .await?;
                Ok(LineKind::Machinery(MachineryLine {
                    machinery_id: m.machinery_id,
                    rental_type: m.rental_type,
                    duration: m.duration,
                    unit_price,
                    transport_cost: m.transport_cost.unwrap_or_else(BigDecimal::zero),
                    setup_cost: m.setup_cost.unwrap_or_else(BigDecimal::zero),
                    supplier: m.supplier,
                    supplier_location: m.supplier_location,
                    notes: m.notes,
                }))
            }
        }
    }

    // ---------------------------------------------------------------------
    // 估算单写操作
    // ---------------------------------------------------------------------

    /// 生成估算单：解析明细、自动定价、聚合后一次写入
    pub async fn generate_estimate(&self, req: GenerateEstimate) -> Result<Estimate> {
        if req.project_id <= 0 {
            return Err(EstimateError::validation("project_id must be positive"));
        }
        if req.name.trim().is_empty() {
            return Err(EstimateError::validation("estimate name must not be empty"));
        }

        let location = req.location.as_deref();
        let vat_rate = req
            .vat_rate
            .unwrap_or_else(|| self.settings.default_vat_rate.clone());
        let mut estimate = Estimate::draft(req.project_id, req.name.trim(), vat_rate);
        estimate.description = req.description;
        estimate.labor_cost = req.labor_cost.unwrap_or_else(BigDecimal::zero);
        estimate.overhead_cost = req.overhead_cost.unwrap_or_else(BigDecimal::zero);

        let inputs = req
            .materials
            .into_iter()
            .map(LineInput::Material)
            .chain(req.machinery.into_iter().map(LineInput::Machinery));
        for input in inputs {
            let detail = self.resolve_line(input, location, None).await?;
            estimate.lines.push(LineItem::new(0, detail));
        }
        ensure_unique_items(&estimate)?;

        let estimate = aggregator::recalculate(estimate)?;
        let estimate = self.store.insert_estimate(estimate).await?;

        tracing::info!(
            "Estimate {} generated: {} lines, total {}",
            estimate.id,
            estimate.lines.len(),
            estimate.total_cost
        );
        Ok(estimate)
    }

    pub async fn get_estimate(&self, estimate_id: i64) -> Result<Estimate> {
        self.require_estimate(estimate_id).await
    }

    /// 聚合后写回
    async fn commit(&self, estimate: Estimate) -> Result<Estimate> {
        let estimate = aggregator::recalculate(estimate)?;
        self.store.save_estimate(estimate).await
    }

    pub async fn add_line(
        &self,
        estimate_id: i64,
        input: LineInput,
        location: Option<&str>,
    ) -> Result<Estimate> {
        let mut estimate = self.require_estimate(estimate_id).await?;
        let detail = self.resolve_line(input, location, None).await?;
        estimate.lines.push(LineItem::new(estimate_id, detail));
        ensure_unique_items(&estimate)?;

        let estimate = self.commit(estimate).await?;
        tracing::info!("Estimate {}: line added, total {}", estimate_id, estimate.total_cost);
        Ok(estimate)
    }

    pub async fn update_line(
        &self,
        estimate_id: i64,
        line_id: i64,
        input: LineInput,
        location: Option<&str>,
    ) -> Result<Estimate> {
        let mut estimate = self.require_estimate(estimate_id).await?;
        let previous = estimate
            .line(line_id)
            .map(|l| l.detail.clone())
            .ok_or_else(|| EstimateError::not_found("Line item", line_id))?;

        let detail = self.resolve_line(input, location, Some(&previous)).await?;
        if let Some(line) = estimate.line_mut(line_id) {
            line.detail = detail;
        }
        ensure_unique_items(&estimate)?;

        let estimate = self.commit(estimate).await?;
        tracing::info!(
            "Estimate {}: line {} updated, total {}",
            estimate_id,
            line_id,
            estimate.total_cost
        );
        Ok(estimate)
    }

    pub async fn remove_line(&self, estimate_id: i64, line_id: i64) -> Result<Estimate> {
        let mut estimate = self.require_estimate(estimate_id).await?;
        let before = estimate.lines.len();
        estimate.lines.retain(|l| l.id != Some(line_id));
        if estimate.lines.len() == before {
            return Err(EstimateError::not_found("Line item", line_id));
        }

        let estimate = self.commit(estimate).await?;
        tracing::info!(
            "Estimate {}: line {} removed, total {}",
            estimate_id,
            line_id,
            estimate.total_cost
        );
        Ok(estimate)
    }

    pub async fn update_costs(&self, estimate_id: i64, update: CostUpdate) -> Result<Estimate> {
        let mut estimate = self.require_estimate(estimate_id).await?;
        if let Some(labor) = update.labor_cost {
            estimate.labor_cost = labor;
        }
        if let Some(overhead) = update.overhead_cost {
            estimate.overhead_cost = overhead;
        }
        if let Some(vat_rate) = update.vat_rate {
            estimate.vat_rate = vat_rate;
        }
        self.commit(estimate).await
    }

    pub async fn set_status(&self, estimate_id: i64, status: EstimateStatus) -> Result<Estimate> {
        let mut estimate = self.require_estimate(estimate_id).await?;
        if estimate.status == status {
            return Ok(estimate);
        }
        tracing::info!(
            "Estimate {} status {} -> {}",
            estimate_id,
            estimate.status.as_str(),
            status.as_str()
        );
        estimate.status = status;
        self.commit(estimate).await
    }

    /// 导出估算明细 CSV
    pub async fn export_csv(&self, estimate_id: i64) -> Result<String> {
        let estimate = self.require_estimate(estimate_id).await?;

        let mut names = HashMap::new();
        for line in &estimate.lines {
            let item = line.detail.item();
            if let Some(found) = self.store.catalog_item(item).await? {
                names.insert(item, found.name);
            }
        }
        crate::db::export::estimate_to_csv(&estimate, &names)
    }
}

/// 一个估算单中每个目录项最多一行
pub(crate) fn ensure_unique_items(estimate: &Estimate) -> Result<()> {
    let mut seen = HashSet::new();
    for line in &estimate.lines {
        let item = line.detail.item();
        if !seen.insert(item) {
            return Err(EstimateError::validation(format!(
                "estimate already contains {} {}",
                item.kind, item.id
            )));
        }
    }
    Ok(())
}

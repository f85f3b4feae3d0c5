use super::aggregator;
use super::estimator::{ensure_unique_items, EstimateService};
use crate::error::{EstimateError, Result};
use crate::models::{
    Estimate, ItemKind, LineKind, NewSubstitution, OptimizationReport, OptimizeFor, RateKind,
    Substitution,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use serde::Deserialize;

/// 单次优化最多生成的替代方案数上限
pub const MAX_SUBSTITUTIONS_LIMIT: usize = 20;

/// 优化请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default, alias = "optimization_type")]
    pub optimize_for: OptimizeFor,
    pub max_substitutions: Option<usize>,
    pub location: Option<String>,
}

/// 潜在节省：只计入正向节省
pub fn potential_savings(substitutions: &[Substitution]) -> BigDecimal {
    substitutions
        .iter()
        .filter(|s| s.cost_savings > BigDecimal::zero())
        .fold(BigDecimal::zero(), |acc, s| acc + &s.cost_savings)
}

/// 将替代方案应用到估算单 (纯计算，不写存储)
///
/// 已应用的方案直接拒绝，估算单保持不变。
pub fn apply_to_estimate(mut estimate: Estimate, substitution: &Substitution) -> Result<Estimate> {
    if substitution.is_applied {
        return Err(EstimateError::AlreadyApplied(substitution.id));
    }
    if substitution.estimate_id != estimate.id {
        return Err(EstimateError::not_found("Substitution", substitution.id));
    }

    let line = estimate
        .line_mut(substitution.line_item_id)
        .ok_or_else(|| EstimateError::not_found("Line item", substitution.line_item_id))?;

    let current = line.detail.item();
    if current.kind != substitution.kind || current.id != substitution.original_item_id {
        return Err(EstimateError::Conflict(format!(
            "line {} no longer references {} {}",
            substitution.line_item_id, substitution.kind, substitution.original_item_id
        )));
    }

    line.detail
        .swap_item(substitution.alternative_item_id, substitution.alternative_price.clone());
    if ensure_unique_items(&estimate).is_err() {
        return Err(EstimateError::Conflict(format!(
            "estimate already contains {} {}",
            substitution.kind, substitution.alternative_item_id
        )));
    }

    aggregator::recalculate(estimate)
}

impl EstimateService {
    /// 生成替代方案
    ///
    /// 先材料后机械，按明细存储顺序处理；每个明细最多取前若干个候选
    /// (跳过估算单中已有的目录项)，总数达到上限即停止。每条方案生成后立即写入。
    pub async fn optimize(&self, estimate_id: i64, req: OptimizeRequest) -> Result<OptimizationReport> {
        let max_substitutions = req.max_substitutions.unwrap_or(self.settings.max_substitutions);
        if !(1..=MAX_SUBSTITUTIONS_LIMIT).contains(&max_substitutions) {
            return Err(EstimateError::validation(format!(
                "max_substitutions must be between 1 and {}, got {}",
                MAX_SUBSTITUTIONS_LIMIT, max_substitutions
            )));
        }

        let estimate = self.require_estimate(estimate_id).await?;
        let location = req.location.as_deref();
        let per_item = self.settings.alternatives_per_item;
        let mut substitutions: Vec<Substitution> = Vec::new();

        let ordered = estimate
            .lines_of(ItemKind::Material)
            .chain(estimate.lines_of(ItemKind::Machinery));

        'lines: for line in ordered {
            if substitutions.len() >= max_substitutions {
                break;
            }
            let Some(line_id) = line.id else {
                continue;
            };

            let rate = match &line.detail {
                LineKind::Material(_) => RateKind::Purchase,
                LineKind::Machinery(m) => m.rental_type.rate_kind().unwrap_or(RateKind::Daily),
            };
            let item = line.detail.item();
            // 已在估算单中的目录项无法应用，先多取再过滤
            let candidates = self
                .find_alternatives(item, location, req.optimize_for, per_item + estimate.lines.len(), rate)
                .await?
                .into_iter()
                .filter(|c| !estimate.contains_item(c.item.item_ref()))
                .take(per_item);

            for candidate in candidates {
                if substitutions.len() >= max_substitutions {
                    break 'lines;
                }
                let saved = self
                    .store
                    .insert_substitution(NewSubstitution {
                        estimate_id,
                        line_item_id: line_id,
                        kind: item.kind,
                        original_item_id: item.id,
                        alternative_item_id: candidate.item.id,
                        original_price: line.detail.unit_price().clone(),
                        alternative_price: candidate.price,
                        reason: candidate.reason,
                        confidence_score: candidate.confidence,
                    })
                    .await?;
                substitutions.push(saved);
            }
        }

        let savings = potential_savings(&substitutions);
        tracing::info!(
            "Estimate {}: {} substitutions generated, potential savings {}",
            estimate_id,
            substitutions.len(),
            savings
        );

        Ok(OptimizationReport {
            estimate_id,
            optimized_cost: &estimate.total_cost - &savings,
            original_cost: estimate.total_cost,
            potential_savings: savings,
            substitutions,
        })
    }

    /// 替代方案列表，按节省金额降序
    pub async fn list_substitutions(&self, estimate_id: i64) -> Result<Vec<Substitution>> {
        self.require_estimate(estimate_id).await?;
        let mut subs = self.store.list_substitutions(estimate_id).await?;
        subs.sort_by(|a, b| b.cost_savings.cmp(&a.cost_savings).then_with(|| a.id.cmp(&b.id)));
        Ok(subs)
    }

    /// 应用替代方案并重新聚合
    pub async fn apply_substitution(&self, estimate_id: i64, substitution_id: i64) -> Result<Estimate> {
        let estimate = self.require_estimate(estimate_id).await?;
        let mut substitution = self
            .store
            .substitution(estimate_id, substitution_id)
            .await?
            .ok_or_else(|| EstimateError::not_found("Substitution", substitution_id))?;

        let updated = match apply_to_estimate(estimate, &substitution) {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(
                    "Estimate {}: substitution {} rejected: {}",
                    estimate_id,
                    substitution_id,
                    e
                );
                return Err(e);
            }
        };

        substitution.is_applied = true;
        substitution.applied_at = Some(Utc::now());
        let saved = self.store.commit_applied(updated, &substitution).await?;

        tracing::info!(
            "Estimate {}: substitution {} applied, new total {}",
            estimate_id,
            substitution_id,
            saved.total_cost
        );
        Ok(saved)
    }
}

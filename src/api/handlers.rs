use crate::error::EstimateError;
use crate::models::{
    Candidate, Estimate, EstimateStatus, ItemKind, ItemRef, OptimizationReport, OptimizeFor,
    PriceHistoryPoint, RateKind, Substitution,
};
use crate::service::{CostUpdate, EstimateService, GenerateEstimate, LineInput, OptimizeRequest};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SharedService = Arc<EstimateService>;

/// 统一响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Response {
        let body = ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        };
        (StatusCode::OK, Json(body)).into_response()
    }

    fn created(message: impl Into<String>, data: T) -> Response {
        let body = ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        };
        (StatusCode::CREATED, Json(body)).into_response()
    }
}

impl IntoResponse for EstimateError {
    fn into_response(self) -> Response {
        let status = match &self {
            EstimateError::Validation(_) => StatusCode::BAD_REQUEST,
            EstimateError::NotFound { .. } => StatusCode::NOT_FOUND,
            EstimateError::AlreadyApplied(_) | EstimateError::Conflict(_) => StatusCode::CONFLICT,
            EstimateError::Database(_)
            | EstimateError::Export(_)
            | EstimateError::Data(_) => {
                tracing::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            message: format!("Error: {}", self),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, EstimateError>;

fn parse_kind(kind: &str) -> Result<ItemKind, EstimateError> {
    kind.parse()
        .map_err(|_| EstimateError::validation(format!("unknown catalog kind '{}'", kind)))
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

// ---------------------------------------------------------------------------
// 估算单
// ---------------------------------------------------------------------------

pub async fn generate_estimate(
    State(service): State<SharedService>,
    Json(req): Json<GenerateEstimate>,
) -> ApiResult {
    let estimate = service.generate_estimate(req).await?;
    Ok(ApiResponse::created(
        format!("Estimate {} generated", estimate.id),
        estimate,
    ))
}

pub async fn get_estimate(State(service): State<SharedService>, Path(id): Path<i64>) -> ApiResult {
    let estimate = service.get_estimate(id).await?;
    Ok(ApiResponse::ok("OK", estimate))
}

pub async fn update_costs(
    State(service): State<SharedService>,
    Path(id): Path<i64>,
    Json(update): Json<CostUpdate>,
) -> ApiResult {
    let estimate = service.update_costs(id, update).await?;
    Ok(ApiResponse::ok("Estimate costs updated", estimate))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EstimateStatus,
}

pub async fn set_status(
    State(service): State<SharedService>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult {
    let estimate = service.set_status(id, req.status).await?;
    Ok(ApiResponse::ok("Estimate status updated", estimate))
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    #[serde(flatten)]
    pub line: LineInput,
    pub location: Option<String>,
}

pub async fn add_line(
    State(service): State<SharedService>,
    Path(id): Path<i64>,
    Json(req): Json<LineRequest>,
) -> ApiResult {
    let estimate = service.add_line(id, req.line, req.location.as_deref()).await?;
    Ok(ApiResponse::created("Line item added", estimate))
}

pub async fn update_line(
    State(service): State<SharedService>,
    Path((id, line_id)): Path<(i64, i64)>,
    Json(req): Json<LineRequest>,
) -> ApiResult {
    let estimate = service
        .update_line(id, line_id, req.line, req.location.as_deref())
        .await?;
    Ok(ApiResponse::ok("Line item updated", estimate))
}

pub async fn remove_line(
    State(service): State<SharedService>,
    Path((id, line_id)): Path<(i64, i64)>,
) -> ApiResult {
    let estimate: Estimate = service.remove_line(id, line_id).await?;
    Ok(ApiResponse::ok("Line item removed", estimate))
}

pub async fn export_estimate(State(service): State<SharedService>, Path(id): Path<i64>) -> ApiResult {
    let body = service.export_csv(id).await?;
    let disposition = format!("attachment; filename=\"estimate-{}.csv\"", id);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// 优化与替代方案
// ---------------------------------------------------------------------------

pub async fn optimize_estimate(
    State(service): State<SharedService>,
    Path(id): Path<i64>,
    Json(req): Json<OptimizeRequest>,
) -> ApiResult {
    let report: OptimizationReport = service.optimize(id, req).await?;
    Ok(ApiResponse::ok(
        format!(
            "Generated {} substitutions, potential savings {}",
            report.substitutions.len(),
            report.potential_savings
        ),
        report,
    ))
}

pub async fn list_substitutions(State(service): State<SharedService>, Path(id): Path<i64>) -> ApiResult {
    let subs: Vec<Substitution> = service.list_substitutions(id).await?;
    Ok(ApiResponse::ok(format!("{} substitutions", subs.len()), subs))
}

pub async fn apply_substitution(
    State(service): State<SharedService>,
    Path((id, substitution_id)): Path<(i64, i64)>,
) -> ApiResult {
    let estimate = service.apply_substitution(id, substitution_id).await?;
    Ok(ApiResponse::ok(
        format!("Substitution applied successfully, new total {}", estimate.total_cost),
        estimate,
    ))
}

// ---------------------------------------------------------------------------
// 目录价格
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub location: Option<String>,
    pub rate: Option<RateKind>,
    pub days: Option<i64>,
    pub optimize_for: Option<OptimizeFor>,
    pub limit: Option<usize>,
}

impl PriceQuery {
    /// 材料默认取售价，机械默认取日租价
    fn rate_for(&self, kind: ItemKind) -> RateKind {
        self.rate.unwrap_or(match kind {
            ItemKind::Material => RateKind::Purchase,
            ItemKind::Machinery => RateKind::Daily,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub item: ItemRef,
    pub rate: RateKind,
    pub price: Option<BigDecimal>,
}

pub async fn current_price(
    State(service): State<SharedService>,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PriceQuery>,
) -> ApiResult {
    let item = ItemRef { kind: parse_kind(&kind)?, id };
    let rate = query.rate_for(item.kind);
    let price = service
        .current_price(item, query.location.as_deref(), rate)
        .await?;
    let message = if price.is_some() { "OK" } else { "No market data" };
    Ok(ApiResponse::ok(message, PriceResponse { item, rate, price }))
}

pub async fn availability(
    State(service): State<SharedService>,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PriceQuery>,
) -> ApiResult {
    let item = ItemRef { kind: parse_kind(&kind)?, id };
    let available = service.availability(item, query.location.as_deref()).await?;
    Ok(ApiResponse::ok("OK", available))
}

pub async fn price_history(
    State(service): State<SharedService>,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PriceQuery>,
) -> ApiResult {
    let item = ItemRef { kind: parse_kind(&kind)?, id };
    let history: Vec<PriceHistoryPoint> = service
        .price_history(item, query.location.as_deref(), query.days)
        .await?;
    Ok(ApiResponse::ok(format!("{} days with data", history.len()), history))
}

pub async fn alternatives(
    State(service): State<SharedService>,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<PriceQuery>,
) -> ApiResult {
    let item = ItemRef { kind: parse_kind(&kind)?, id };
    let limit = query
        .limit
        .unwrap_or(service.settings().alternatives_per_item);
    let candidates: Vec<Candidate> = service
        .find_alternatives(
            item,
            query.location.as_deref(),
            query.optimize_for.unwrap_or_default(),
            limit,
            query.rate_for(item.kind),
        )
        .await?;
    Ok(ApiResponse::ok(format!("{} alternatives", candidates.len()), candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, LineKind, MachineryLine, RentalType};
    use std::str::FromStr;

    #[test]
    fn line_request_reads_tagged_input_and_location() {
        let req: LineRequest = serde_json::from_str(
            r#"{"kind": "material", "material_id": 3, "quantity": "4", "location": "Leeds"}"#,
        )
        .unwrap();
        assert_eq!(req.location.as_deref(), Some("Leeds"));
        match req.line {
            LineInput::Material(m) => {
                assert_eq!(m.material_id, 3);
                assert!(m.unit_price.is_none());
                assert!(m.waste_factor.is_none());
            }
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn line_item_serializes_flat_with_kind_tag() {
        let mut line = LineItem::new(
            7,
            LineKind::Machinery(MachineryLine {
                machinery_id: 101,
                rental_type: RentalType::Weekly,
                duration: BigDecimal::from(2),
                unit_price: BigDecimal::from_str("650.00").unwrap(),
                transport_cost: BigDecimal::from(0),
                setup_cost: BigDecimal::from(0),
                supplier: String::new(),
                supplier_location: String::new(),
                notes: String::new(),
            }),
        );
        line.id = Some(12);

        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["kind"], "machinery");
        assert_eq!(value["machinery_id"], 101);
        assert_eq!(value["rental_type"], "weekly");
        assert_eq!(value["id"], 12);
    }

    #[test]
    fn unknown_catalog_kind_is_rejected() {
        assert!(matches!(parse_kind("tools"), Err(EstimateError::Validation(_))));
        assert_eq!(parse_kind("materials").unwrap(), ItemKind::Material);
    }
}

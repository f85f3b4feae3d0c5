use super::rows::{CatalogItemRow, EstimateRow, LineRow, PriceRecordRow, SubstitutionRow};
use crate::error::{EstimateError, Result};
use crate::models::{
    CatalogItem, Estimate, ItemKind, ItemRef, LineItem, LineKind, NewSubstitution, PriceRecord,
    Substitution,
};
use crate::store::EstimateStore;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// PostgreSQL 存储
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn catalog_select(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Material => {
            r#"
            SELECT m.id, 'material' AS kind, m.name, m.sku,
                   m.category_id, c.name AS category_name, m.unit, m.is_active
            FROM materials m
            INNER JOIN material_categories c ON c.id = m.category_id
            "#
        }
        ItemKind::Machinery => {
            r#"
            SELECT m.id, 'machinery' AS kind, m.name, m.sku,
                   m.category_id, c.name AS category_name, 'unit' AS unit, m.is_active
            FROM machinery m
            INNER JOIN machinery_categories c ON c.id = m.category_id
            "#
        }
    }
}

fn price_column(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Material => "material_id",
        ItemKind::Machinery => "machinery_id",
    }
}

const PRICE_SELECT: &str = r#"
    SELECT p.id, p.material_id, p.machinery_id, p.supplier_id, s.name AS supplier_name,
           p.price, p.rental_price_daily, p.rental_price_weekly,
           p.location, p.in_stock, p.is_active, p.captured_at
    FROM price_records p
    INNER JOIN suppliers s ON s.id = p.supplier_id
"#;

const SUBSTITUTION_SELECT: &str = r#"
    SELECT id, estimate_id, line_item_id, kind, original_item_id, alternative_item_id,
           original_price, alternative_price, cost_savings, reason, confidence_score,
           is_applied, applied_at, created_at
    FROM estimate_substitutions
"#;

/// 查询估算单明细 (材料在前，按 id 升序)
async fn fetch_lines(conn: &mut PgConnection, estimate_id: i64) -> Result<Vec<LineItem>> {
    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT id, estimate_id, kind, item_id, quantity, unit_price, waste_factor,
               rental_type, transport_cost, setup_cost, total_cost,
               supplier, supplier_location, notes
        FROM estimate_lines
        WHERE estimate_id = $1
        ORDER BY CASE kind WHEN 'material' THEN 0 ELSE 1 END, id
        "#,
    )
    .bind(estimate_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(LineItem::try_from).collect()
}

/// 明细行写入参数；机械时长写入 quantity 列
struct LineParams<'a> {
    quantity: &'a BigDecimal,
    waste_factor: Option<&'a BigDecimal>,
    rental_type: Option<&'static str>,
    transport_cost: Option<&'a BigDecimal>,
    setup_cost: Option<&'a BigDecimal>,
    supplier: &'a str,
    supplier_location: &'a str,
    notes: &'a str,
}

fn line_params(detail: &LineKind) -> LineParams<'_> {
    match detail {
        LineKind::Material(m) => LineParams {
            quantity: &m.quantity,
            waste_factor: Some(&m.waste_factor),
            rental_type: None,
            transport_cost: None,
            setup_cost: None,
            supplier: &m.supplier,
            supplier_location: &m.supplier_location,
            notes: &m.notes,
        },
        LineKind::Machinery(m) => LineParams {
            quantity: &m.duration,
            waste_factor: None,
            rental_type: Some(m.rental_type.as_str()),
            transport_cost: Some(&m.transport_cost),
            setup_cost: Some(&m.setup_cost),
            supplier: &m.supplier,
            supplier_location: &m.supplier_location,
            notes: &m.notes,
        },
    }
}

/// 写入全部明细：有 id 的更新，无 id 的插入，其余删除
async fn write_lines(tx: &mut Transaction<'_, Postgres>, estimate: &mut Estimate) -> Result<()> {
    let kept: Vec<i64> = estimate.lines.iter().filter_map(|l| l.id).collect();
    sqlx::query("DELETE FROM estimate_lines WHERE estimate_id = $1 AND NOT (id = ANY($2))")
        .bind(estimate.id)
        .bind(&kept)
        .execute(&mut **tx)
        .await?;

    for line in estimate.lines.iter_mut() {
        line.estimate_id = estimate.id;
        let item = line.detail.item();
        let params = line_params(&line.detail);

        match line.id {
            Some(line_id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE estimate_lines
                    SET kind = $3, item_id = $4, quantity = $5, unit_price = $6,
                        waste_factor = $7, rental_type = $8, transport_cost = $9,
                        setup_cost = $10, total_cost = $11, supplier = $12,
                        supplier_location = $13, notes = $14
                    WHERE id = $1 AND estimate_id = $2
                    "#,
                )
                .bind(line_id)
                .bind(estimate.id)
                .bind(item.kind.as_str())
                .bind(item.id)
                .bind(params.quantity)
                .bind(line.detail.unit_price())
                .bind(params.waste_factor)
                .bind(params.rental_type)
                .bind(params.transport_cost)
                .bind(params.setup_cost)
                .bind(&line.total_cost)
                .bind(params.supplier)
                .bind(params.supplier_location)
                .bind(params.notes)
                .execute(&mut **tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(EstimateError::not_found("Line item", line_id));
                }
            }
            None => {
                let (new_id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO estimate_lines (
                        estimate_id, kind, item_id, quantity, unit_price, waste_factor,
                        rental_type, transport_cost, setup_cost, total_cost,
                        supplier, supplier_location, notes
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    RETURNING id
                    "#,
                )
                .bind(estimate.id)
                .bind(item.kind.as_str())
                .bind(item.id)
                .bind(params.quantity)
                .bind(line.detail.unit_price())
                .bind(params.waste_factor)
                .bind(params.rental_type)
                .bind(params.transport_cost)
                .bind(params.setup_cost)
                .bind(&line.total_cost)
                .bind(params.supplier)
                .bind(params.supplier_location)
                .bind(params.notes)
                .fetch_one(&mut **tx)
                .await?;
                line.id = Some(new_id);
            }
        }
    }

    estimate.lines.sort_by_key(|l| (l.kind() == ItemKind::Machinery, l.id));
    Ok(())
}

/// 更新表头金额与状态
async fn write_header(tx: &mut Transaction<'_, Postgres>, estimate: &Estimate) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE estimates
        SET name = $2, description = $3, status = $4,
            materials_cost = $5, labor_cost = $6, machinery_cost = $7, overhead_cost = $8,
            subtotal = $9, vat_rate = $10, vat_amount = $11, total_cost = $12,
            updated_at = $13
        WHERE id = $1
        "#,
    )
    .bind(estimate.id)
    .bind(&estimate.name)
    .bind(&estimate.description)
    .bind(estimate.status.as_str())
    .bind(&estimate.materials_cost)
    .bind(&estimate.labor_cost)
    .bind(&estimate.machinery_cost)
    .bind(&estimate.overhead_cost)
    .bind(&estimate.subtotal)
    .bind(&estimate.vat_rate)
    .bind(&estimate.vat_amount)
    .bind(&estimate.total_cost)
    .bind(estimate.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EstimateError::not_found("Estimate", estimate.id));
    }
    Ok(())
}

#[async_trait]
impl EstimateStore for PgStore {
    async fn catalog_item(&self, item: ItemRef) -> Result<Option<CatalogItem>> {
        let sql = format!("{} WHERE m.id = $1", catalog_select(item.kind));
        let row = sqlx::query_as::<_, CatalogItemRow>(&sql)
            .bind(item.id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn category_items(&self, kind: ItemKind, category_id: i64) -> Result<Vec<CatalogItem>> {
        let sql = format!("{} WHERE m.category_id = $1 ORDER BY m.id", catalog_select(kind));
        let rows = sqlx::query_as::<_, CatalogItemRow>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn active_prices(&self, item: ItemRef) -> Result<Vec<PriceRecord>> {
        let sql = format!(
            "{} WHERE p.{} = $1 AND p.is_active = TRUE ORDER BY p.captured_at DESC, p.id DESC",
            PRICE_SELECT,
            price_column(item.kind)
        );
        let rows = sqlx::query_as::<_, PriceRecordRow>(&sql)
            .bind(item.id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PriceRecord::try_from).collect()
    }

    async fn prices_since(&self, item: ItemRef, since: DateTime<Utc>) -> Result<Vec<PriceRecord>> {
        let sql = format!(
            "{} WHERE p.{} = $1 AND p.captured_at >= $2 ORDER BY p.captured_at DESC",
            PRICE_SELECT,
            price_column(item.kind)
        );
        let rows = sqlx::query_as::<_, PriceRecordRow>(&sql)
            .bind(item.id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PriceRecord::try_from).collect()
    }

    async fn load_estimate(&self, estimate_id: i64) -> Result<Option<Estimate>> {
        // 表头与明细在同一快照中读取
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, EstimateRow>(
            r#"
            SELECT id, project_id, name, description, status,
                   materials_cost, labor_cost, machinery_cost, overhead_cost,
                   subtotal, vat_rate, vat_amount, total_cost, created_at, updated_at
            FROM estimates
            WHERE id = $1
            "#,
        )
        .bind(estimate_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lines = fetch_lines(&mut tx, estimate_id).await?;
        tx.commit().await?;

        row.into_estimate(lines).map(Some)
    }

    async fn insert_estimate(&self, mut estimate: Estimate) -> Result<Estimate> {
        let mut tx = self.pool.begin().await?;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO estimates (
                project_id, name, description, status,
                materials_cost, labor_cost, machinery_cost, overhead_cost,
                subtotal, vat_rate, vat_amount, total_cost, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, created_at
            "#,
        )
        .bind(estimate.project_id)
        .bind(&estimate.name)
        .bind(&estimate.description)
        .bind(estimate.status.as_str())
        .bind(&estimate.materials_cost)
        .bind(&estimate.labor_cost)
        .bind(&estimate.machinery_cost)
        .bind(&estimate.overhead_cost)
        .bind(&estimate.subtotal)
        .bind(&estimate.vat_rate)
        .bind(&estimate.vat_amount)
        .bind(&estimate.total_cost)
        .bind(estimate.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        estimate.id = id;
        estimate.created_at = created_at;
        write_lines(&mut tx, &mut estimate).await?;
        tx.commit().await?;

        tracing::debug!("Inserted estimate {} with {} lines", id, estimate.lines.len());
        Ok(estimate)
    }

    async fn save_estimate(&self, mut estimate: Estimate) -> Result<Estimate> {
        let mut tx = self.pool.begin().await?;
        write_header(&mut tx, &estimate).await?;
        write_lines(&mut tx, &mut estimate).await?;
        tx.commit().await?;
        Ok(estimate)
    }

    async fn insert_substitution(&self, new: NewSubstitution) -> Result<Substitution> {
        let cost_savings = new.cost_savings();
        let sql = r#"
            INSERT INTO estimate_substitutions (
                estimate_id, line_item_id, kind, original_item_id, alternative_item_id,
                original_price, alternative_price, cost_savings, reason, confidence_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, estimate_id, line_item_id, kind, original_item_id, alternative_item_id,
                      original_price, alternative_price, cost_savings, reason, confidence_score,
                      is_applied, applied_at, created_at
        "#;
        let row = sqlx::query_as::<_, SubstitutionRow>(sql)
            .bind(new.estimate_id)
            .bind(new.line_item_id)
            .bind(new.kind.as_str())
            .bind(new.original_item_id)
            .bind(new.alternative_item_id)
            .bind(&new.original_price)
            .bind(&new.alternative_price)
            .bind(&cost_savings)
            .bind(&new.reason)
            .bind(&new.confidence_score)
            .fetch_one(&self.pool)
            .await?;
        Substitution::try_from(row)
    }

    async fn substitution(&self, estimate_id: i64, substitution_id: i64) -> Result<Option<Substitution>> {
        let sql = format!("{} WHERE id = $1 AND estimate_id = $2", SUBSTITUTION_SELECT);
        let row = sqlx::query_as::<_, SubstitutionRow>(&sql)
            .bind(substitution_id)
            .bind(estimate_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Substitution::try_from).transpose()
    }

    async fn list_substitutions(&self, estimate_id: i64) -> Result<Vec<Substitution>> {
        let sql = format!("{} WHERE estimate_id = $1 ORDER BY id", SUBSTITUTION_SELECT);
        let rows = sqlx::query_as::<_, SubstitutionRow>(&sql)
            .bind(estimate_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Substitution::try_from).collect()
    }

    async fn commit_applied(&self, mut estimate: Estimate, substitution: &Substitution) -> Result<Estimate> {
        let mut tx = self.pool.begin().await?;

        // 条件更新，防止并发重复应用
        let result = sqlx::query(
            r#"
            UPDATE estimate_substitutions
            SET is_applied = TRUE, applied_at = $2
            WHERE id = $1 AND is_applied = FALSE
            "#,
        )
        .bind(substitution.id)
        .bind(substitution.applied_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EstimateError::AlreadyApplied(substitution.id));
        }

        write_header(&mut tx, &estimate).await?;
        write_lines(&mut tx, &mut estimate).await?;
        tx.commit().await?;
        Ok(estimate)
    }
}

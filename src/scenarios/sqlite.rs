//! Durable scenario store on SQLite.
//!
//! The connection is opened lazily on first use and reused afterwards. With no
//! database path configured the store reports itself unavailable, except for
//! `list`, which returns an empty sequence.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::{ScenarioBackend, StoreError};
use crate::models::{
    ModelConstants, Scenario, ScenarioDraft, ScenarioId, SimulationInput, SimulationResult,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scenarios (
    id TEXT PRIMARY KEY,
    scenario_name TEXT,
    monthly_invoice_volume REAL NOT NULL,
    num_ap_staff REAL NOT NULL,
    avg_hours_per_invoice REAL NOT NULL,
    hourly_wage REAL NOT NULL,
    error_rate_manual REAL NOT NULL,
    error_cost REAL NOT NULL,
    time_horizon_months REAL NOT NULL,
    one_time_implementation_cost REAL NOT NULL,
    labor_cost_manual REAL NOT NULL,
    auto_cost REAL NOT NULL,
    error_savings REAL NOT NULL,
    monthly_savings REAL NOT NULL,
    cumulative_savings REAL NOT NULL,
    net_savings REAL NOT NULL,
    payback_months REAL,
    roi_percentage REAL,
    constants_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scenarios_created ON scenarios(created_at DESC);
"#;

const SELECT_COLUMNS: &str = "id, scenario_name, monthly_invoice_volume, num_ap_staff,
    avg_hours_per_invoice, hourly_wage, error_rate_manual, error_cost,
    time_horizon_months, one_time_implementation_cost, labor_cost_manual,
    auto_cost, error_savings, monthly_savings, cumulative_savings, net_savings,
    payback_months, roi_percentage, constants_json, created_at";

/// Durable scenario backend with a lazily opened connection.
pub struct SqliteScenarioBackend {
    db_path: Option<String>,
    conn: OnceCell<Arc<Mutex<Connection>>>,
}

impl SqliteScenarioBackend {
    /// `None` (or a blank path) leaves the store unconfigured.
    pub fn new(db_path: Option<String>) -> Self {
        Self {
            db_path: db_path.filter(|p| !p.trim().is_empty()),
            conn: OnceCell::new(),
        }
    }

    /// Private in-memory database, mainly for tests.
    pub fn in_memory() -> Self {
        Self::new(Some(":memory:".to_string()))
    }

    pub fn is_configured(&self) -> bool {
        self.db_path.is_some()
    }

    /// Open the connection on first call; later calls reuse it.
    async fn connection(&self) -> Result<&Arc<Mutex<Connection>>, StoreError> {
        let Some(path) = self.db_path.as_deref() else {
            return Err(StoreError::not_configured());
        };

        self.conn
            .get_or_try_init(|| async move {
                let conn = Connection::open(path)
                    .map_err(|e| StoreError::Unavailable(format!("open {path}: {e}")))?;
                conn.pragma_update(None, "journal_mode", "WAL").ok();
                conn.pragma_update(None, "synchronous", "NORMAL").ok();
                conn.execute_batch(SCHEMA_SQL)?;
                info!(path, "📊 Scenario database connected");
                Ok::<_, StoreError>(Arc::new(Mutex::new(conn)))
            })
            .await
    }
}

#[async_trait]
impl ScenarioBackend for SqliteScenarioBackend {
    async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, StoreError> {
        let conn = self.connection().await?.lock().await;
        let id = ScenarioId::mint_durable();
        insert_row(&conn, &id, &draft)?;
        debug!(id = %id, "scenario stored");
        Ok(draft.into_scenario(id))
    }

    async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        if !self.is_configured() {
            return Ok(Vec::new());
        }
        let conn = self.connection().await?.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM scenarios ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_scenario(row)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        let conn = self.connection().await?.lock().await;
        let ScenarioId::Durable(raw) = id else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM scenarios WHERE id = ?1"
        ))?;
        let found = stmt
            .query_row(params![raw], |row| Ok(row_to_scenario(row)))
            .optional()?;
        found.ok_or_else(|| StoreError::NotFound(id.clone()))?
    }

    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        let conn = self.connection().await?.lock().await;
        let ScenarioId::Durable(raw) = id else {
            return Ok(false);
        };
        let affected = conn.execute("DELETE FROM scenarios WHERE id = ?1", params![raw])?;
        Ok(affected > 0)
    }
}

fn insert_row(conn: &Connection, id: &ScenarioId, draft: &ScenarioDraft) -> Result<(), StoreError> {
    let input = &draft.input;
    let result = &draft.result;
    let constants = serde_json::to_string(&result.constants)
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    conn.execute(
        "INSERT INTO scenarios (
            id, scenario_name, monthly_invoice_volume, num_ap_staff,
            avg_hours_per_invoice, hourly_wage, error_rate_manual, error_cost,
            time_horizon_months, one_time_implementation_cost, labor_cost_manual,
            auto_cost, error_savings, monthly_savings, cumulative_savings, net_savings,
            payback_months, roi_percentage, constants_json, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            id.to_string(),
            input.scenario_name,
            input.monthly_invoice_volume,
            input.num_ap_staff,
            input.avg_hours_per_invoice,
            input.hourly_wage,
            input.error_rate_manual,
            input.error_cost,
            input.time_horizon_months,
            input.one_time_implementation_cost,
            result.labor_cost_manual,
            result.auto_cost,
            result.error_savings,
            result.monthly_savings,
            result.cumulative_savings,
            result.net_savings,
            result.payback_months,
            result.roi_percentage,
            constants,
            draft.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )?;
    Ok(())
}

fn row_to_scenario(row: &Row<'_>) -> Result<Scenario, StoreError> {
    let raw_id: String = row.get(0)?;
    let input = SimulationInput {
        scenario_name: row.get(1)?,
        monthly_invoice_volume: row.get(2)?,
        num_ap_staff: row.get(3)?,
        avg_hours_per_invoice: row.get(4)?,
        hourly_wage: row.get(5)?,
        error_rate_manual: row.get(6)?,
        error_cost: row.get(7)?,
        time_horizon_months: row.get(8)?,
        one_time_implementation_cost: row.get(9)?,
    };

    let constants_json: String = row.get(18)?;
    let constants: ModelConstants = serde_json::from_str(&constants_json)
        .map_err(|e| StoreError::Backend(format!("scenario {raw_id}: bad constants: {e}")))?;

    let created_raw: String = row.get(19)?;
    let created_at = DateTime::parse_from_rfc3339(&created_raw)
        .map_err(|e| StoreError::Backend(format!("scenario {raw_id}: bad created_at: {e}")))?
        .with_timezone(&Utc);

    let result = SimulationResult {
        inputs: input.clone(),
        constants,
        labor_cost_manual: row.get(10)?,
        auto_cost: row.get(11)?,
        error_savings: row.get(12)?,
        monthly_savings: row.get(13)?,
        cumulative_savings: row.get(14)?,
        net_savings: row.get(15)?,
        payback_months: row.get(16)?,
        roi_percentage: row.get(17)?,
        time_horizon_months: input.time_horizon_months,
    };

    Ok(Scenario {
        id: ScenarioId::Durable(raw_id),
        input,
        result,
        created_at,
    })
}

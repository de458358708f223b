// ==========================================
// 车间生产排产系统 - 排产轮次与方案数据仓储
// ==========================================
// 职责: 排产轮次 (planning_run) 与策略方案 (planning_scenario) 的持久化
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::scenario::{PlanningRun, PlanningScenario, ScenarioMetrics};
use crate::domain::types::PlanningRunStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// PlanningRunRepository - 排产轮次仓储
// ==========================================
pub struct PlanningRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanningRunRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建轮次
    pub fn create(&self, run: &PlanningRun) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO planning_run (
                run_id, run_name, window_start, window_end,
                status, accepted_scenario_id, created_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &run.run_id,
                &run.run_name,
                &run.window_start.format("%Y-%m-%d").to_string(),
                &run.window_end.format("%Y-%m-%d").to_string(),
                run.status.to_db_str(),
                &run.accepted_scenario_id,
                &run.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &run.revision,
            ],
        )?;

        Ok(run.run_id.clone())
    }

    /// 按run_id查询轮次
    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<PlanningRun>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT run_id, run_name, window_start, window_end,
                      status, accepted_scenario_id, created_at, revision
               FROM planning_run
               WHERE run_id = ?"#,
            params![run_id],
            Self::map_run_row,
        ) {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有轮次 (按创建时间降序)
    pub fn list_all(&self) -> RepositoryResult<Vec<PlanningRun>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT run_id, run_name, window_start, window_end,
                      status, accepted_scenario_id, created_at, revision
               FROM planning_run
               ORDER BY created_at DESC"#,
        )?;

        let runs = stmt
            .query_map([], Self::map_run_row)?
            .collect::<Result<Vec<PlanningRun>, _>>()?;

        Ok(runs)
    }

    /// 更新轮次 (带乐观锁检查)
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他用户已操作)
    /// - `RepositoryError::NotFound`: run_id不存在
    pub fn update(&self, run: &PlanningRun) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE planning_run
               SET run_name = ?, status = ?, accepted_scenario_id = ?,
                   revision = revision + 1
               WHERE run_id = ? AND revision = ?"#,
            params![
                &run.run_name,
                run.status.to_db_str(),
                &run.accepted_scenario_id,
                &run.run_id,
                &run.revision,
            ],
        )?;

        if rows == 0 {
            let actual: Result<i32, _> = conn.query_row(
                "SELECT revision FROM planning_run WHERE run_id = ?",
                params![&run.run_id],
                |row| row.get(0),
            );

            return match actual {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    id: run.run_id.clone(),
                    expected: run.revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "PlanningRun".to_string(),
                    id: run.run_id.clone(),
                }),
            };
        }

        Ok(())
    }

    /// 删除轮次 (级联删除方案)
    pub fn delete(&self, run_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM planning_run WHERE run_id = ?",
            params![run_id],
        )?;

        Ok(())
    }

    fn map_run_row(row: &rusqlite::Row) -> rusqlite::Result<PlanningRun> {
        Ok(PlanningRun {
            run_id: row.get(0)?,
            run_name: row.get(1)?,
            window_start: NaiveDate::parse_from_str(&row.get::<_, String>(2)?, "%Y-%m-%d").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            window_end: NaiveDate::parse_from_str(&row.get::<_, String>(3)?, "%Y-%m-%d").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            status: PlanningRunStatus::from_str(&row.get::<_, String>(4)?),
            accepted_scenario_id: row.get(5)?,
            created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(6)?, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?,
            revision: row.get(7)?,
        })
    }
}

// ==========================================
// ScenarioRepository - 策略方案仓储
// ==========================================
// 方案指标以 JSON 快照落库, 保证结果可复现
pub struct ScenarioRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScenarioRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建方案
    pub fn create(&self, scenario: &PlanningScenario) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let metrics_json = serde_json::to_string(&scenario.metrics)
            .map_err(|e| RepositoryError::ValidationError(format!("指标序列化失败: {}", e)))?;

        conn.execute(
            r#"INSERT INTO planning_scenario (
                scenario_id, run_id, strategy, metrics_json, is_accepted, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &scenario.scenario_id,
                &scenario.run_id,
                &scenario.strategy,
                &metrics_json,
                &scenario.is_accepted,
                &scenario.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(scenario.scenario_id.clone())
    }

    /// 按scenario_id查询方案
    pub fn find_by_id(&self, scenario_id: &str) -> RepositoryResult<Option<PlanningScenario>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT scenario_id, run_id, strategy, metrics_json, is_accepted, created_at
               FROM planning_scenario
               WHERE scenario_id = ?"#,
            params![scenario_id],
            Self::map_scenario_row,
        ) {
            Ok(scenario) => Ok(Some(scenario)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询轮次的全部方案
    pub fn find_by_run(&self, run_id: &str) -> RepositoryResult<Vec<PlanningScenario>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT scenario_id, run_id, strategy, metrics_json, is_accepted, created_at
               FROM planning_scenario
               WHERE run_id = ?
               ORDER BY created_at ASC"#,
        )?;

        let scenarios = stmt
            .query_map(params![run_id], Self::map_scenario_row)?
            .collect::<Result<Vec<PlanningScenario>, _>>()?;

        Ok(scenarios)
    }

    /// 标记采纳方案 (同轮次其余方案清除采纳标记)
    pub fn mark_accepted(&self, run_id: &str, scenario_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "UPDATE planning_scenario SET is_accepted = 0 WHERE run_id = ?",
            params![run_id],
        )?;

        let rows = tx.execute(
            "UPDATE planning_scenario SET is_accepted = 1 WHERE scenario_id = ? AND run_id = ?",
            params![scenario_id, run_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PlanningScenario".to_string(),
                id: scenario_id.to_string(),
            });
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    fn map_scenario_row(row: &rusqlite::Row) -> rusqlite::Result<PlanningScenario> {
        let metrics_json: String = row.get(3)?;
        let metrics: ScenarioMetrics = serde_json::from_str(&metrics_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(PlanningScenario {
            scenario_id: row.get(0)?,
            run_id: row.get(1)?,
            strategy: row.get(2)?,
            metrics,
            is_accepted: row.get(4)?,
            created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(5)?, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?,
        })
    }
}

// ==========================================
// 车间生产排产系统 - 计划数据仓储
// ==========================================
// 职责: 已提交计划 + 计划明细 + 需求草稿的持久化
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::schedule::{Schedule, ScheduleDraft, ScheduleEntry};
use crate::domain::types::TaskStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ScheduleRepository - 计划仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建计划及其全部明细 (单事务)
    pub fn create(&self, schedule: &Schedule, entries: &[ScheduleEntry]) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            r#"INSERT INTO schedule (schedule_id, demand_id, created_at, revision)
               VALUES (?, ?, ?, ?)"#,
            params![
                &schedule.schedule_id,
                &schedule.demand_id,
                &schedule.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &schedule.revision,
            ],
        )?;

        for entry in entries {
            Self::insert_entry(&tx, &schedule.schedule_id, entry)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(schedule.schedule_id.clone())
    }

    /// 按schedule_id查询计划
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT schedule_id, demand_id, created_at, revision
               FROM schedule
               WHERE schedule_id = ?"#,
            params![schedule_id],
            Self::map_schedule_row,
        ) {
            Ok(schedule) => Ok(Some(schedule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询需求最近提交的计划
    pub fn find_latest_by_demand(&self, demand_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT schedule_id, demand_id, created_at, revision
               FROM schedule
               WHERE demand_id = ?
               ORDER BY created_at DESC
               LIMIT 1"#,
            params![demand_id],
            Self::map_schedule_row,
        ) {
            Ok(schedule) => Ok(Some(schedule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询计划的全部明细 (按日期+开始时刻升序)
    pub fn list_entries(&self, schedule_id: &str) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT schedule_id, demand_id, step_id, plan_date, start_time, end_time,
                      planned_output, worker_id, is_overtime, status, actual_output
               FROM schedule_entry
               WHERE schedule_id = ?
               ORDER BY plan_date ASC, start_time ASC"#,
        )?;

        let entries = stmt
            .query_map(params![schedule_id], Self::map_entry_row)?
            .collect::<Result<Vec<ScheduleEntry>, _>>()?;

        Ok(entries)
    }

    /// 回填明细执行结果 (按计划+工序+日期+开始时刻定位)
    pub fn record_execution(
        &self,
        schedule_id: &str,
        step_id: &str,
        plan_date: NaiveDate,
        start_time: NaiveTime,
        status: TaskStatus,
        actual_output: Option<i64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE schedule_entry
               SET status = ?, actual_output = ?
               WHERE schedule_id = ? AND step_id = ? AND plan_date = ? AND start_time = ?"#,
            params![
                status.to_db_str(),
                &actual_output,
                schedule_id,
                step_id,
                plan_date.format("%Y-%m-%d").to_string(),
                start_time.format("%H:%M:%S").to_string(),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ScheduleEntry".to_string(),
                id: format!("{}/{}/{}", schedule_id, step_id, plan_date),
            });
        }

        Ok(())
    }

    /// 替换计划的未执行明细 (带乐观锁检查)
    ///
    /// 未执行 = NOT_STARTED / BLOCKED；已开工与已完成的明细保留为执行历史
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他用户已提交)
    /// - `RepositoryError::NotFound`: schedule_id不存在
    pub fn replace_open_entries(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        new_entries: &[ScheduleEntry],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let rows = tx.execute(
            r#"UPDATE schedule
               SET revision = revision + 1
               WHERE schedule_id = ? AND revision = ?"#,
            params![schedule_id, expected_revision],
        )?;

        if rows == 0 {
            let actual: Result<i32, _> = tx.query_row(
                "SELECT revision FROM schedule WHERE schedule_id = ?",
                params![schedule_id],
                |row| row.get(0),
            );

            return match actual {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    id: schedule_id.to_string(),
                    expected: expected_revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "Schedule".to_string(),
                    id: schedule_id.to_string(),
                }),
            };
        }

        tx.execute(
            r#"DELETE FROM schedule_entry
               WHERE schedule_id = ? AND status IN ('NOT_STARTED', 'BLOCKED')"#,
            params![schedule_id],
        )?;

        for entry in new_entries {
            Self::insert_entry(&tx, schedule_id, entry)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    /// 删除计划 (级联删除明细)
    pub fn delete(&self, schedule_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM schedule WHERE schedule_id = ?",
            params![schedule_id],
        )?;

        Ok(())
    }

    // ==========================================
    // 需求草稿 (每需求一份, JSON载荷)
    // ==========================================

    /// 保存草稿 (已存在则覆盖)
    pub fn save_draft(&self, draft: &ScheduleDraft) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO schedule_draft (demand_id, payload_json, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(demand_id) DO UPDATE
               SET payload_json = excluded.payload_json, updated_at = excluded.updated_at"#,
            params![
                &draft.demand_id,
                &draft.payload_json,
                &draft.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(())
    }

    /// 读取草稿
    pub fn get_draft(&self, demand_id: &str) -> RepositoryResult<Option<ScheduleDraft>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT demand_id, payload_json, updated_at
               FROM schedule_draft
               WHERE demand_id = ?"#,
            params![demand_id],
            |row| {
                Ok(ScheduleDraft {
                    demand_id: row.get(0)?,
                    payload_json: row.get(1)?,
                    updated_at: NaiveDateTime::parse_from_str(
                        &row.get::<_, String>(2)?,
                        "%Y-%m-%d %H:%M:%S",
                    )
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                })
            },
        ) {
            Ok(draft) => Ok(Some(draft)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除草稿 (不存在视为成功)
    pub fn delete_draft(&self, demand_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM schedule_draft WHERE demand_id = ?",
            params![demand_id],
        )?;

        Ok(())
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn insert_entry(tx: &Transaction, schedule_id: &str, entry: &ScheduleEntry) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO schedule_entry (
                schedule_id, demand_id, step_id, plan_date, start_time, end_time,
                planned_output, worker_id, is_overtime, status, actual_output
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                schedule_id,
                &entry.demand_id,
                &entry.step_id,
                &entry.plan_date.format("%Y-%m-%d").to_string(),
                &entry.start_time.format("%H:%M:%S").to_string(),
                &entry.end_time.format("%H:%M:%S").to_string(),
                &entry.planned_output,
                &entry.worker_id,
                &entry.is_overtime,
                entry.status.to_db_str(),
                &entry.actual_output,
            ],
        )?;
        Ok(())
    }

    fn map_schedule_row(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
        Ok(Schedule {
            schedule_id: row.get(0)?,
            demand_id: row.get(1)?,
            created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(2)?, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?,
            revision: row.get(3)?,
        })
    }

    fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<ScheduleEntry> {
        Ok(ScheduleEntry {
            schedule_id: row.get(0)?,
            demand_id: row.get(1)?,
            step_id: row.get(2)?,
            plan_date: NaiveDate::parse_from_str(&row.get::<_, String>(3)?, "%Y-%m-%d").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            start_time: NaiveTime::parse_from_str(&row.get::<_, String>(4)?, "%H:%M:%S").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            end_time: NaiveTime::parse_from_str(&row.get::<_, String>(5)?, "%H:%M:%S").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            planned_output: row.get(6)?,
            worker_id: row.get(7)?,
            is_overtime: row.get(8)?,
            status: TaskStatus::from_str(&row.get::<_, String>(9)?),
            actual_output: row.get(10)?,
        })
    }
}

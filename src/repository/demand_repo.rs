// ==========================================
// 车间生产排产系统 - 需求数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::demand::DemandEntry;
use crate::domain::types::DemandStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// DemandRepository - 需求仓储
// ==========================================
pub struct DemandRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DemandRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建需求
    pub fn create(&self, demand: &DemandEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO demand_entry (
                demand_id, product_id, quantity, due_date,
                priority, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &demand.demand_id,
                &demand.product_id,
                &demand.quantity,
                &demand.due_date.format("%Y-%m-%d").to_string(),
                &demand.priority,
                demand.status.to_db_str(),
                &demand.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &demand.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(demand.demand_id.clone())
    }

    /// 按demand_id查询需求
    pub fn find_by_id(&self, demand_id: &str) -> RepositoryResult<Option<DemandEntry>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT demand_id, product_id, quantity, due_date,
                      priority, status, created_at, updated_at
               FROM demand_entry
               WHERE demand_id = ?"#,
            params![demand_id],
            |row| self.map_row(row),
        ) {
            Ok(demand) => Ok(Some(demand)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有需求 (优先级降序, 交期升序)
    pub fn list_all(&self) -> RepositoryResult<Vec<DemandEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT demand_id, product_id, quantity, due_date,
                      priority, status, created_at, updated_at
               FROM demand_entry
               ORDER BY priority DESC, due_date ASC"#,
        )?;

        let demands = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<Result<Vec<DemandEntry>, _>>()?;

        Ok(demands)
    }

    /// 查询指定交期窗口内的可排产需求
    pub fn list_plannable_in_window(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> RepositoryResult<Vec<DemandEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT demand_id, product_id, quantity, due_date,
                      priority, status, created_at, updated_at
               FROM demand_entry
               WHERE status IN ('PENDING', 'PLANNED')
                 AND due_date >= ? AND due_date <= ?
               ORDER BY priority DESC, due_date ASC"#,
        )?;

        let demands = stmt
            .query_map(
                params![
                    window_start.format("%Y-%m-%d").to_string(),
                    window_end.format("%Y-%m-%d").to_string(),
                ],
                |row| self.map_row(row),
            )?
            .collect::<Result<Vec<DemandEntry>, _>>()?;

        Ok(demands)
    }

    /// 更新需求
    pub fn update(&self, demand: &DemandEntry) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"UPDATE demand_entry
               SET product_id = ?, quantity = ?, due_date = ?,
                   priority = ?, status = ?, updated_at = ?
               WHERE demand_id = ?"#,
            params![
                &demand.product_id,
                &demand.quantity,
                &demand.due_date.format("%Y-%m-%d").to_string(),
                &demand.priority,
                demand.status.to_db_str(),
                &demand.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &demand.demand_id,
            ],
        )?;

        Ok(())
    }

    /// 更新需求状态
    pub fn update_status(&self, demand_id: &str, status: DemandStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE demand_entry
               SET status = ?, updated_at = datetime('now', 'localtime')
               WHERE demand_id = ?"#,
            params![status.to_db_str(), demand_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DemandEntry".to_string(),
                id: demand_id.to_string(),
            });
        }

        Ok(())
    }

    /// 删除需求
    pub fn delete(&self, demand_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM demand_entry WHERE demand_id = ?",
            params![demand_id],
        )?;

        Ok(())
    }

    /// 映射数据库行到DemandEntry对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<DemandEntry> {
        Ok(DemandEntry {
            demand_id: row.get(0)?,
            product_id: row.get(1)?,
            quantity: row.get(2)?,
            due_date: NaiveDate::parse_from_str(&row.get::<_, String>(3)?, "%Y-%m-%d").map_err(
                |e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)),
            )?,
            priority: row.get(4)?,
            status: DemandStatus::from_str(&row.get::<_, String>(5)?),
            created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(6)?, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?,
            updated_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(7)?, "%Y-%m-%d %H:%M:%S")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?,
        })
    }
}

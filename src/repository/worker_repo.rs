// ==========================================
// 车间生产排产系统 - 工人数据仓储
// ==========================================
// 职责: 工人档案 + 设备认证 + 工序熟练度的持久化
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::WorkerStatus;
use crate::domain::worker::{EquipmentCertification, Worker, WorkerStepProficiency};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// WorkerRepository - 工人仓储
// ==========================================
pub struct WorkerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkerRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建工人
    pub fn create(&self, worker: &Worker) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO worker (worker_id, name, skill_category, hourly_cost, status)
               VALUES (?, ?, ?, ?, ?)"#,
            params![
                &worker.worker_id,
                &worker.name,
                &worker.skill_category,
                &worker.hourly_cost,
                worker.status.to_db_str(),
            ],
        )?;

        Ok(worker.worker_id.clone())
    }

    /// 按worker_id查询工人
    pub fn find_by_id(&self, worker_id: &str) -> RepositoryResult<Option<Worker>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT worker_id, name, skill_category, hourly_cost, status
               FROM worker
               WHERE worker_id = ?"#,
            params![worker_id],
            Self::map_worker_row,
        ) {
            Ok(worker) => Ok(Some(worker)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有工人
    pub fn list_all(&self) -> RepositoryResult<Vec<Worker>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT worker_id, name, skill_category, hourly_cost, status
               FROM worker
               ORDER BY worker_id ASC"#,
        )?;

        let workers = stmt
            .query_map([], Self::map_worker_row)?
            .collect::<Result<Vec<Worker>, _>>()?;

        Ok(workers)
    }

    /// 更新工人
    pub fn update(&self, worker: &Worker) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE worker
               SET name = ?, skill_category = ?, hourly_cost = ?, status = ?
               WHERE worker_id = ?"#,
            params![
                &worker.name,
                &worker.skill_category,
                &worker.hourly_cost,
                worker.status.to_db_str(),
                &worker.worker_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Worker".to_string(),
                id: worker.worker_id.clone(),
            });
        }

        Ok(())
    }

    /// 删除工人 (级联删除认证与熟练度)
    pub fn delete(&self, worker_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute("DELETE FROM worker WHERE worker_id = ?", params![worker_id])?;

        Ok(())
    }

    // ==========================================
    // 设备认证
    // ==========================================

    /// 授予设备认证 (重复授予幂等)
    pub fn add_certification(&self, cert: &EquipmentCertification) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT OR IGNORE INTO equipment_certification (worker_id, equipment_id)
               VALUES (?, ?)"#,
            params![&cert.worker_id, &cert.equipment_id],
        )?;

        Ok(())
    }

    /// 吊销设备认证
    pub fn remove_certification(&self, worker_id: &str, equipment_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM equipment_certification WHERE worker_id = ? AND equipment_id = ?",
            params![worker_id, equipment_id],
        )?;

        Ok(())
    }

    /// 查询全部认证记录
    pub fn list_certifications(&self) -> RepositoryResult<Vec<EquipmentCertification>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT worker_id, equipment_id
               FROM equipment_certification
               ORDER BY worker_id, equipment_id"#,
        )?;

        let certs = stmt
            .query_map([], |row| {
                Ok(EquipmentCertification {
                    worker_id: row.get(0)?,
                    equipment_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<EquipmentCertification>, _>>()?;

        Ok(certs)
    }

    // ==========================================
    // 工序熟练度
    // ==========================================

    /// 写入熟练度等级 (已存在则覆盖)
    pub fn upsert_proficiency(&self, prof: &WorkerStepProficiency) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO worker_step_proficiency (worker_id, step_id, level)
               VALUES (?, ?, ?)
               ON CONFLICT(worker_id, step_id) DO UPDATE SET level = excluded.level"#,
            params![&prof.worker_id, &prof.step_id, &prof.level],
        )?;

        Ok(())
    }

    /// 查询全部熟练度记录
    pub fn list_proficiencies(&self) -> RepositoryResult<Vec<WorkerStepProficiency>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT worker_id, step_id, level
               FROM worker_step_proficiency
               ORDER BY worker_id, step_id"#,
        )?;

        let profs = stmt
            .query_map([], |row| {
                Ok(WorkerStepProficiency {
                    worker_id: row.get(0)?,
                    step_id: row.get(1)?,
                    level: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<WorkerStepProficiency>, _>>()?;

        Ok(profs)
    }

    /// 映射数据库行到Worker对象
    fn map_worker_row(row: &rusqlite::Row) -> rusqlite::Result<Worker> {
        Ok(Worker {
            worker_id: row.get(0)?,
            name: row.get(1)?,
            skill_category: row.get(2)?,
            hourly_cost: row.get(3)?,
            status: WorkerStatus::from_str(&row.get::<_, String>(4)?),
        })
    }
}

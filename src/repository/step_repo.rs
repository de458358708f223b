// ==========================================
// 车间生产排产系统 - 产品工序数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::product::{ProductStep, StepDependency};
use crate::domain::types::DependencyRelation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// StepRepository - 工序仓储
// ==========================================
pub struct StepRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StepRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建工序 (含其依赖边)
    pub fn create(&self, step: &ProductStep) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            r#"INSERT INTO product_step (
                step_id, product_id, sequence_index, seconds_per_piece,
                skill_category, equipment_id, equipment_hourly_cost
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &step.step_id,
                &step.product_id,
                &step.sequence_index,
                &step.seconds_per_piece,
                &step.skill_category,
                &step.equipment_id,
                &step.equipment_hourly_cost,
            ],
        )?;

        for dep in &step.dependencies {
            tx.execute(
                r#"INSERT INTO step_dependency (step_id, predecessor_step_id, relation)
                   VALUES (?, ?, ?)"#,
                params![
                    &step.step_id,
                    &dep.predecessor_step_id,
                    dep.relation.to_db_str(),
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(step.step_id.clone())
    }

    /// 按step_id查询工序 (含依赖)
    pub fn find_by_id(&self, step_id: &str) -> RepositoryResult<Option<ProductStep>> {
        let conn = self.get_conn()?;

        let step = match conn.query_row(
            r#"SELECT step_id, product_id, sequence_index, seconds_per_piece,
                      skill_category, equipment_id, equipment_hourly_cost
               FROM product_step
               WHERE step_id = ?"#,
            params![step_id],
            Self::map_step_row,
        ) {
            Ok(s) => s,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut step = step;
        step.dependencies = Self::load_dependencies(&conn, step_id)?;
        Ok(Some(step))
    }

    /// 查询产品的全部工序 (按sequence_index升序, 含依赖)
    pub fn find_by_product(&self, product_id: &str) -> RepositoryResult<Vec<ProductStep>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT step_id, product_id, sequence_index, seconds_per_piece,
                      skill_category, equipment_id, equipment_hourly_cost
               FROM product_step
               WHERE product_id = ?
               ORDER BY sequence_index ASC"#,
        )?;

        let mut steps = stmt
            .query_map(params![product_id], Self::map_step_row)?
            .collect::<Result<Vec<ProductStep>, _>>()?;

        // 一次查出该产品全部依赖边后按工序分组
        let mut dep_stmt = conn.prepare(
            r#"SELECT d.step_id, d.predecessor_step_id, d.relation
               FROM step_dependency d
               JOIN product_step s ON s.step_id = d.step_id
               WHERE s.product_id = ?"#,
        )?;

        let mut deps_by_step: HashMap<String, Vec<StepDependency>> = HashMap::new();
        let rows = dep_stmt.query_map(params![product_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                StepDependency {
                    predecessor_step_id: row.get(1)?,
                    relation: DependencyRelation::from_str(&row.get::<_, String>(2)?),
                },
            ))
        })?;
        for row in rows {
            let (step_id, dep) = row?;
            deps_by_step.entry(step_id).or_default().push(dep);
        }

        for step in &mut steps {
            if let Some(deps) = deps_by_step.remove(&step.step_id) {
                step.dependencies = deps;
            }
        }

        Ok(steps)
    }

    /// 更新工序 (依赖整体替换)
    pub fn update(&self, step: &ProductStep) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let rows = tx.execute(
            r#"UPDATE product_step
               SET sequence_index = ?, seconds_per_piece = ?, skill_category = ?,
                   equipment_id = ?, equipment_hourly_cost = ?
               WHERE step_id = ?"#,
            params![
                &step.sequence_index,
                &step.seconds_per_piece,
                &step.skill_category,
                &step.equipment_id,
                &step.equipment_hourly_cost,
                &step.step_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductStep".to_string(),
                id: step.step_id.clone(),
            });
        }

        tx.execute(
            "DELETE FROM step_dependency WHERE step_id = ?",
            params![&step.step_id],
        )?;
        for dep in &step.dependencies {
            tx.execute(
                r#"INSERT INTO step_dependency (step_id, predecessor_step_id, relation)
                   VALUES (?, ?, ?)"#,
                params![
                    &step.step_id,
                    &dep.predecessor_step_id,
                    dep.relation.to_db_str(),
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    /// 删除产品的全部工序 (级联删除依赖边)
    pub fn delete_by_product(&self, product_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM product_step WHERE product_id = ?",
            params![product_id],
        )?;

        Ok(())
    }

    fn load_dependencies(conn: &Connection, step_id: &str) -> RepositoryResult<Vec<StepDependency>> {
        let mut stmt = conn.prepare(
            r#"SELECT predecessor_step_id, relation
               FROM step_dependency
               WHERE step_id = ?"#,
        )?;

        let deps = stmt
            .query_map(params![step_id], |row| {
                Ok(StepDependency {
                    predecessor_step_id: row.get(0)?,
                    relation: DependencyRelation::from_str(&row.get::<_, String>(1)?),
                })
            })?
            .collect::<Result<Vec<StepDependency>, _>>()?;

        Ok(deps)
    }

    /// 映射数据库行到ProductStep对象 (依赖由调用方补齐)
    fn map_step_row(row: &rusqlite::Row) -> rusqlite::Result<ProductStep> {
        Ok(ProductStep {
            step_id: row.get(0)?,
            product_id: row.get(1)?,
            sequence_index: row.get(2)?,
            seconds_per_piece: row.get(3)?,
            skill_category: row.get(4)?,
            equipment_id: row.get(5)?,
            equipment_hourly_cost: row.get(6)?,
            dependencies: Vec::new(),
        })
    }
}

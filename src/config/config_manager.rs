// ==========================================
// 车间生产排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::planning_config_trait::PlanningConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::calendar::CalendarConfig;
use async_trait::async_trait;
use chrono::NaiveTime;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 方案落库时记录配置快照，保证结果可复现
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 解析 "HH:MM" 配置值，格式错误时回退默认边界并告警
    fn parse_time_or(&self, key: &str, raw: &str, fallback: NaiveTime) -> NaiveTime {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            tracing::warn!(
                config_key = key,
                raw_value = %raw,
                "时刻配置格式错误，使用默认边界"
            );
            fallback
        })
    }
}

// ==========================================
// PlanningConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PlanningConfigReader for ConfigManager {
    async fn get_calendar_config(&self) -> Result<CalendarConfig, Box<dyn Error>> {
        let defaults = CalendarConfig::default();

        let morning_start = self.get_config_or_default(config_keys::CALENDAR_MORNING_START, "07:00")?;
        let lunch_start = self.get_config_or_default(config_keys::CALENDAR_LUNCH_START, "12:00")?;
        let lunch_end = self.get_config_or_default(config_keys::CALENDAR_LUNCH_END, "12:30")?;
        let day_end = self.get_config_or_default(config_keys::CALENDAR_DAY_END, "15:30")?;
        let max_overtime = self.get_config_or_default(config_keys::CALENDAR_MAX_OVERTIME_MINUTES, "120")?;

        // 加班上限: 非正数或 "none" 表示禁止加班
        let max_overtime_minutes = match max_overtime.trim().to_lowercase().as_str() {
            "none" | "" => None,
            s => s.parse::<i64>().ok().filter(|m| *m > 0),
        };

        Ok(CalendarConfig {
            morning_start: self.parse_time_or(
                config_keys::CALENDAR_MORNING_START,
                &morning_start,
                defaults.morning_start,
            ),
            lunch_start: self.parse_time_or(
                config_keys::CALENDAR_LUNCH_START,
                &lunch_start,
                defaults.lunch_start,
            ),
            lunch_end: self.parse_time_or(
                config_keys::CALENDAR_LUNCH_END,
                &lunch_end,
                defaults.lunch_end,
            ),
            day_end: self.parse_time_or(
                config_keys::CALENDAR_DAY_END,
                &day_end,
                defaults.day_end,
            ),
            max_overtime_minutes,
        })
    }

    async fn get_default_hourly_rate(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_HOURLY_RATE, "35.0")?;
        Ok(value.parse::<f64>().unwrap_or(35.0))
    }

    async fn get_default_efficiency_factor(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_EFFICIENCY_FACTOR, "100.0")?;
        Ok(value.parse::<f64>().unwrap_or(100.0))
    }
}

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone)]
pub enum ConfigScope {
    Global,                          // 全局
    Product { product_id: String },  // 产品
    Worker { worker_id: String },    // 工人
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 工作日历
    pub const CALENDAR_MORNING_START: &str = "calendar_morning_start";
    pub const CALENDAR_LUNCH_START: &str = "calendar_lunch_start";
    pub const CALENDAR_LUNCH_END: &str = "calendar_lunch_end";
    pub const CALENDAR_DAY_END: &str = "calendar_day_end";
    pub const CALENDAR_MAX_OVERTIME_MINUTES: &str = "calendar_max_overtime_minutes";

    // 成本
    pub const DEFAULT_HOURLY_RATE: &str = "default_hourly_rate";

    // 效率
    pub const DEFAULT_EFFICIENCY_FACTOR: &str = "default_efficiency_factor";
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use chrono::NaiveTime;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_calendar_defaults_when_unset() {
        let mgr = manager();
        let cfg = mgr.get_calendar_config().await.unwrap();
        assert_eq!(cfg, CalendarConfig::default());
    }

    #[tokio::test]
    async fn test_calendar_overrides() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::CALENDAR_MORNING_START, "08:00")
            .unwrap();
        mgr.set_global_config_value(config_keys::CALENDAR_MAX_OVERTIME_MINUTES, "none")
            .unwrap();

        let cfg = mgr.get_calendar_config().await.unwrap();
        assert_eq!(cfg.morning_start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(cfg.max_overtime_minutes, None);
    }

    #[tokio::test]
    async fn test_malformed_time_falls_back() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::CALENDAR_DAY_END, "25:99")
            .unwrap();

        let cfg = mgr.get_calendar_config().await.unwrap();
        assert_eq!(cfg.day_end, CalendarConfig::default().day_end);
    }

    #[tokio::test]
    async fn test_default_rate_and_efficiency() {
        let mgr = manager();
        assert_eq!(mgr.get_default_hourly_rate().await.unwrap(), 35.0);

        mgr.set_global_config_value(config_keys::DEFAULT_EFFICIENCY_FACTOR, "85.0")
            .unwrap();
        assert_eq!(mgr.get_default_efficiency_factor().await.unwrap(), 85.0);
    }
}

// ==========================================
// 车间生产排产系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供内嵌建库脚本，首次启动与测试共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库（幂等，已存在的表跳过）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id    TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS demand_entry (
            demand_id   TEXT PRIMARY KEY,
            product_id  TEXT NOT NULL,
            quantity    INTEGER NOT NULL,
            due_date    TEXT NOT NULL,
            priority    INTEGER NOT NULL DEFAULT 0,
            status      TEXT NOT NULL DEFAULT 'PENDING',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS product_step (
            step_id               TEXT PRIMARY KEY,
            product_id            TEXT NOT NULL,
            sequence_index        INTEGER NOT NULL,
            seconds_per_piece     REAL NOT NULL,
            skill_category        TEXT,
            equipment_id          TEXT,
            equipment_hourly_cost REAL
        );
        CREATE INDEX IF NOT EXISTS idx_product_step_product
            ON product_step (product_id, sequence_index);

        CREATE TABLE IF NOT EXISTS step_dependency (
            step_id             TEXT NOT NULL
                REFERENCES product_step (step_id) ON DELETE CASCADE,
            predecessor_step_id TEXT NOT NULL,
            relation            TEXT NOT NULL DEFAULT 'FINISH',
            PRIMARY KEY (step_id, predecessor_step_id)
        );

        CREATE TABLE IF NOT EXISTS worker (
            worker_id      TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            skill_category TEXT,
            hourly_cost    REAL NOT NULL DEFAULT 0,
            status         TEXT NOT NULL DEFAULT 'ACTIVE'
        );

        CREATE TABLE IF NOT EXISTS equipment_certification (
            worker_id    TEXT NOT NULL
                REFERENCES worker (worker_id) ON DELETE CASCADE,
            equipment_id TEXT NOT NULL,
            PRIMARY KEY (worker_id, equipment_id)
        );

        CREATE TABLE IF NOT EXISTS worker_step_proficiency (
            worker_id TEXT NOT NULL
                REFERENCES worker (worker_id) ON DELETE CASCADE,
            step_id   TEXT NOT NULL,
            level     INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (worker_id, step_id)
        );

        CREATE TABLE IF NOT EXISTS schedule (
            schedule_id TEXT PRIMARY KEY,
            demand_id   TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            revision    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS schedule_entry (
            schedule_id    TEXT NOT NULL
                REFERENCES schedule (schedule_id) ON DELETE CASCADE,
            demand_id      TEXT NOT NULL,
            step_id        TEXT NOT NULL,
            plan_date      TEXT NOT NULL,
            start_time     TEXT NOT NULL,
            end_time       TEXT NOT NULL,
            planned_output INTEGER NOT NULL,
            worker_id      TEXT,
            is_overtime    INTEGER NOT NULL DEFAULT 0,
            status         TEXT NOT NULL DEFAULT 'NOT_STARTED',
            actual_output  INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_schedule_entry_schedule
            ON schedule_entry (schedule_id, plan_date, start_time);

        CREATE TABLE IF NOT EXISTS schedule_draft (
            demand_id    TEXT PRIMARY KEY,
            payload_json TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS planning_run (
            run_id               TEXT PRIMARY KEY,
            run_name             TEXT NOT NULL,
            window_start         TEXT NOT NULL,
            window_end           TEXT NOT NULL,
            status               TEXT NOT NULL DEFAULT 'DRAFT',
            accepted_scenario_id TEXT,
            created_at           TEXT NOT NULL,
            revision             INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS planning_scenario (
            scenario_id  TEXT PRIMARY KEY,
            run_id       TEXT NOT NULL
                REFERENCES planning_run (run_id) ON DELETE CASCADE,
            strategy     TEXT NOT NULL,
            metrics_json TEXT NOT NULL,
            is_accepted  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

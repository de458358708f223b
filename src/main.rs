// ==========================================
// 车间生产排产系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 决策支持系统
// ==========================================

use std::sync::{Arc, Mutex};

use workshop_aps::api::{PlanningApi, ScenarioApi};
use workshop_aps::config::ConfigManager;
use workshop_aps::repository::{
    DemandRepository, PlanningRunRepository, ScenarioRepository, ScheduleRepository,
    StepRepository, WorkerRepository,
};
use workshop_aps::{db, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 决策支持系统", workshop_aps::APP_NAME);
    tracing::info!("系统版本: {}", workshop_aps::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 第一个命令行参数，缺省为当前目录
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "workshop_aps.db".to_string());
    tracing::info!("使用数据库: {}", db_path);

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;
    tracing::info!(
        schema_version = ?db::read_schema_version(&conn)?,
        "数据库初始化完成"
    );

    let conn = Arc::new(Mutex::new(conn));

    // 组装仓储与 API
    let demand_repo = Arc::new(DemandRepository::new(conn.clone()));
    let step_repo = Arc::new(StepRepository::new(conn.clone()));
    let worker_repo = Arc::new(WorkerRepository::new(conn.clone()));
    let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone()));
    let run_repo = Arc::new(PlanningRunRepository::new(conn.clone()));
    let scenario_repo = Arc::new(ScenarioRepository::new(conn.clone()));
    let config_manager = Arc::new(
        ConfigManager::from_connection(conn.clone())
            .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?,
    );

    let _planning_api = PlanningApi::new(
        demand_repo.clone(),
        step_repo.clone(),
        worker_repo.clone(),
        schedule_repo,
        config_manager.clone(),
    );
    let _scenario_api = ScenarioApi::new(
        demand_repo,
        step_repo,
        worker_repo,
        run_repo,
        scenario_repo,
        config_manager,
    );

    tracing::info!("服务组装完成，API 就绪");
    Ok(())
}

// ==========================================
// 多方案对比 API 集成测试
// ==========================================
// 职责: 覆盖 轮次创建 → 多策略试算 → 指标对比 → 方案采纳 全流程
// ==========================================


use std::sync::Arc;

use chrono::NaiveTime;
use test_helpers::{create_test_db, make_demand, make_step, make_worker, march, open_test_connection};
use workshop_aps::api::error::ApiError;
use workshop_aps::api::scenario_api::ScenarioApi;
use workshop_aps::config::ConfigManager;
use workshop_aps::domain::types::{PlanningRunStatus, TaskStatus};
use workshop_aps::domain::ScheduleEntry;
use workshop_aps::engine::strategy::StrategyPreferences;
use workshop_aps::logging;
use workshop_aps::repository::{
    DemandRepository, PlanningRunRepository, ScenarioRepository, StepRepository, WorkerRepository,
};

struct TestContext {
    api: ScenarioApi,
}

/// 组装 API 并灌入基础数据: 2个需求 + 1道工序 + 2名费率不同的工人
fn setup() -> (tempfile::NamedTempFile, TestContext) {
    logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();

    let demand_repo = Arc::new(DemandRepository::new(conn.clone()));
    let step_repo = Arc::new(StepRepository::new(conn.clone()));
    let worker_repo = Arc::new(WorkerRepository::new(conn.clone()));
    let run_repo = Arc::new(PlanningRunRepository::new(conn.clone()));
    let scenario_repo = Arc::new(ScenarioRepository::new(conn.clone()));
    let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());

    demand_repo
        .create(&make_demand("D001", "P001", 800, march(10)))
        .unwrap();
    demand_repo
        .create(&make_demand("D002", "P001", 500, march(12)))
        .unwrap();
    step_repo.create(&make_step("S1", "P001", 1, 20.0)).unwrap();
    worker_repo.create(&make_worker("W1", 60.0)).unwrap();
    worker_repo.create(&make_worker("W2", 25.0)).unwrap();

    let api = ScenarioApi::new(
        demand_repo,
        step_repo,
        worker_repo,
        run_repo,
        scenario_repo,
        config_manager,
    );

    (temp_file, TestContext { api })
}

#[tokio::test]
async fn test_generate_compare_accept_flow() {
    let (_tmp, ctx) = setup();

    // 1. 创建轮次
    let run_id = ctx
        .api
        .create_run("三月上旬排产".to_string(), march(2), march(13))
        .unwrap();
    let run = ctx.api.get_run(&run_id).unwrap();
    assert_eq!(run.status, PlanningRunStatus::Draft);

    // 2. 两种策略试算
    let prefs = StrategyPreferences::default();
    let (s1_id, meet) = ctx
        .api
        .generate_scenario(&run_id, "meet_deadlines", &prefs)
        .await
        .unwrap();
    let (s2_id, cheap) = ctx
        .api
        .generate_scenario(&run_id, "minimize_cost", &prefs)
        .await
        .unwrap();

    // 首个方案使轮次进入待决状态
    let run = ctx.api.get_run(&run_id).unwrap();
    assert_eq!(run.status, PlanningRunStatus::Pending);

    // 3. 指标横向可比: 降成本方案人工成本不高于保交期方案
    assert!(cheap.metrics.total_labor_cost <= meet.metrics.total_labor_cost);
    // 降成本方案全程选低费率工人且无加班
    assert_eq!(cheap.metrics.total_overtime_hours, 0.0);
    for item in &cheap.items {
        assert!(item
            .entries
            .iter()
            .all(|e| e.worker_id.as_deref() == Some("W2")));
    }

    let scenarios = ctx.api.list_scenarios(&run_id).unwrap();
    assert_eq!(scenarios.len(), 2);
    assert!(scenarios.iter().all(|s| !s.is_accepted));

    // 4. 采纳降成本方案
    ctx.api
        .accept_scenario(&run_id, &s2_id, run.revision)
        .unwrap();

    let run = ctx.api.get_run(&run_id).unwrap();
    assert_eq!(run.status, PlanningRunStatus::Accepted);
    assert_eq!(run.accepted_scenario_id.as_deref(), Some(s2_id.as_str()));

    // 至多一个采纳方案
    let scenarios = ctx.api.list_scenarios(&run_id).unwrap();
    let accepted: Vec<_> = scenarios.iter().filter(|s| s.is_accepted).collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].scenario_id, s2_id);
    assert!(scenarios.iter().any(|s| s.scenario_id == s1_id && !s.is_accepted));

    // 5. 已采纳轮次不可再试算、不可重复采纳
    let err = ctx
        .api
        .generate_scenario(&run_id, "balanced", &prefs)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    let run = ctx.api.get_run(&run_id).unwrap();
    let err = ctx
        .api
        .accept_scenario(&run_id, &s2_id, run.revision)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_accept_with_stale_revision_conflicts() {
    let (_tmp, ctx) = setup();

    let run_id = ctx
        .api
        .create_run("并发冲突轮次".to_string(), march(2), march(13))
        .unwrap();
    let (scenario_id, _) = ctx
        .api
        .generate_scenario(&run_id, "balanced", &StrategyPreferences::default())
        .await
        .unwrap();

    // 调用方持有的是试算前读取的 revision=0, 而试算已使轮次流转(revision=1)
    let err = ctx
        .api
        .accept_scenario(&run_id, &scenario_id, 0)
        .unwrap_err();
    assert!(matches!(err, ApiError::OptimisticLockFailure(_)));

    // 冲突不产生部分写入: 轮次仍为待决, 方案也未被标记采纳
    let run = ctx.api.get_run(&run_id).unwrap();
    assert_eq!(run.status, PlanningRunStatus::Pending);
    assert!(run.accepted_scenario_id.is_none());
    let scenarios = ctx.api.list_scenarios(&run_id).unwrap();
    assert!(scenarios.iter().all(|s| !s.is_accepted));

    // 重读最新 revision 后重试成功
    ctx.api
        .accept_scenario(&run_id, &scenario_id, run.revision)
        .unwrap();
    let run = ctx.api.get_run(&run_id).unwrap();
    assert_eq!(run.status, PlanningRunStatus::Accepted);
}

#[tokio::test]
async fn test_generate_scenario_requires_demands_in_window() {
    let (_tmp, ctx) = setup();

    // 窗口避开全部需求交期
    let run_id = ctx
        .api
        .create_run("空窗口轮次".to_string(), march(20), march(27))
        .unwrap();
    let err = ctx
        .api
        .generate_scenario(&run_id, "balanced", &StrategyPreferences::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
}

#[tokio::test]
async fn test_validate_schedule_reports_time_conflict() {
    let (_tmp, ctx) = setup();

    let entry = |start: (u32, u32), end: (u32, u32)| ScheduleEntry {
        schedule_id: None,
        demand_id: "D001".to_string(),
        step_id: "S1".to_string(),
        plan_date: march(2),
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        planned_output: 100,
        worker_id: Some("W2".to_string()),
        is_overtime: false,
        status: TaskStatus::NotStarted,
        actual_output: None,
    };

    // 同一工人同日两条重叠明细 → 恰好一条时间冲突错误, 引用双方
    let entries = vec![entry((7, 0), (10, 0)), entry((9, 0), (11, 0))];
    let result = ctx.api.validate_schedule("P001", &entries).unwrap();

    let conflicts: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.field == "time_conflict")
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].entry_index, 0);
    assert_eq!(conflicts[0].related_index, Some(1));
    assert!(!result.is_savable());
}

// ==========================================
// 单需求排产 API 集成测试
// ==========================================
// 职责: 覆盖 试算预览 → 草稿 → 提交 → 执行回填 → 重排 全流程
// ==========================================


use std::sync::Arc;

use chrono::{NaiveTime, NaiveDateTime};
use test_helpers::{create_test_db, make_demand, make_step, make_worker, march, open_test_connection};
use workshop_aps::api::error::ApiError;
use workshop_aps::api::planning_api::{PlanningApi, PreviewRequest};
use workshop_aps::config::ConfigManager;
use workshop_aps::domain::types::{DemandStatus, TaskStatus};
use workshop_aps::domain::ScheduleEntry;
use workshop_aps::logging;
use workshop_aps::repository::{
    DemandRepository, ScheduleRepository, StepRepository, WorkerRepository,
};

struct TestContext {
    api: PlanningApi,
    demand_repo: Arc<DemandRepository>,
    schedule_repo: Arc<ScheduleRepository>,
}

/// 组装 API 并灌入基础数据: 1个需求 + 2道工序 + 1名工人
fn setup(quantity: i64, due_day: u32) -> (tempfile::NamedTempFile, TestContext) {
    logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();

    let demand_repo = Arc::new(DemandRepository::new(conn.clone()));
    let step_repo = Arc::new(StepRepository::new(conn.clone()));
    let worker_repo = Arc::new(WorkerRepository::new(conn.clone()));
    let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone()));
    let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());

    demand_repo
        .create(&make_demand("D001", "P001", quantity, march(due_day)))
        .unwrap();
    step_repo.create(&make_step("S1", "P001", 1, 10.0)).unwrap();
    step_repo.create(&make_step("S2", "P001", 2, 8.0)).unwrap();
    worker_repo.create(&make_worker("W1", 35.0)).unwrap();

    let api = PlanningApi::new(
        demand_repo.clone(),
        step_repo,
        worker_repo,
        schedule_repo.clone(),
        config_manager,
    );

    (
        temp_file,
        TestContext {
            api,
            demand_repo,
            schedule_repo,
        },
    )
}

fn preview_request(start_day: u32) -> PreviewRequest {
    PreviewRequest {
        start_date: march(start_day),
        efficiency_factor: None,
        allow_overtime: None,
        worker_ids: None,
    }
}

#[tokio::test]
async fn test_preview_draft_commit_flow() {
    let (_tmp, ctx) = setup(600, 31);

    // 1. 试算预览
    let preview = ctx
        .api
        .generate_preview("D001", &preview_request(2))
        .await
        .unwrap();
    assert!(!preview.entries.is_empty());
    assert!(preview.projection.is_on_track);
    let total: i64 = preview.entries.iter().map(|e| e.planned_output).sum();
    assert_eq!(total, 600 * 2); // 两道工序各 600

    // 2. 草稿往返
    ctx.api.save_draft("D001", &preview.entries).unwrap();
    let loaded = ctx.api.get_draft("D001").unwrap().unwrap();
    assert_eq!(loaded.len(), preview.entries.len());
    assert_eq!(loaded[0].planned_output, preview.entries[0].planned_output);

    // 3. 提交
    let schedule_id = ctx.api.commit("D001", &preview.entries).await.unwrap();

    // 需求状态流转为已排产
    let demand = ctx.demand_repo.find_by_id("D001").unwrap().unwrap();
    assert_eq!(demand.status, DemandStatus::Planned);

    // 明细落库，且成为该需求的最新计划
    let entries = ctx.schedule_repo.list_entries(&schedule_id).unwrap();
    assert_eq!(entries.len(), preview.entries.len());
    let latest = ctx
        .schedule_repo
        .find_latest_by_demand("D001")
        .unwrap()
        .unwrap();
    assert_eq!(latest.schedule_id, schedule_id);

    // 提交后草稿清理
    assert!(ctx.api.get_draft("D001").unwrap().is_none());
}

#[test]
fn test_demand_list_orders_high_priority_first() {
    let (_tmp, ctx) = setup(100, 31); // D001: priority=1, 交期 03-31

    // 优先级数字越大越优先；同级按交期升序
    let mut d2 = make_demand("D002", "P001", 100, march(20));
    d2.priority = 5;
    ctx.demand_repo.create(&d2).unwrap();
    let mut d3 = make_demand("D003", "P001", 100, march(10));
    d3.priority = 5;
    ctx.demand_repo.create(&d3).unwrap();

    let ids: Vec<String> = ctx
        .demand_repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|d| d.demand_id)
        .collect();
    assert_eq!(ids, vec!["D003", "D002", "D001"]);
}

#[tokio::test]
async fn test_preview_rejects_unknown_demand() {
    let (_tmp, ctx) = setup(100, 31);

    let err = ctx
        .api
        .generate_preview("D999", &preview_request(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_commit_rejects_conflicting_draft() {
    let (_tmp, ctx) = setup(600, 31);

    // 人工编辑出的冲突草稿: 同一工人同日时间重叠
    let mut base = ctx
        .api
        .generate_preview("D001", &preview_request(2))
        .await
        .unwrap()
        .entries;
    assert!(base.len() >= 2);
    base[1].plan_date = base[0].plan_date;
    base[1].start_time = base[0].start_time;
    base[1].end_time = NaiveTime::from_hms_opt(11, 0, 0).unwrap();

    let err = ctx.api.commit("D001", &base).await.unwrap_err();
    match err {
        ApiError::PlanValidationError { issues, .. } => {
            assert!(issues.iter().any(|i| i.field == "time_conflict"));
        }
        other => panic!("期望 PlanValidationError, 实际 {:?}", other),
    }

    // 校验失败不落库、不改需求状态
    let demand = ctx.demand_repo.find_by_id("D001").unwrap().unwrap();
    assert_eq!(demand.status, DemandStatus::Pending);
}

#[tokio::test]
async fn test_replan_after_partial_execution() {
    let (_tmp, ctx) = setup(600, 31);

    let preview = ctx
        .api
        .generate_preview("D001", &preview_request(2))
        .await
        .unwrap();
    let schedule_id = ctx.api.commit("D001", &preview.entries).await.unwrap();

    // 回填最终工序(S2)的一个块: 实际完成 200 件
    let entries = ctx.schedule_repo.list_entries(&schedule_id).unwrap();
    let s2_entry = entries.iter().find(|e| e.step_id == "S2").unwrap();
    ctx.schedule_repo
        .record_execution(
            &schedule_id,
            "S2",
            s2_entry.plan_date,
            s2_entry.start_time,
            TaskStatus::Completed,
            Some(200),
        )
        .unwrap();

    // 从周二 09:00 重排
    let now = NaiveDateTime::new(march(3), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    let result = ctx.api.replan(&schedule_id, now).await.unwrap();

    assert_eq!(result.completed_output, 200);
    assert_eq!(result.remaining_quantity, 400);

    // 草稿从"现在"起步且产出守恒于剩余数量（最终工序）
    let s2_total: i64 = result
        .draft_entries
        .iter()
        .filter(|e| e.step_id == "S2")
        .map(|e| e.planned_output)
        .sum();
    assert_eq!(s2_total, 400);
    assert!(result.draft_entries.iter().all(|e| e.plan_date >= march(3)));
}

#[tokio::test]
async fn test_commit_replan_optimistic_lock() {
    let (_tmp, ctx) = setup(600, 31);

    let preview = ctx
        .api
        .generate_preview("D001", &preview_request(2))
        .await
        .unwrap();
    let schedule_id = ctx.api.commit("D001", &preview.entries).await.unwrap();

    let replacement: Vec<ScheduleEntry> = preview.entries.clone();

    // 正确的 revision: 提交成功并抬升 revision
    ctx.api
        .commit_replan(&schedule_id, 0, &replacement)
        .unwrap();

    // 过期的 revision: 乐观锁冲突
    let err = ctx
        .api
        .commit_replan(&schedule_id, 0, &replacement)
        .unwrap_err();
    assert!(matches!(err, ApiError::OptimisticLockFailure(_)));

    let schedule = ctx.schedule_repo.find_by_id(&schedule_id).unwrap().unwrap();
    assert_eq!(schedule.revision, 1);
}

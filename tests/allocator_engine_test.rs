// ==========================================
// 引擎集成测试: 分配 → 投影 → 校验
// ==========================================
// 职责: 验证时间块分配、完成投影与草稿校验在真实
//       日历边界（午休/下班/周末/加班）下的协同行为
// ==========================================


use chrono::NaiveTime;
use test_helpers::{make_demand, make_step, make_worker, march};
use workshop_aps::engine::allocator::{AllocationSettings, TimeBlockAllocator};
use workshop_aps::engine::calendar::{CalendarConfig, WorkCalendar};
use workshop_aps::engine::projector::PlanProjector;
use workshop_aps::engine::validator::ScheduleValidator;
use workshop_aps::engine::worker_matcher::WorkerMatcher;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// ==========================================
// 多日溢出 + 周末跳过
// ==========================================
#[test]
fn test_multi_day_spill_skips_weekend() {
    let allocator = TimeBlockAllocator::default();
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];

    // 2000件 × 20s ≈ 11.1h > 单日8h，周五开工必然溢出到下周一
    let demand = make_demand("D001", "P001", 2000, march(31));
    let steps = vec![make_step("S1", "P001", 1, 20.0)];
    let settings = AllocationSettings::standard(march(6)); // 周五

    let result = allocator
        .allocate(&demand, &steps, &pool, &matcher, &settings)
        .unwrap();

    // 产出守恒
    let total: i64 = result.entries.iter().map(|e| e.planned_output).sum();
    assert_eq!(total, 2000);

    // 周六/周日无任何块
    assert!(result
        .entries
        .iter()
        .all(|e| e.plan_date != march(7) && e.plan_date != march(8)));

    // 溢出部分落在下周一
    assert!(result.entries.iter().any(|e| e.plan_date == march(9)));

    // 所有块不跨午休、不跨下班
    for e in &result.entries {
        assert!(
            e.end_time <= t(12, 0) || e.start_time >= t(12, 30),
            "时间块跨越午休: {:?}",
            e
        );
        assert!(e.end_time <= t(15, 30));
    }
}

// ==========================================
// 恰好填满一个工作日
// ==========================================
#[test]
fn test_exact_single_day_fit() {
    let allocator = TimeBlockAllocator::default();
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];

    // 1440件 × 20s = 480min = 一个完整工作日（07:00-12:00 + 12:30-15:30）
    let demand = make_demand("D001", "P001", 1440, march(31));
    let steps = vec![make_step("S1", "P001", 1, 20.0)];
    let settings = AllocationSettings::standard(march(2)); // 周一

    let result = allocator
        .allocate(&demand, &steps, &pool, &matcher, &settings)
        .unwrap();

    assert!(result.entries.iter().all(|e| e.plan_date == march(2)));
    assert_eq!(result.entries.last().unwrap().end_time, t(15, 30));

    let total: i64 = result.entries.iter().map(|e| e.planned_output).sum();
    assert_eq!(total, 1440);
}

// ==========================================
// 效率系数拉长工期
// ==========================================
#[test]
fn test_efficiency_factor_extends_duration() {
    let allocator = TimeBlockAllocator::default();
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];
    let demand = make_demand("D001", "P001", 1000, march(31));
    let steps = vec![make_step("S1", "P001", 1, 20.0)];

    let standard = allocator
        .allocate(
            &demand,
            &steps,
            &pool,
            &matcher,
            &AllocationSettings::standard(march(2)),
        )
        .unwrap();

    let mut slow_settings = AllocationSettings::standard(march(2));
    slow_settings.efficiency_factor = 80.0; // 新手班组
    let slow = allocator
        .allocate(&demand, &steps, &pool, &matcher, &slow_settings)
        .unwrap();

    // 80% 效率下完成时刻必然更晚
    assert!(slow.end_cursor > standard.end_cursor);

    // 两种效率下产出均守恒
    let sum_std: i64 = standard.entries.iter().map(|e| e.planned_output).sum();
    let sum_slow: i64 = slow.entries.iter().map(|e| e.planned_output).sum();
    assert_eq!(sum_std, 1000);
    assert_eq!(sum_slow, 1000);
}

// ==========================================
// 加班窗口受显式上限约束
// ==========================================
#[test]
fn test_overtime_respects_configured_ceiling() {
    // 加班上限 60 分钟 → 加班块不得超过 16:30
    let calendar = WorkCalendar::new(CalendarConfig {
        max_overtime_minutes: Some(60),
        ..CalendarConfig::default()
    });
    let allocator = TimeBlockAllocator::new(calendar);
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];

    let demand = make_demand("D001", "P001", 2000, march(31));
    let steps = vec![make_step("S1", "P001", 1, 20.0)];
    let mut settings = AllocationSettings::standard(march(2));
    settings.allow_overtime = true;

    let result = allocator
        .allocate(&demand, &steps, &pool, &matcher, &settings)
        .unwrap();

    let overtime_blocks: Vec<_> = result.entries.iter().filter(|e| e.is_overtime).collect();
    assert!(!overtime_blocks.is_empty());
    for e in &overtime_blocks {
        assert!(e.start_time >= t(15, 30));
        assert!(e.end_time <= t(16, 30));
    }
}

// ==========================================
// 分配 → 投影 联动: 逾期判定
// ==========================================
#[test]
fn test_projection_flags_late_completion() {
    let allocator = TimeBlockAllocator::default();
    let projector = PlanProjector::default();
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];

    // 2000件 × 20s 约 1.4 个工作日，但交期就是开工当天
    let demand = make_demand("D001", "P001", 2000, march(2));
    let steps = vec![make_step("S1", "P001", 1, 20.0)];
    let settings = AllocationSettings::standard(march(2));

    let result = allocator
        .allocate(&demand, &steps, &pool, &matcher, &settings)
        .unwrap();
    let projection = projector.project(
        &demand,
        &steps,
        &result.entries,
        &pool,
        allocator.calendar().config(),
    );

    assert!(!projection.is_on_track);
    assert!(projection.days_over >= 1);

    // 时间线累计产出单调且收敛于总量
    let mut prev = 0;
    for point in &projection.timeline {
        assert!(point.cumulative_output >= prev);
        prev = point.cumulative_output;
    }
    assert_eq!(prev, 2000);
}

// ==========================================
// 分配 → 校验 联动: 引擎产物天然合规
// ==========================================
#[test]
fn test_allocator_output_passes_validation() {
    let allocator = TimeBlockAllocator::default();
    let matcher = WorkerMatcher::new(&[], &[]);
    let pool = vec![make_worker("W1", 35.0)];

    let demand = make_demand("D001", "P001", 900, march(31));
    let steps = vec![
        make_step("S1", "P001", 1, 10.0),
        make_step("S2", "P001", 2, 8.0),
    ];
    let settings = AllocationSettings::standard(march(2));

    let result = allocator
        .allocate(&demand, &steps, &pool, &matcher, &settings)
        .unwrap();

    // 工序串行: S2 所有块不早于 S1 最后一块
    let s1_end = result
        .entries
        .iter()
        .filter(|e| e.step_id == "S1")
        .map(|e| e.end_datetime())
        .max()
        .unwrap();
    for e in result.entries.iter().filter(|e| e.step_id == "S2") {
        assert!(e.start_datetime() >= s1_end);
    }

    // 引擎产物通过草稿校验（无错误、无告警）
    let validation = ScheduleValidator::new().validate(&result.entries, &steps, &pool, &matcher);
    assert!(validation.errors.is_empty());
    assert!(validation.warnings.is_empty());
}

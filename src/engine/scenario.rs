// ==========================================
// 车间生产排产系统 - 方案生成引擎
// ==========================================
// 职责: 对一批需求按选定策略逐项执行 分配→投影，
//       并聚合为可横向对比的方案指标
// 红线: 聚合满足结合律——方案总工时等于各需求项独立计算之和
// ==========================================

use crate::domain::demand::DemandEntry;
use crate::domain::product::ProductStep;
use crate::domain::scenario::ScenarioMetrics;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::worker::Worker;
use crate::engine::allocator::{AllocationSettings, TimeBlockAllocator};
use crate::engine::projector::{PlanProjection, PlanProjector};
use crate::engine::strategy::{PlanningStrategy, StrategyPreferences};
use crate::engine::worker_matcher::WorkerMatcher;
use crate::engine::EngineError;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

// ==========================================
// DemandPlanOutcome - 单个需求的试算结果
// ==========================================
#[derive(Debug, Clone)]
pub struct DemandPlanOutcome {
    pub demand_id: String,
    pub entries: Vec<ScheduleEntry>,
    pub projection: PlanProjection,
    pub metrics: ScenarioMetrics, // 单项指标（聚合前）
}

// ==========================================
// ScenarioOutcome - 方案试算结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub strategy: PlanningStrategy,
    pub items: Vec<DemandPlanOutcome>,
    pub metrics: ScenarioMetrics, // 跨需求聚合指标
}

// ==========================================
// ScenarioGenerator - 方案生成引擎
// ==========================================
pub struct ScenarioGenerator {
    allocator: TimeBlockAllocator,
    projector: PlanProjector,
}

impl ScenarioGenerator {
    pub fn new(allocator: TimeBlockAllocator, projector: PlanProjector) -> Self {
        Self {
            allocator,
            projector,
        }
    }

    /// 按策略为一批需求生成方案
    ///
    /// # 参数
    /// - `demands`: 需求集合
    /// - `steps_by_product`: 产品ID → 工序序列
    /// - `pool` / `matcher`: 候选工人与匹配引擎
    /// - `strategy` / `prefs`: 策略标签与偏好参数
    /// - `start_date`: 计划窗口起始
    #[instrument(skip_all, fields(
        strategy = strategy.as_str(),
        demands_count = demands.len(),
        start_date = %start_date,
    ))]
    pub fn generate(
        &self,
        demands: &[DemandEntry],
        steps_by_product: &HashMap<String, Vec<ProductStep>>,
        pool: &[Worker],
        matcher: &WorkerMatcher,
        strategy: PlanningStrategy,
        prefs: &StrategyPreferences,
        start_date: NaiveDate,
    ) -> Result<ScenarioOutcome, EngineError> {
        info!("开始方案试算");

        let mut items = Vec::with_capacity(demands.len());
        let mut aggregate = ScenarioMetrics::zero();

        for demand in demands {
            let steps = steps_by_product
                .get(&demand.product_id)
                .map(|s| s.as_slice())
                .unwrap_or(&[]);

            let outcome =
                self.plan_single(demand, steps, pool, matcher, strategy, prefs, start_date)?;

            aggregate.absorb(&outcome.metrics);
            items.push(outcome);
        }

        info!(
            total_labor_hours = aggregate.total_labor_hours,
            deadlines_met = aggregate.deadlines_met,
            deadlines_missed = aggregate.deadlines_missed,
            "方案试算完成"
        );

        Ok(ScenarioOutcome {
            strategy,
            items,
            metrics: aggregate,
        })
    }

    /// 单个需求的 分配→投影（balanced 策略含逾期重试）
    #[allow(clippy::too_many_arguments)]
    fn plan_single(
        &self,
        demand: &DemandEntry,
        steps: &[ProductStep],
        pool: &[Worker],
        matcher: &WorkerMatcher,
        strategy: PlanningStrategy,
        prefs: &StrategyPreferences,
        start_date: NaiveDate,
    ) -> Result<DemandPlanOutcome, EngineError> {
        let settings = strategy.resolve(start_date, prefs);

        let entries = self.allocate_with_batching(demand, steps, pool, matcher, &settings, prefs)?;
        let mut projection =
            self.projector
                .project(demand, steps, &entries, pool, self.allocator.calendar().config());

        let mut final_entries = entries;

        // balanced: 仅对逾期风险项放开加班重试一次
        if strategy == PlanningStrategy::Balanced && !projection.is_on_track {
            debug!(demand_id = %demand.demand_id, "均衡策略: 项目逾期，启用加班重试");
            let mut ot_settings = settings.clone();
            ot_settings.allow_overtime = true;
            let retry =
                self.allocate_with_batching(demand, steps, pool, matcher, &ot_settings, prefs)?;
            projection = self.projector.project(
                demand,
                steps,
                &retry,
                pool,
                self.allocator.calendar().config(),
            );
            final_entries = retry;
        }

        let metrics = ScenarioMetrics {
            total_labor_hours: projection.costs.labor_hours,
            total_overtime_hours: projection.costs.overtime_hours,
            total_labor_cost: projection.costs.labor_cost,
            total_equipment_cost: projection.costs.equipment_cost,
            deadlines_met: if projection.is_on_track { 1 } else { 0 },
            deadlines_missed: if projection.is_on_track { 0 } else { 1 },
            latest_completion: projection.projected_completion,
        };

        Ok(DemandPlanOutcome {
            demand_id: demand.demand_id.clone(),
            entries: final_entries,
            projection,
            metrics,
        })
    }

    /// 按批量上下界拆分分配（custom 策略的拆单语义）
    ///
    /// 超出 max_batch_size 的需求拆为顺序批次，后一批从前一批
    /// 结束游标继续；尾批不足 min_batch_size 时并入前一批
    fn allocate_with_batching(
        &self,
        demand: &DemandEntry,
        steps: &[ProductStep],
        pool: &[Worker],
        matcher: &WorkerMatcher,
        settings: &AllocationSettings,
        prefs: &StrategyPreferences,
    ) -> Result<Vec<ScheduleEntry>, EngineError> {
        let max_batch = prefs.max_batch_size.filter(|&m| m > 0 && m < demand.quantity);
        let max_batch = match max_batch {
            Some(m) => m,
            None => {
                return Ok(self
                    .allocator
                    .allocate(demand, steps, pool, matcher, settings)?
                    .entries);
            }
        };
        let min_batch = prefs.min_batch_size.unwrap_or(1).max(1);

        // 批次切分
        let mut batch_sizes = Vec::new();
        let mut left = demand.quantity;
        while left > 0 {
            let take = left.min(max_batch);
            let rest = left - take;
            if rest > 0 && rest < min_batch {
                // 尾批不足下界则并入当前批
                batch_sizes.push(left);
                break;
            }
            batch_sizes.push(take);
            left = rest;
        }

        let mut entries = Vec::new();
        let mut batch_settings = settings.clone();
        for (i, size) in batch_sizes.iter().enumerate() {
            let mut batch_demand = demand.clone();
            batch_demand.quantity = *size;
            let result =
                self.allocator
                    .allocate(&batch_demand, steps, pool, matcher, &batch_settings)?;
            entries.extend(result.entries);

            // 下一批从本批结束游标继续
            if i + 1 < batch_sizes.len() {
                batch_settings.start_date = result.end_cursor.date();
                batch_settings.start_time = Some(result.end_cursor.time());
            }
        }
        Ok(entries)
    }
}

impl Default for ScenarioGenerator {
    fn default() -> Self {
        Self::new(TimeBlockAllocator::default(), PlanProjector::default())
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DemandStatus, WorkerStatus};
    use chrono::Utc;

    fn demand(id: &str, quantity: i64, due: NaiveDate) -> DemandEntry {
        DemandEntry {
            demand_id: id.to_string(),
            product_id: "P001".to_string(),
            quantity,
            due_date: due,
            priority: 1,
            status: DemandStatus::Pending,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    fn step(id: &str, seq: i32, seconds: f64) -> ProductStep {
        ProductStep {
            step_id: id.to_string(),
            product_id: "P001".to_string(),
            sequence_index: seq,
            seconds_per_piece: seconds,
            skill_category: None,
            equipment_id: None,
            equipment_hourly_cost: None,
            dependencies: vec![],
        }
    }

    fn worker(id: &str, cost: f64) -> Worker {
        Worker {
            worker_id: id.to_string(),
            name: format!("工人{}", id),
            skill_category: None,
            hourly_cost: cost,
            status: WorkerStatus::Active,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn steps_map(steps: Vec<ProductStep>) -> HashMap<String, Vec<ProductStep>> {
        let mut m = HashMap::new();
        m.insert("P001".to_string(), steps);
        m
    }

    #[test]
    fn test_aggregation_is_associative() {
        let generator = ScenarioGenerator::default();
        let matcher = WorkerMatcher::new(&[], &[]);
        let pool = vec![worker("W1", 35.0)];
        let steps = steps_map(vec![step("S1", 1, 20.0)]);
        let demands = vec![demand("D1", 500, d(31)), demand("D2", 300, d(31))];

        let combined = generator
            .generate(&demands, &steps, &pool, &matcher, PlanningStrategy::MeetDeadlines, &StrategyPreferences::default(), d(2))
            .unwrap();

        // 方案总工时 = 各需求项独立工时之和
        let item_sum: f64 = combined.items.iter().map(|i| i.metrics.total_labor_hours).sum();
        assert!((combined.metrics.total_labor_hours - item_sum).abs() < 1e-9);
        assert_eq!(
            combined.metrics.deadlines_met + combined.metrics.deadlines_missed,
            2
        );
    }

    #[test]
    fn test_minimize_cost_picks_cheapest_worker() {
        let generator = ScenarioGenerator::default();
        let matcher = WorkerMatcher::new(&[], &[]);
        let pool = vec![worker("W1", 60.0), worker("W2", 25.0)];
        let steps = steps_map(vec![step("S1", 1, 20.0)]);
        let demands = vec![demand("D1", 100, d(31))];

        let outcome = generator
            .generate(&demands, &steps, &pool, &matcher, PlanningStrategy::MinimizeCost, &StrategyPreferences::default(), d(2))
            .unwrap();

        assert!(outcome.items[0]
            .entries
            .iter()
            .all(|e| e.worker_id.as_deref() == Some("W2")));
        // 降成本策略禁止加班
        assert_eq!(outcome.metrics.total_overtime_hours, 0.0);
    }

    #[test]
    fn test_balanced_enables_overtime_only_when_at_risk() {
        let generator = ScenarioGenerator::default();
        let matcher = WorkerMatcher::new(&[], &[]);
        let pool = vec![worker("W1", 35.0)];
        let steps = steps_map(vec![step("S1", 1, 20.0)]);

        // 宽松交期: 不触发加班
        let relaxed = vec![demand("D1", 500, d(31))];
        let outcome = generator
            .generate(&relaxed, &steps, &pool, &matcher, PlanningStrategy::Balanced, &StrategyPreferences::default(), d(2))
            .unwrap();
        assert_eq!(outcome.metrics.total_overtime_hours, 0.0);

        // 紧交期: 2700件×20s = 15h > 一个工作日(8h)，交期当日 → 加班重试
        let tight = vec![demand("D2", 2700, d(2))];
        let outcome = generator
            .generate(&tight, &steps, &pool, &matcher, PlanningStrategy::Balanced, &StrategyPreferences::default(), d(2))
            .unwrap();
        assert!(outcome.metrics.total_overtime_hours > 0.0);
    }

    #[test]
    fn test_custom_batch_splitting_preserves_quantity() {
        let generator = ScenarioGenerator::default();
        let matcher = WorkerMatcher::new(&[], &[]);
        let pool = vec![worker("W1", 35.0)];
        let steps = steps_map(vec![step("S1", 1, 20.0)]);
        let demands = vec![demand("D1", 500, d(31))];

        let prefs = StrategyPreferences {
            max_batch_size: Some(200),
            min_batch_size: Some(50),
            ..Default::default()
        };
        let outcome = generator
            .generate(&demands, &steps, &pool, &matcher, PlanningStrategy::Custom, &prefs, d(2))
            .unwrap();

        // 拆批不改变总量
        let total: i64 = outcome.items[0].entries.iter().map(|e| e.planned_output).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn test_missing_product_steps_yields_empty_plan() {
        let generator = ScenarioGenerator::default();
        let matcher = WorkerMatcher::new(&[], &[]);
        let pool = vec![worker("W1", 35.0)];
        let demands = vec![demand("D1", 100, d(31))];

        let outcome = generator
            .generate(&demands, &HashMap::new(), &pool, &matcher, PlanningStrategy::Balanced, &StrategyPreferences::default(), d(2))
            .unwrap();

        assert!(outcome.items[0].entries.is_empty());
        // 无块时视为按期（无可逾期的投影）
        assert_eq!(outcome.metrics.deadlines_met, 1);
    }
}

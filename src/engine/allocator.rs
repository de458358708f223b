// ==========================================
// 车间生产排产系统 - 时间块分配引擎
// ==========================================
// 职责: 贪心装箱核心——沿工序序列把所需工时切分为
//       跨日期的离散时间块，并逐块指派工人
// 红线: 每个工序的块产出之和必须精确等于需求数量
//       （尾块吸收余量，只封顶不丢弃）
// 红线: 工序严格串行——后序工序不得早于前序游标开始
// ==========================================

use crate::domain::demand::DemandEntry;
use crate::domain::product::ProductStep;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::types::TaskStatus;
use crate::domain::worker::Worker;
use crate::engine::calendar::WorkCalendar;
use crate::engine::dependency::check_dependencies;
use crate::engine::worker_matcher::WorkerMatcher;
use crate::engine::EngineError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, instrument};

// ==========================================
// AllocationSettings - 分配参数
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationSettings {
    pub efficiency_factor: f64,            // 效率系数（百分数，100 = 标准）
    pub start_date: NaiveDate,             // 起始日期（落在周末时顺延）
    pub start_time: Option<NaiveTime>,     // 起始时刻（默认早班开始；重排"从现在起"使用）
    pub allow_overtime: bool,              // 是否允许加班窗口
    pub worker_ids: Option<Vec<String>>,   // 限定候选工人池（人工指定）
    pub prefer_cheapest_worker: bool,      // 成本优先选人（minimize_cost 策略）
}

impl AllocationSettings {
    pub fn standard(start_date: NaiveDate) -> Self {
        Self {
            efficiency_factor: 100.0,
            start_date,
            start_time: None,
            allow_overtime: false,
            worker_ids: None,
            prefer_cheapest_worker: false,
        }
    }
}

// ==========================================
// AllocationResult - 分配结果
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationResult {
    pub entries: Vec<ScheduleEntry>, // 生成的时间块（工序序）
    pub end_cursor: NaiveDateTime,   // 最后一个工序结束后的游标
}

// ==========================================
// TimeBlockAllocator - 时间块分配引擎
// ==========================================
pub struct TimeBlockAllocator {
    calendar: WorkCalendar,
}

impl TimeBlockAllocator {
    pub fn new(calendar: WorkCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    /// 为一个需求在给定工序序列上生成时间块
    ///
    /// 规则（按工序序列逐个处理）:
    /// 1) 调整单件工时 = 标准秒 ÷ (效率系数/100)，总需工时 = 调整秒 × 数量
    /// 2) 反复消耗日历窗口（上午/下午/加班），当日无窗口则滚动到次日早班
    /// 3) 每块消耗 min(窗口时长, 剩余所需时长)
    /// 4) 块产出 = ceil(块时长 / 总时长 × 数量)，封顶到该工序剩余数量
    /// 5) 游标恰落午休开始则跳到午休结束；到下班则滚动到次个工作日早班
    /// 6) 工序串行：下一工序从当前游标的日期/时刻继续
    #[instrument(skip(self, demand, steps, pool, matcher), fields(
        demand_id = %demand.demand_id,
        quantity = demand.quantity,
        steps_count = steps.len(),
        start_date = %settings.start_date,
        allow_overtime = settings.allow_overtime,
    ))]
    pub fn allocate(
        &self,
        demand: &DemandEntry,
        steps: &[ProductStep],
        pool: &[Worker],
        matcher: &WorkerMatcher,
        settings: &AllocationSettings,
    ) -> Result<AllocationResult, EngineError> {
        if demand.quantity <= 0 {
            return Err(EngineError::InvalidQuantity {
                demand_id: demand.demand_id.clone(),
                quantity: demand.quantity,
            });
        }

        // 排产前显式环路检测，禁止进入分配循环
        check_dependencies(steps)?;

        // 依赖序 = 顺序序
        let mut ordered: Vec<&ProductStep> = steps.iter().collect();
        ordered.sort_by_key(|s| s.sequence_index);

        // 人工限定候选池
        let restricted_pool: Vec<Worker> = match &settings.worker_ids {
            Some(ids) => pool
                .iter()
                .filter(|w| ids.iter().any(|id| id == &w.worker_id))
                .cloned()
                .collect(),
            None => pool.to_vec(),
        };

        let mut entries: Vec<ScheduleEntry> = Vec::new();
        let mut cursor_date = WorkCalendar::align_to_workday(settings.start_date);
        let mut cursor_time = match settings.start_time {
            // 周末顺延后起始时刻退回早班开始
            Some(t) if cursor_date == settings.start_date => t,
            _ => self.calendar.config().morning_start,
        };

        for step in ordered {
            let (date, time) = self.allocate_step(
                demand,
                step,
                &restricted_pool,
                matcher,
                settings,
                cursor_date,
                cursor_time,
                &mut entries,
            )?;
            cursor_date = date;
            cursor_time = time;
        }

        debug!(entries_count = entries.len(), "时间块分配完成");

        Ok(AllocationResult {
            entries,
            end_cursor: cursor_date.and_time(cursor_time),
        })
    }

    /// 分配单个工序，返回结束后的游标
    #[allow(clippy::too_many_arguments)]
    fn allocate_step(
        &self,
        demand: &DemandEntry,
        step: &ProductStep,
        pool: &[Worker],
        matcher: &WorkerMatcher,
        settings: &AllocationSettings,
        mut cursor_date: NaiveDate,
        mut cursor_time: NaiveTime,
        entries: &mut Vec<ScheduleEntry>,
    ) -> Result<(NaiveDate, NaiveTime), EngineError> {
        let quantity = demand.quantity;
        let adjusted_secs = step.adjusted_seconds_per_piece(settings.efficiency_factor);
        let total_secs = adjusted_secs * quantity as f64;

        // 退化工时守卫：总工时不足半秒（含零）的工序发出单个
        // 零时长块承载全部数量，阈值与消耗循环的 0.5 秒对齐，
        // 绝不进入窗口消耗循环
        if total_secs <= 0.5 {
            let worker = self.pick_worker(step, pool, matcher, settings);
            entries.push(ScheduleEntry {
                schedule_id: None,
                demand_id: demand.demand_id.clone(),
                step_id: step.step_id.clone(),
                plan_date: cursor_date,
                start_time: cursor_time,
                end_time: cursor_time,
                planned_output: quantity,
                worker_id: worker.map(|w| w.worker_id),
                is_overtime: false,
                status: TaskStatus::NotStarted,
                actual_output: None,
            });
            return Ok((cursor_date, cursor_time));
        }

        let mut remaining_qty = quantity;
        let mut secs_left = total_secs;
        let step_entry_start = entries.len();

        while remaining_qty > 0 && secs_left > 0.5 {
            let window = match self.calendar.window_from(cursor_time, settings.allow_overtime) {
                Some(w) => w,
                None => {
                    // 当日无剩余产能，滚动到次个工作日早班
                    cursor_date = WorkCalendar::next_workday(cursor_date);
                    cursor_time = self.calendar.config().morning_start;
                    continue;
                }
            };

            // 窗口按秒计量；不足一秒的窗口直接滚到窗口终点
            let window_secs = window.seconds() as f64;
            if window_secs < 1.0 {
                cursor_time = self.calendar.normalize_cursor(window.end);
                continue;
            }
            let consume_secs = secs_left.min(window_secs);
            let block_secs = (consume_secs.round() as i64).max(1);

            // 块产出 = ceil(块时长/总时长 × 数量)，封顶到剩余
            let raw_output = (consume_secs / total_secs * quantity as f64).ceil() as i64;
            let output = raw_output.min(remaining_qty);

            let start_time = window.start;
            let end_time = start_time + Duration::seconds(block_secs);
            let worker = self.pick_worker(step, pool, matcher, settings);

            entries.push(ScheduleEntry {
                schedule_id: None,
                demand_id: demand.demand_id.clone(),
                step_id: step.step_id.clone(),
                plan_date: cursor_date,
                start_time,
                end_time,
                planned_output: output,
                worker_id: worker.map(|w| w.worker_id),
                is_overtime: window.is_overtime,
                status: TaskStatus::NotStarted,
                actual_output: None,
            });

            remaining_qty -= output;
            secs_left -= consume_secs;
            cursor_time = self.calendar.normalize_cursor(end_time);
        }

        // 浮点残差守卫：余量只封顶不丢弃，全部落到尾块
        if remaining_qty > 0 {
            if let Some(last) = entries.last_mut() {
                if last.step_id == step.step_id {
                    last.planned_output += remaining_qty;
                    remaining_qty = 0;
                }
            }
        }
        debug_assert_eq!(remaining_qty, 0);
        debug_assert!(entries[step_entry_start..]
            .iter()
            .map(|e| e.planned_output)
            .sum::<i64>() == quantity);

        Ok((cursor_date, cursor_time))
    }

    /// 按策略挑选工人；无合格工人时返回 None（块仍然发出，不视为告警）
    fn pick_worker(
        &self,
        step: &ProductStep,
        pool: &[Worker],
        matcher: &WorkerMatcher,
        settings: &AllocationSettings,
    ) -> Option<Worker> {
        if settings.prefer_cheapest_worker {
            matcher.cheapest_worker(step, pool)
        } else {
            matcher.best_worker(step, pool)
        }
    }
}

impl Default for TimeBlockAllocator {
    fn default() -> Self {
        Self::new(WorkCalendar::default())
    }
}

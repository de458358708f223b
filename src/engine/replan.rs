// ==========================================
// 车间生产排产系统 - 重排引擎
// ==========================================
// 职责: 围绕实际执行进度重新生成剩余工作的计划，
//       并在交期有风险时给出加班建议块
// 红线: 草稿本身是完整（可能逾期）的计划——
//       调用方接受或拒绝加班建议都不破坏草稿完整性
// ==========================================

use crate::domain::demand::DemandEntry;
use crate::domain::product::ProductStep;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::worker::Worker;
use crate::engine::allocator::{AllocationSettings, TimeBlockAllocator};
use crate::engine::projector::PlanProjector;
use crate::engine::worker_matcher::WorkerMatcher;
use crate::engine::EngineError;
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument};

// ==========================================
// ReplanResult - 重排结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ReplanResult {
    pub completed_output: i64,                   // 已完成产出（最终工序实际产出之和）
    pub remaining_quantity: i64,                 // 剩余待排数量
    pub draft_entries: Vec<ScheduleEntry>,       // 常规时段草稿块
    pub overtime_suggestions: Vec<ScheduleEntry>, // 加班建议块（仅放开加班才出现的块）
}

// ==========================================
// ReplanEngine - 重排引擎
// ==========================================
pub struct ReplanEngine {
    allocator: TimeBlockAllocator,
    projector: PlanProjector,
}

impl ReplanEngine {
    pub fn new(allocator: TimeBlockAllocator, projector: PlanProjector) -> Self {
        Self {
            allocator,
            projector,
        }
    }

    /// 基于实际进度重排剩余数量
    ///
    /// 规则:
    /// 1) 已完成 = 最终工序各块实际产出之和，剩余 = 总量 − 已完成
    /// 2) 从 now 起（跳过周末）为剩余数量重新分配，不加班 → 草稿
    /// 3) 草稿逾期时再做一轮放开加班的分配，
    ///    其中的加班块作为建议，供调用方逐块采纳后提交
    #[instrument(skip(self, demand, steps, executed_entries, pool, matcher), fields(
        demand_id = %demand.demand_id,
        executed_count = executed_entries.len(),
        now = %now,
    ))]
    pub fn replan(
        &self,
        demand: &DemandEntry,
        steps: &[ProductStep],
        executed_entries: &[ScheduleEntry],
        pool: &[Worker],
        matcher: &WorkerMatcher,
        now: NaiveDateTime,
        settings: &AllocationSettings,
    ) -> Result<ReplanResult, EngineError> {
        let final_step_id = steps
            .iter()
            .max_by_key(|s| s.sequence_index)
            .map(|s| s.step_id.clone());

        let completed_output: i64 = executed_entries
            .iter()
            .filter(|e| Some(&e.step_id) == final_step_id.as_ref())
            .filter_map(|e| e.actual_output)
            .sum();

        let remaining_quantity = (demand.quantity - completed_output).max(0);
        info!(completed_output, remaining_quantity, "重排: 计算剩余工作量");

        if remaining_quantity == 0 {
            return Ok(ReplanResult {
                completed_output,
                remaining_quantity,
                draft_entries: Vec::new(),
                overtime_suggestions: Vec::new(),
            });
        }

        let mut remaining_demand = demand.clone();
        remaining_demand.quantity = remaining_quantity;

        let mut draft_settings = settings.clone();
        draft_settings.start_date = now.date();
        draft_settings.start_time = Some(now.time());
        draft_settings.allow_overtime = false;

        let draft = self
            .allocator
            .allocate(&remaining_demand, steps, pool, matcher, &draft_settings)?;
        let projection = self.projector.project(
            &remaining_demand,
            steps,
            &draft.entries,
            pool,
            self.allocator.calendar().config(),
        );

        // 草稿可按期则无需加班建议
        let overtime_suggestions = if projection.is_on_track {
            Vec::new()
        } else {
            debug!(demand_id = %demand.demand_id, "重排草稿逾期，生成加班建议");
            let mut ot_settings = draft_settings.clone();
            ot_settings.allow_overtime = true;
            let ot_run = self
                .allocator
                .allocate(&remaining_demand, steps, pool, matcher, &ot_settings)?;
            ot_run
                .entries
                .into_iter()
                .filter(|e| e.is_overtime)
                .collect()
        };

        Ok(ReplanResult {
            completed_output,
            remaining_quantity,
            draft_entries: draft.entries,
            overtime_suggestions,
        })
    }
}

impl Default for ReplanEngine {
    fn default() -> Self {
        Self::new(TimeBlockAllocator::default(), PlanProjector::default())
    }
}

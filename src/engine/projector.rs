// ==========================================
// 车间生产排产系统 - 计划投影引擎
// ==========================================
// 职责: 把时间块聚合为按日累计产出时间线，推算完成时刻、
//       按期状态与人工/设备成本估算
// 红线: 只有最终工序的产出计入"成品"——中间工序是在制品
// ==========================================

use crate::domain::demand::DemandEntry;
use crate::domain::product::ProductStep;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::worker::Worker;
use crate::engine::calendar::CalendarConfig;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 候选池为空时的兜底小时费率
pub const DEFAULT_HOURLY_RATE: f64 = 35.0;

// ==========================================
// DailyOutputPoint - 按日产出点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutputPoint {
    pub date: NaiveDate,         // 日期
    pub daily_output: i64,       // 当日成品产出（仅最终工序）
    pub cumulative_output: i64,  // 累计成品产出
    pub percent_complete: f64,   // 完成百分比 (0.0-100.0)
}

// ==========================================
// CostEstimate - 成本估算
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub labor_hours: f64,     // 总工时（小时，含加班）
    pub overtime_hours: f64,  // 加班工时（小时）
    pub labor_cost: f64,      // 人工成本
    pub equipment_cost: f64,  // 设备成本（均摊近似）
}

// ==========================================
// PlanProjection - 计划投影
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanProjection {
    pub timeline: Vec<DailyOutputPoint>,            // 按日累计时间线
    pub projected_completion: Option<NaiveDateTime>, // 预计完成时刻（最终工序尾块）
    pub is_on_track: bool,                          // 是否按期（≤交期常规下班）
    pub days_over: i64,                             // 超期天数（负数表示提前）
    pub costs: CostEstimate,                        // 成本估算
}

// ==========================================
// PlanProjector - 计划投影引擎
// ==========================================
pub struct PlanProjector {
    default_hourly_rate: f64,
}

impl PlanProjector {
    pub fn new(default_hourly_rate: f64) -> Self {
        Self { default_hourly_rate }
    }

    /// 投影一个需求的时间块集合
    ///
    /// # 参数
    /// - `demand`: 需求条目（提供数量与交期）
    /// - `steps`: 工序序列（确定最终工序与设备成本）
    /// - `entries`: 分配器产出的时间块
    /// - `pool`: 候选工人池（人工成本取池内均价）
    /// - `calendar`: 工作日边界（按期判定使用配置的常规下班时刻）
    pub fn project(
        &self,
        demand: &DemandEntry,
        steps: &[ProductStep],
        entries: &[ScheduleEntry],
        pool: &[Worker],
        calendar: &CalendarConfig,
    ) -> PlanProjection {
        let final_step_id = steps
            .iter()
            .max_by_key(|s| s.sequence_index)
            .map(|s| s.step_id.clone());

        // 按日聚合最终工序产出（BTreeMap 保证日期升序）
        let mut daily: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for e in entries {
            if Some(&e.step_id) == final_step_id.as_ref() {
                *daily.entry(e.plan_date).or_insert(0) += e.planned_output;
            }
        }

        let mut timeline = Vec::with_capacity(daily.len());
        let mut cumulative = 0i64;
        for (date, output) in daily {
            cumulative += output;
            let percent = if demand.quantity > 0 {
                cumulative as f64 / demand.quantity as f64 * 100.0
            } else {
                0.0
            };
            timeline.push(DailyOutputPoint {
                date,
                daily_output: output,
                cumulative_output: cumulative,
                percent_complete: percent,
            });
        }

        // 预计完成 = 最终工序尾块的结束时刻
        let projected_completion = entries
            .iter()
            .filter(|e| Some(&e.step_id) == final_step_id.as_ref())
            .map(|e| e.end_datetime())
            .max();

        // 按期判定与超期天数都以交期当日的常规下班为基准
        let due_datetime = demand.due_date.and_time(calendar.day_end);
        let (is_on_track, days_over) = match projected_completion {
            Some(p) => {
                let delta_minutes = (p - due_datetime).num_minutes();
                let days = (delta_minutes as f64 / 1440.0).round() as i64;
                (p <= due_datetime, days)
            }
            None => (true, 0),
        };

        let costs = self.estimate_costs(steps, entries, pool);

        PlanProjection {
            timeline,
            projected_completion,
            is_on_track,
            days_over,
            costs,
        }
    }

    /// 成本估算
    ///
    /// 人工成本 = 调整总工时 × 候选池平均小时费率（空池用兜底费率）
    /// 设备成本 = 调整总工时在需设备工序间均摊后乘以各自设备费率
    /// （均摊为近似口径，不是精确的逐工序分配）
    fn estimate_costs(
        &self,
        steps: &[ProductStep],
        entries: &[ScheduleEntry],
        pool: &[Worker],
    ) -> CostEstimate {
        let total_minutes: i64 = entries.iter().map(|e| e.duration_minutes()).sum();
        let overtime_minutes: i64 = entries
            .iter()
            .filter(|e| e.is_overtime)
            .map(|e| e.duration_minutes())
            .sum();
        let labor_hours = total_minutes as f64 / 60.0;
        let overtime_hours = overtime_minutes as f64 / 60.0;

        let avg_rate = if pool.is_empty() {
            self.default_hourly_rate
        } else {
            pool.iter().map(|w| w.hourly_cost).sum::<f64>() / pool.len() as f64
        };
        let labor_cost = labor_hours * avg_rate;

        let equipment_steps: Vec<&ProductStep> =
            steps.iter().filter(|s| s.requires_equipment()).collect();
        let equipment_cost = if equipment_steps.is_empty() {
            0.0
        } else {
            let hours_per_step = labor_hours / equipment_steps.len() as f64;
            equipment_steps
                .iter()
                .map(|s| hours_per_step * s.equipment_hourly_cost.unwrap_or(0.0))
                .sum()
        };

        CostEstimate {
            labor_hours,
            overtime_hours,
            labor_cost,
            equipment_cost,
        }
    }
}

impl Default for PlanProjector {
    fn default() -> Self {
        Self::new(DEFAULT_HOURLY_RATE)
    }
}

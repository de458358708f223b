// ==========================================
// 车间生产排产系统 - 计划运行与方案领域模型
// ==========================================
// 红线: 方案一经生成不可修改；一次运行至多采纳一个方案
// ==========================================

use crate::domain::types::PlanningRunStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// PlanningRun - 计划运行
// ==========================================
// 用途: 在一个计划窗口内聚合多个候选方案，供对比与采纳
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRun {
    pub run_id: String,                      // 运行ID
    pub run_name: String,                    // 运行名称
    pub window_start: NaiveDate,             // 计划窗口起始
    pub window_end: NaiveDate,               // 计划窗口结束
    pub status: PlanningRunStatus,           // 状态
    pub accepted_scenario_id: Option<String>, // 已采纳方案ID（ACCEPTED 后至多一个）
    pub created_at: NaiveDateTime,           // 创建时间
    pub revision: i32,                       // 乐观锁：修订号
}

impl PlanningRun {
    /// 判断是否只读（归档后不可变更）
    pub fn is_read_only(&self) -> bool {
        self.status.is_terminal()
    }
}

// ==========================================
// PlanningScenario - 计划方案
// ==========================================
// 一个需求集合在一种策略下的完整候选计划及其聚合指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningScenario {
    pub scenario_id: String,                // 方案ID
    pub run_id: String,                     // 关联运行
    pub strategy: String,                   // 策略标签（snake_case 存储）
    pub metrics: ScenarioMetrics,           // 聚合指标
    pub is_accepted: bool,                  // 是否被采纳
    pub created_at: NaiveDateTime,          // 创建时间
}

// ==========================================
// ScenarioMetrics - 方案聚合指标
// ==========================================
// 同一需求集合下不同策略的方案在这些字段上直接可比
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub total_labor_hours: f64,             // 总工时（小时）
    pub total_overtime_hours: f64,          // 总加班工时（小时）
    pub total_labor_cost: f64,              // 总人工成本
    pub total_equipment_cost: f64,          // 总设备成本
    pub deadlines_met: i32,                 // 按期完成需求数
    pub deadlines_missed: i32,              // 逾期需求数
    pub latest_completion: Option<NaiveDateTime>, // 全部需求的最晚完成时刻
}

impl ScenarioMetrics {
    /// 空指标（聚合起点）
    pub fn zero() -> Self {
        Self {
            total_labor_hours: 0.0,
            total_overtime_hours: 0.0,
            total_labor_cost: 0.0,
            total_equipment_cost: 0.0,
            deadlines_met: 0,
            deadlines_missed: 0,
            latest_completion: None,
        }
    }

    /// 累加一个需求项的指标（聚合满足结合律）
    pub fn absorb(&mut self, other: &ScenarioMetrics) {
        self.total_labor_hours += other.total_labor_hours;
        self.total_overtime_hours += other.total_overtime_hours;
        self.total_labor_cost += other.total_labor_cost;
        self.total_equipment_cost += other.total_equipment_cost;
        self.deadlines_met += other.deadlines_met;
        self.deadlines_missed += other.deadlines_missed;
        self.latest_completion = match (self.latest_completion, other.latest_completion) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// 总成本（人工 + 设备）
    pub fn total_cost(&self) -> f64 {
        self.total_labor_cost + self.total_equipment_cost
    }
}

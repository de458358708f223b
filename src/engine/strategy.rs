// ==========================================
// 车间生产排产系统 - 排产策略定义
// ==========================================
// 用途：
// - 同一批需求在不同策略下试算多个方案，供对比后采纳；
// - 策略参数在方案落库时快照，保证结果可复现。
// ==========================================

use crate::engine::allocator::AllocationSettings;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// PlanningStrategy - 排产策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningStrategy {
    MeetDeadlines, // 保交期：允许加班，尽早开工
    MinimizeCost,  // 降成本：禁止加班，合格候选中取最低费率
    Balanced,      // 均衡：仅对逾期风险项启用加班
    Custom,        // 自定义：参数由调用方提供
}

impl PlanningStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningStrategy::MeetDeadlines => "meet_deadlines",
            PlanningStrategy::MinimizeCost => "minimize_cost",
            PlanningStrategy::Balanced => "balanced",
            PlanningStrategy::Custom => "custom",
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            PlanningStrategy::MeetDeadlines => "保交期",
            PlanningStrategy::MinimizeCost => "降成本",
            PlanningStrategy::Balanced => "均衡方案",
            PlanningStrategy::Custom => "自定义",
        }
    }
}

impl Default for PlanningStrategy {
    fn default() -> Self {
        PlanningStrategy::Balanced
    }
}

impl std::str::FromStr for PlanningStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "meet_deadlines" | "meet-deadlines" => Ok(PlanningStrategy::MeetDeadlines),
            "minimize_cost" | "minimize-cost" => Ok(PlanningStrategy::MinimizeCost),
            "balanced" => Ok(PlanningStrategy::Balanced),
            "custom" => Ok(PlanningStrategy::Custom),
            other => Err(format!("未知策略类型: {}", other)),
        }
    }
}

// ==========================================
// StrategyPreferences - 策略偏好（custom 策略的调用方参数）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyPreferences {
    pub efficiency_factor: Option<f64>,  // 效率系数覆写（百分数）
    pub allow_overtime: Option<bool>,    // 加班开关覆写
    pub worker_ids: Option<Vec<String>>, // 限定候选工人
    pub min_batch_size: Option<i64>,     // 单需求最小批量（拆单下界）
    pub max_batch_size: Option<i64>,     // 单需求最大批量（拆单上界）
}

impl PlanningStrategy {
    /// 把策略标签解析为分配参数
    ///
    /// balanced 的加班开关由 ScenarioGenerator 按单项逾期风险二次决定，
    /// 此处给出的是首轮（不加班）参数
    pub fn resolve(&self, start_date: NaiveDate, prefs: &StrategyPreferences) -> AllocationSettings {
        let mut settings = AllocationSettings::standard(start_date);

        match self {
            PlanningStrategy::MeetDeadlines => {
                settings.allow_overtime = true;
            }
            PlanningStrategy::MinimizeCost => {
                settings.allow_overtime = false;
                settings.prefer_cheapest_worker = true;
            }
            PlanningStrategy::Balanced => {
                settings.allow_overtime = false;
            }
            PlanningStrategy::Custom => {
                if let Some(ot) = prefs.allow_overtime {
                    settings.allow_overtime = ot;
                }
            }
        }

        // 偏好对所有策略生效（策略给默认，偏好可收紧）
        if let Some(eff) = prefs.efficiency_factor {
            settings.efficiency_factor = eff;
        }
        if let Some(ids) = &prefs.worker_ids {
            settings.worker_ids = Some(ids.clone());
        }

        settings
    }
}

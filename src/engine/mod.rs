// ==========================================
// 车间生产排产系统 - 引擎层
// ==========================================
// 职责: 实现排产业务规则引擎，不拼 SQL
// 红线: Engine 不触库；输入输出均为领域对象，
//       日历边界随调用显式传递，禁止全局常量
// ==========================================

pub mod allocator;
pub mod calendar;
pub mod dependency;
pub mod projector;
pub mod replan;
pub mod scenario;
pub mod strategy;
pub mod validator;
pub mod worker_matcher;

// 重导出核心引擎
pub use allocator::{AllocationResult, AllocationSettings, TimeBlockAllocator};
pub use calendar::{CalendarConfig, WorkCalendar, WorkWindow};
pub use dependency::check_dependencies;
pub use projector::{CostEstimate, DailyOutputPoint, PlanProjection, PlanProjector};
pub use replan::{ReplanEngine, ReplanResult};
pub use scenario::{DemandPlanOutcome, ScenarioGenerator, ScenarioOutcome};
pub use strategy::{PlanningStrategy, StrategyPreferences};
pub use validator::{ScheduleValidator, ValidationIssue, ValidationResult};
pub use worker_matcher::WorkerMatcher;

use thiserror::Error;

// ==========================================
// EngineError - 引擎层错误
// ==========================================
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("工序 {step_id} 引用了不存在的前置工序 {predecessor_id}")]
    MissingStep {
        step_id: String,
        predecessor_id: String,
    },

    #[error("工序依赖存在环路，涉及工序 {step_id}")]
    DependencyCycle { step_id: String },

    #[error("需求 {demand_id} 的数量非法: {quantity}，数量必须为正数")]
    InvalidQuantity { demand_id: String, quantity: i64 },
}

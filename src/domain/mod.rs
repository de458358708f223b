// ==========================================
// 车间生产排产系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态机规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod demand;
pub mod product;
pub mod scenario;
pub mod schedule;
pub mod types;
pub mod worker;

// 重导出核心类型
pub use demand::DemandEntry;
pub use product::{ProductStep, StepDependency};
pub use scenario::{PlanningRun, PlanningScenario, ScenarioMetrics};
pub use schedule::{Schedule, ScheduleDraft, ScheduleEntry};
pub use types::{
    DemandStatus, DependencyRelation, PlanningRunStatus, TaskStatus, WorkerStatus,
};
pub use worker::{
    level_from_efficiency, EquipmentCertification, Worker, WorkerStepProficiency,
};

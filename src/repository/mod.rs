// ==========================================
// 车间生产排产系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod demand_repo;
pub mod error;
pub mod scenario_repo;
pub mod schedule_repo;
pub mod step_repo;
pub mod worker_repo;

// 重导出核心仓储
pub use demand_repo::DemandRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use scenario_repo::{PlanningRunRepository, ScenarioRepository};
pub use schedule_repo::ScheduleRepository;
pub use step_repo::StepRepository;
pub use worker_repo::WorkerRepository;

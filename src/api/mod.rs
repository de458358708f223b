// ==========================================
// 车间生产排产系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供上层服务调用
// ==========================================

pub mod error;
pub mod planning_api;
pub mod scenario_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use planning_api::{PlanPreview, PlanningApi, PreviewRequest};
pub use scenario_api::ScenarioApi;

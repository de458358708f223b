// ==========================================
// 车间生产排产系统 - 单需求排产 API
// ==========================================
// 职责: 试算预览、草稿管理、计划提交、进度重排
// 红线: 提交前必须通过校验；提交/重排走乐观锁
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, PlanningConfigReader};
use crate::domain::demand::DemandEntry;
use crate::domain::product::ProductStep;
use crate::domain::schedule::{Schedule, ScheduleDraft, ScheduleEntry};
use crate::domain::types::DemandStatus;
use crate::domain::worker::Worker;
use crate::engine::allocator::{AllocationSettings, TimeBlockAllocator};
use crate::engine::calendar::WorkCalendar;
use crate::engine::projector::{PlanProjection, PlanProjector};
use crate::engine::replan::{ReplanEngine, ReplanResult};
use crate::engine::validator::ScheduleValidator;
use crate::engine::worker_matcher::WorkerMatcher;
use crate::repository::{DemandRepository, ScheduleRepository, StepRepository, WorkerRepository};

// ==========================================
// PreviewRequest - 试算请求参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub start_date: NaiveDate,           // 计划起始日期
    pub efficiency_factor: Option<f64>,  // 效率系数覆写（百分数）
    pub allow_overtime: Option<bool>,    // 加班开关覆写
    pub worker_ids: Option<Vec<String>>, // 限定候选工人
}

// ==========================================
// PlanPreview - 试算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPreview {
    pub entries: Vec<ScheduleEntry>, // 时间块明细
    pub projection: PlanProjection,  // 完成投影与成本估算
}

/// 排产上下文（工序 + 候选工人 + 匹配引擎 + 日历）
struct PlanningContext {
    steps: Vec<ProductStep>,
    pool: Vec<Worker>,
    matcher: WorkerMatcher,
    calendar: WorkCalendar,
    default_hourly_rate: f64,
}

// ==========================================
// PlanningApi - 单需求排产 API
// ==========================================

/// 单需求排产API
///
/// 职责：
/// 1. 试算预览（不落库）
/// 2. 草稿管理（保存、读取、删除）
/// 3. 计划提交（校验 → 落库 → 需求状态流转）
/// 4. 进度重排（剩余数量重排 + 加班建议）
pub struct PlanningApi {
    demand_repo: Arc<DemandRepository>,
    step_repo: Arc<StepRepository>,
    worker_repo: Arc<WorkerRepository>,
    schedule_repo: Arc<ScheduleRepository>,
    config_manager: Arc<ConfigManager>,
}

impl PlanningApi {
    /// 创建新的PlanningApi实例
    pub fn new(
        demand_repo: Arc<DemandRepository>,
        step_repo: Arc<StepRepository>,
        worker_repo: Arc<WorkerRepository>,
        schedule_repo: Arc<ScheduleRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            demand_repo,
            step_repo,
            worker_repo,
            schedule_repo,
            config_manager,
        }
    }

    // ==========================================
    // 试算预览
    // ==========================================

    /// 为需求生成试算预览（不落库）
    ///
    /// # 参数
    /// - demand_id: 需求ID
    /// - req: 试算参数（起始日期 + 可选覆写）
    ///
    /// # 返回
    /// - Ok(PlanPreview): 时间块明细 + 完成投影
    /// - Err(ApiError): 需求不存在 / 工序缺失 / 引擎拒绝
    #[instrument(skip(self, req), fields(demand_id = %demand_id))]
    pub async fn generate_preview(
        &self,
        demand_id: &str,
        req: &PreviewRequest,
    ) -> ApiResult<PlanPreview> {
        let demand = self.load_demand(demand_id)?;
        if !demand.is_plannable() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "需求 {} 当前状态 {} 不可排产",
                demand_id, demand.status
            )));
        }

        let ctx = self.load_context(&demand.product_id).await?;
        let settings = self.build_settings(&ctx, req).await?;

        let allocator = TimeBlockAllocator::new(ctx.calendar.clone());
        let result = allocator.allocate(&demand, &ctx.steps, &ctx.pool, &ctx.matcher, &settings)?;

        let projector = PlanProjector::new(ctx.default_hourly_rate);
        let projection = projector.project(
            &demand,
            &ctx.steps,
            &result.entries,
            &ctx.pool,
            ctx.calendar.config(),
        );

        info!(
            entries_count = result.entries.len(),
            is_on_track = projection.is_on_track,
            "试算预览完成"
        );

        Ok(PlanPreview {
            entries: result.entries,
            projection,
        })
    }

    // ==========================================
    // 草稿管理
    // ==========================================

    /// 保存需求草稿（整体覆盖）
    #[instrument(skip(self, entries), fields(demand_id = %demand_id, entries_count = entries.len()))]
    pub fn save_draft(&self, demand_id: &str, entries: &[ScheduleEntry]) -> ApiResult<()> {
        // 草稿归属需求，需求必须存在
        self.load_demand(demand_id)?;

        let payload_json = serde_json::to_string(entries)
            .map_err(|e| ApiError::InternalError(format!("草稿序列化失败: {}", e)))?;

        self.schedule_repo.save_draft(&ScheduleDraft {
            demand_id: demand_id.to_string(),
            payload_json,
            updated_at: chrono::Local::now().naive_local(),
        })?;

        Ok(())
    }

    /// 读取需求草稿
    pub fn get_draft(&self, demand_id: &str) -> ApiResult<Option<Vec<ScheduleEntry>>> {
        let draft = match self.schedule_repo.get_draft(demand_id)? {
            Some(d) => d,
            None => return Ok(None),
        };

        let entries: Vec<ScheduleEntry> = serde_json::from_str(&draft.payload_json)
            .map_err(|e| ApiError::InternalError(format!("草稿反序列化失败: {}", e)))?;

        Ok(Some(entries))
    }

    /// 删除需求草稿（不存在视为成功）
    pub fn delete_draft(&self, demand_id: &str) -> ApiResult<()> {
        self.schedule_repo.delete_draft(demand_id)?;
        Ok(())
    }

    // ==========================================
    // 计划提交
    // ==========================================

    /// 提交计划
    ///
    /// 流程: 校验 → 落库（计划+明细, 单事务）→ 需求状态流转 → 清理草稿
    ///
    /// # 返回
    /// - Ok(String): schedule_id
    /// - Err(ApiError::PlanValidationError): 校验存在阻断性错误
    #[instrument(skip(self, entries), fields(demand_id = %demand_id, entries_count = entries.len()))]
    pub async fn commit(&self, demand_id: &str, entries: &[ScheduleEntry]) -> ApiResult<String> {
        if entries.is_empty() {
            return Err(ApiError::InvalidInput("提交的计划不能为空".to_string()));
        }

        let demand = self.load_demand(demand_id)?;
        let ctx = self.load_context(&demand.product_id).await?;

        // 提交前校验: error 阻断, warning 放行
        let validation =
            ScheduleValidator::new().validate(entries, &ctx.steps, &ctx.pool, &ctx.matcher);
        if !validation.is_savable() {
            return Err(ApiError::PlanValidationError {
                reason: format!("存在 {} 条阻断性错误", validation.errors.len()),
                issues: validation.errors,
            });
        }

        let schedule = Schedule {
            schedule_id: uuid::Uuid::new_v4().to_string(),
            demand_id: demand_id.to_string(),
            created_at: chrono::Local::now().naive_local(),
            revision: 0,
        };
        self.schedule_repo.create(&schedule, entries)?;

        self.demand_repo
            .update_status(demand_id, DemandStatus::Planned)?;
        self.schedule_repo.delete_draft(demand_id)?;

        info!(schedule_id = %schedule.schedule_id, "计划提交完成");
        Ok(schedule.schedule_id)
    }

    // ==========================================
    // 进度重排
    // ==========================================

    /// 基于实际执行进度重排剩余数量
    ///
    /// # 参数
    /// - schedule_id: 已提交计划ID
    /// - now: 重排基准时刻（剩余工作从此刻起重新分配）
    ///
    /// # 返回
    /// - Ok(ReplanResult): 剩余量草稿 + 加班建议块
    #[instrument(skip(self), fields(schedule_id = %schedule_id, now = %now))]
    pub async fn replan(&self, schedule_id: &str, now: NaiveDateTime) -> ApiResult<ReplanResult> {
        let schedule = self
            .schedule_repo
            .find_by_id(schedule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("计划 {} 不存在", schedule_id)))?;
        let demand = self.load_demand(&schedule.demand_id)?;

        let executed = self.schedule_repo.list_entries(schedule_id)?;
        let ctx = self.load_context(&demand.product_id).await?;

        let efficiency = self.config_manager.get_default_efficiency_factor().await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let mut settings = AllocationSettings::standard(now.date());
        settings.efficiency_factor = efficiency;

        let engine = ReplanEngine::new(
            TimeBlockAllocator::new(ctx.calendar.clone()),
            PlanProjector::new(ctx.default_hourly_rate),
        );
        let result = engine.replan(
            &demand,
            &ctx.steps,
            &executed,
            &ctx.pool,
            &ctx.matcher,
            now,
            &settings,
        )?;

        Ok(result)
    }

    /// 提交重排结果: 替换计划的未执行明细（带乐观锁检查）
    ///
    /// 已开工与已完成的明细保留为执行历史
    #[instrument(skip(self, new_entries), fields(
        schedule_id = %schedule_id,
        expected_revision,
        entries_count = new_entries.len(),
    ))]
    pub fn commit_replan(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        new_entries: &[ScheduleEntry],
    ) -> ApiResult<()> {
        self.schedule_repo
            .replace_open_entries(schedule_id, expected_revision, new_entries)?;

        info!("重排提交完成");
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_demand(&self, demand_id: &str) -> ApiResult<DemandEntry> {
        self.demand_repo
            .find_by_id(demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求 {} 不存在", demand_id)))
    }

    /// 加载排产上下文: 工序 + 候选工人 + 匹配引擎 + 日历配置
    async fn load_context(&self, product_id: &str) -> ApiResult<PlanningContext> {
        let steps = self.step_repo.find_by_product(product_id)?;
        if steps.is_empty() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "产品 {} 未定义工序，无法排产",
                product_id
            )));
        }

        let pool = self.worker_repo.list_all()?;
        let certs = self.worker_repo.list_certifications()?;
        let profs = self.worker_repo.list_proficiencies()?;
        let matcher = WorkerMatcher::new(&certs, &profs);

        let calendar_config = self
            .config_manager
            .get_calendar_config()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let default_hourly_rate = self
            .config_manager
            .get_default_hourly_rate()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        Ok(PlanningContext {
            steps,
            pool,
            matcher,
            calendar: WorkCalendar::new(calendar_config),
            default_hourly_rate,
        })
    }

    /// 把试算请求解析为分配参数（未覆写的项取配置缺省）
    async fn build_settings(
        &self,
        _ctx: &PlanningContext,
        req: &PreviewRequest,
    ) -> ApiResult<AllocationSettings> {
        let mut settings = AllocationSettings::standard(req.start_date);

        settings.efficiency_factor = match req.efficiency_factor {
            Some(eff) if eff > 0.0 => eff,
            Some(eff) => {
                return Err(ApiError::InvalidInput(format!(
                    "效率系数必须为正数，实际为 {}",
                    eff
                )));
            }
            None => self
                .config_manager
                .get_default_efficiency_factor()
                .await
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };

        if let Some(ot) = req.allow_overtime {
            settings.allow_overtime = ot;
        }
        if let Some(ids) = &req.worker_ids {
            settings.worker_ids = Some(ids.clone());
        }

        Ok(settings)
    }
}

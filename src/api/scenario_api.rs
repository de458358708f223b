// ==========================================
// 车间生产排产系统 - 多方案对比 API
// ==========================================
// 职责: 排产轮次管理、多策略方案试算、方案采纳、草稿校验
// 红线: 方案一经生成不可修改；一次轮次至多采纳一个方案；
//       采纳走乐观锁 + 状态机检查
// ==========================================

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, PlanningConfigReader};
use crate::domain::scenario::{PlanningRun, PlanningScenario};
use crate::domain::schedule::ScheduleEntry;
use crate::domain::types::PlanningRunStatus;
use crate::engine::allocator::TimeBlockAllocator;
use crate::engine::calendar::WorkCalendar;
use crate::engine::projector::PlanProjector;
use crate::engine::scenario::{ScenarioGenerator, ScenarioOutcome};
use crate::engine::strategy::{PlanningStrategy, StrategyPreferences};
use crate::engine::validator::{ScheduleValidator, ValidationResult};
use crate::engine::worker_matcher::WorkerMatcher;
use crate::repository::{
    DemandRepository, PlanningRunRepository, ScenarioRepository, StepRepository, WorkerRepository,
};

// ==========================================
// ScenarioApi - 多方案对比 API
// ==========================================

/// 多方案对比API
///
/// 职责：
/// 1. 轮次管理（创建、查询）
/// 2. 按策略试算方案并落库指标快照
/// 3. 方案采纳（状态流转 + 乐观锁）
/// 4. 人工编辑后的草稿校验
pub struct ScenarioApi {
    demand_repo: Arc<DemandRepository>,
    step_repo: Arc<StepRepository>,
    worker_repo: Arc<WorkerRepository>,
    run_repo: Arc<PlanningRunRepository>,
    scenario_repo: Arc<ScenarioRepository>,
    config_manager: Arc<ConfigManager>,
}

impl ScenarioApi {
    /// 创建新的ScenarioApi实例
    pub fn new(
        demand_repo: Arc<DemandRepository>,
        step_repo: Arc<StepRepository>,
        worker_repo: Arc<WorkerRepository>,
        run_repo: Arc<PlanningRunRepository>,
        scenario_repo: Arc<ScenarioRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            demand_repo,
            step_repo,
            worker_repo,
            run_repo,
            scenario_repo,
            config_manager,
        }
    }

    // ==========================================
    // 轮次管理
    // ==========================================

    /// 创建排产轮次
    ///
    /// # 参数
    /// - run_name: 轮次名称
    /// - window_start / window_end: 计划窗口
    ///
    /// # 返回
    /// - Ok(String): 轮次ID
    pub fn create_run(
        &self,
        run_name: String,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> ApiResult<String> {
        if run_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("轮次名称不能为空".to_string()));
        }
        if window_end < window_start {
            return Err(ApiError::InvalidInput(format!(
                "计划窗口非法: {} 晚于 {}",
                window_start, window_end
            )));
        }

        let run = PlanningRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            run_name,
            window_start,
            window_end,
            status: PlanningRunStatus::Draft,
            accepted_scenario_id: None,
            created_at: chrono::Local::now().naive_local(),
            revision: 0,
        };

        self.run_repo.create(&run)?;
        Ok(run.run_id)
    }

    /// 查询轮次
    pub fn get_run(&self, run_id: &str) -> ApiResult<PlanningRun> {
        self.run_repo
            .find_by_id(run_id)?
            .ok_or_else(|| ApiError::NotFound(format!("轮次 {} 不存在", run_id)))
    }

    /// 查询轮次的全部方案
    pub fn list_scenarios(&self, run_id: &str) -> ApiResult<Vec<PlanningScenario>> {
        self.get_run(run_id)?;
        Ok(self.scenario_repo.find_by_run(run_id)?)
    }

    // ==========================================
    // 方案试算
    // ==========================================

    /// 在轮次内按策略试算一个方案并落库指标快照
    ///
    /// 需求范围: 轮次窗口内的可排产需求（PENDING / PLANNED）
    ///
    /// # 返回
    /// - Ok((scenario_id, ScenarioOutcome)): 方案ID + 完整试算结果
    /// - Err(ApiError): 轮次只读 / 状态不允许 / 引擎拒绝
    #[instrument(skip(self, prefs), fields(run_id = %run_id, strategy = %strategy))]
    pub async fn generate_scenario(
        &self,
        run_id: &str,
        strategy: &str,
        prefs: &StrategyPreferences,
    ) -> ApiResult<(String, ScenarioOutcome)> {
        let run = self.get_run(run_id)?;
        if run.is_read_only() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "轮次 {} 已归档，不可再试算",
                run_id
            )));
        }
        if run.status == PlanningRunStatus::Accepted
            || run.status == PlanningRunStatus::Executed
        {
            return Err(ApiError::BusinessRuleViolation(format!(
                "轮次 {} 已采纳方案，不可再试算",
                run_id
            )));
        }

        let strategy = PlanningStrategy::from_str(strategy)
            .map_err(ApiError::InvalidInput)?;

        // 组装需求与上下文
        let demands = self
            .demand_repo
            .list_plannable_in_window(run.window_start, run.window_end)?;
        if demands.is_empty() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "计划窗口 {} ~ {} 内无可排产需求",
                run.window_start, run.window_end
            )));
        }

        let mut steps_by_product = HashMap::new();
        for demand in &demands {
            if !steps_by_product.contains_key(&demand.product_id) {
                let steps = self.step_repo.find_by_product(&demand.product_id)?;
                steps_by_product.insert(demand.product_id.clone(), steps);
            }
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

        let generator = ScenarioGenerator::new(
            TimeBlockAllocator::new(WorkCalendar::new(calendar_config)),
            PlanProjector::new(default_hourly_rate),
        );
        let outcome = generator.generate(
            &demands,
            &steps_by_product,
            &pool,
            &matcher,
            strategy,
            prefs,
            run.window_start,
        )?;

        // 指标快照落库
        let scenario = PlanningScenario {
            scenario_id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            strategy: strategy.as_str().to_string(),
            metrics: outcome.metrics.clone(),
            is_accepted: false,
            created_at: chrono::Local::now().naive_local(),
        };
        self.scenario_repo.create(&scenario)?;

        // 首个方案使轮次进入待决状态
        if run.status == PlanningRunStatus::Draft {
            let mut updated = run;
            updated.status = PlanningRunStatus::Pending;
            self.run_repo.update(&updated)?;
        }

        info!(
            scenario_id = %scenario.scenario_id,
            total_cost = outcome.metrics.total_cost(),
            deadlines_missed = outcome.metrics.deadlines_missed,
            "方案试算落库完成"
        );

        Ok((scenario.scenario_id, outcome))
    }

    // ==========================================
    // 方案采纳
    // ==========================================

    /// 采纳轮次内的一个方案
    ///
    /// 流程: 状态机检查 → 方案归属检查 → 轮次流转（乐观锁）→ 标记采纳
    ///
    /// # 参数
    /// - expected_revision: 调用方读取轮次时的revision（并发冲突时报乐观锁错误）
    #[instrument(skip(self), fields(run_id = %run_id, scenario_id = %scenario_id))]
    pub fn accept_scenario(
        &self,
        run_id: &str,
        scenario_id: &str,
        expected_revision: i32,
    ) -> ApiResult<()> {
        let run = self.get_run(run_id)?;

        if !run.status.can_transition_to(PlanningRunStatus::Accepted) {
            return Err(ApiError::InvalidStateTransition {
                from: run.status.to_db_str().to_string(),
                to: PlanningRunStatus::Accepted.to_db_str().to_string(),
            });
        }

        let scenario = self
            .scenario_repo
            .find_by_id(scenario_id)?
            .ok_or_else(|| ApiError::NotFound(format!("方案 {} 不存在", scenario_id)))?;
        if scenario.run_id != run_id {
            return Err(ApiError::BusinessRuleViolation(format!(
                "方案 {} 不属于轮次 {}",
                scenario_id, run_id
            )));
        }

        // 乐观锁冲突时不得写入任何采纳标记，轮次流转先行
        let mut updated = run;
        updated.status = PlanningRunStatus::Accepted;
        updated.accepted_scenario_id = Some(scenario_id.to_string());
        updated.revision = expected_revision;
        self.run_repo.update(&updated)?;

        // 同轮次其余方案清除采纳标记
        self.scenario_repo.mark_accepted(run_id, scenario_id)?;

        info!("方案采纳完成");
        Ok(())
    }

    // ==========================================
    // 草稿校验
    // ==========================================

    /// 校验（可能被人工编辑过的）计划草稿
    ///
    /// error 阻断保存, warning 仅提示
    #[instrument(skip(self, entries), fields(product_id = %product_id, entries_count = entries.len()))]
    pub fn validate_schedule(
        &self,
        product_id: &str,
        entries: &[ScheduleEntry],
    ) -> ApiResult<ValidationResult> {
        let steps = self.step_repo.find_by_product(product_id)?;
        if steps.is_empty() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "产品 {} 未定义工序，无法校验",
                product_id
            )));
        }

        let pool = self.worker_repo.list_all()?;
        let certs = self.worker_repo.list_certifications()?;
        let profs = self.worker_repo.list_proficiencies()?;
        let matcher = WorkerMatcher::new(&certs, &profs);

        Ok(ScheduleValidator::new().validate(entries, &steps, &pool, &matcher))
    }
}

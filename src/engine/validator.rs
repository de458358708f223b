// ==========================================
// 车间生产排产系统 - 计划校验引擎
// ==========================================
// 职责: 对（可能被人工编辑过的）草稿计划做约束检查，
//       产出结构化的错误/告警列表供编辑方门控保存
// 红线: error 阻断保存；warning 不阻断，由调用方裁量
// ==========================================

use crate::domain::product::ProductStep;
use crate::domain::schedule::ScheduleEntry;
use crate::domain::worker::Worker;
use crate::engine::worker_matcher::WorkerMatcher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

// ==========================================
// ValidationIssue - 单条校验问题
// ==========================================
// 以明细下标 + 字段名定位，供编辑界面反显
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub entry_index: usize,                 // 明细下标
    pub field: String,                      // 问题字段
    pub message: String,                    // 问题描述
    pub related_index: Option<usize>,       // 关联明细下标（时间冲突时为冲突对方）
}

// ==========================================
// ValidationResult - 校验结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,   // 阻断性错误
    pub warnings: Vec<ValidationIssue>, // 非阻断告警
}

impl ValidationResult {
    /// 判断是否可保存（无阻断性错误）
    pub fn is_savable(&self) -> bool {
        self.errors.is_empty()
    }
}

// ==========================================
// ScheduleValidator - 计划校验引擎
// ==========================================
pub struct ScheduleValidator {
    // 无状态引擎
}

impl ScheduleValidator {
    pub fn new() -> Self {
        Self {}
    }

    /// 校验草稿计划
    ///
    /// 检查项（逐条明细）:
    /// a) 指派工人不在该工序合格候选集 → error
    /// b) 同一工人同日时间块重叠 → error（引用冲突双方下标）
    /// c) 计划产出必须为正且有限 → error
    /// d) 工人仅技能匹配、未持设备认证 → warning（不阻断）
    #[instrument(skip_all, fields(entries_count = entries.len()))]
    pub fn validate(
        &self,
        entries: &[ScheduleEntry],
        steps: &[ProductStep],
        pool: &[Worker],
        matcher: &WorkerMatcher,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        let step_index: HashMap<&str, &ProductStep> =
            steps.iter().map(|s| (s.step_id.as_str(), s)).collect();

        for (i, entry) in entries.iter().enumerate() {
            // c) 产出合法性
            if entry.planned_output <= 0 {
                result.errors.push(ValidationIssue {
                    entry_index: i,
                    field: "planned_output".to_string(),
                    message: format!("计划产出必须为正数，实际为 {}", entry.planned_output),
                    related_index: None,
                });
            }

            let step = match step_index.get(entry.step_id.as_str()) {
                Some(s) => *s,
                None => {
                    result.errors.push(ValidationIssue {
                        entry_index: i,
                        field: "step_id".to_string(),
                        message: format!("工序 {} 不存在", entry.step_id),
                        related_index: None,
                    });
                    continue;
                }
            };

            if let Some(worker_id) = &entry.worker_id {
                // a) 合格集校验
                let qualified = matcher.qualified_workers(step, pool);
                let is_qualified = qualified.iter().any(|w| &w.worker_id == worker_id);
                if !is_qualified {
                    result.errors.push(ValidationIssue {
                        entry_index: i,
                        field: "worker_id".to_string(),
                        message: format!(
                            "工人 {} 不在工序 {} 的合格候选集内",
                            worker_id, entry.step_id
                        ),
                        related_index: None,
                    });
                } else if let Some(equipment_id) = &step.equipment_id {
                    // d) 仅技能匹配、未持设备认证 → 告警
                    if !matcher.is_certified(worker_id, equipment_id) {
                        result.warnings.push(ValidationIssue {
                            entry_index: i,
                            field: "worker_id".to_string(),
                            message: format!(
                                "工人 {} 未持有设备 {} 认证（仅技能匹配）",
                                worker_id, equipment_id
                            ),
                            related_index: None,
                        });
                    }
                }
            }
        }

        // b) 同工人同日时间重叠（每对冲突只报一次）
        for i in 0..entries.len() {
            let Some(worker_i) = &entries[i].worker_id else {
                continue;
            };
            for j in (i + 1)..entries.len() {
                if entries[j].worker_id.as_ref() != Some(worker_i) {
                    continue;
                }
                if entries[i].overlaps(&entries[j]) {
                    result.errors.push(ValidationIssue {
                        entry_index: i,
                        field: "time_conflict".to_string(),
                        message: format!(
                            "工人 {} 在 {} 的时间块与明细 {} 重叠",
                            worker_i, entries[i].plan_date, j
                        ),
                        related_index: Some(j),
                    });
                }
            }
        }

        result
    }
}

impl Default for ScheduleValidator {
    fn default() -> Self {
        Self::new()
    }
}

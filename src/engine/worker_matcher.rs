// ==========================================
// 车间生产排产系统 - 工人匹配引擎
// ==========================================
// 职责: 按设备认证/技能类别过滤候选工人，并按熟练度降序排序
// 红线: 过滤为策略性而非硬约束——过滤结果为空时忽略该过滤条件
// 查找结构: 认证与熟练度均建哈希索引，避免重复线性扫描
// ==========================================

use crate::domain::product::ProductStep;
use crate::domain::worker::{EquipmentCertification, Worker, WorkerStepProficiency};
use std::collections::{HashMap, HashSet};

/// 无熟练度记录时的默认等级
const DEFAULT_PROFICIENCY_LEVEL: i32 = 1;

// ==========================================
// WorkerMatcher - 工人匹配引擎
// ==========================================
pub struct WorkerMatcher {
    // equipment_id → 认证工人集合
    certified_by_equipment: HashMap<String, HashSet<String>>,
    // (worker_id, step_id) → 熟练度等级
    proficiency_index: HashMap<(String, String), i32>,
}

impl WorkerMatcher {
    /// 从参照数据构建匹配引擎（索引一次构建，多次查询）
    pub fn new(
        certifications: &[EquipmentCertification],
        proficiencies: &[WorkerStepProficiency],
    ) -> Self {
        let mut certified_by_equipment: HashMap<String, HashSet<String>> = HashMap::new();
        for cert in certifications {
            certified_by_equipment
                .entry(cert.equipment_id.clone())
                .or_default()
                .insert(cert.worker_id.clone());
        }

        let mut proficiency_index = HashMap::new();
        for p in proficiencies {
            proficiency_index.insert((p.worker_id.clone(), p.step_id.clone()), p.level);
        }

        Self {
            certified_by_equipment,
            proficiency_index,
        }
    }

    /// 判断工人是否持有指定设备认证
    pub fn is_certified(&self, worker_id: &str, equipment_id: &str) -> bool {
        self.certified_by_equipment
            .get(equipment_id)
            .map(|s| s.contains(worker_id))
            .unwrap_or(false)
    }

    /// 查询工人在指定工序上的熟练度等级
    pub fn proficiency_level(&self, worker_id: &str, step_id: &str) -> i32 {
        self.proficiency_index
            .get(&(worker_id.to_string(), step_id.to_string()))
            .copied()
            .unwrap_or(DEFAULT_PROFICIENCY_LEVEL)
    }

    /// 返回工序的合格候选工人，按熟练度降序（稳定排序，平级保持输入顺序）
    ///
    /// 规则:
    /// 1) 仅 ACTIVE 工人参与
    /// 2) 需设备时限定认证工人，但过滤为空则忽略该过滤
    /// 3) 需技能时限定同类别工人，同样空集回退
    /// 4) 空输入池返回空列表——调用方须处理无指派时间块
    pub fn qualified_workers(&self, step: &ProductStep, pool: &[Worker]) -> Vec<Worker> {
        let active: Vec<&Worker> = pool.iter().filter(|w| w.is_available()).collect();
        if active.is_empty() {
            return Vec::new();
        }

        // 设备认证过滤（空集回退）
        let after_equipment: Vec<&Worker> = match &step.equipment_id {
            Some(equipment_id) => {
                let filtered: Vec<&Worker> = active
                    .iter()
                    .copied()
                    .filter(|w| self.is_certified(&w.worker_id, equipment_id))
                    .collect();
                if filtered.is_empty() {
                    active
                } else {
                    filtered
                }
            }
            None => active,
        };

        // 技能类别过滤（空集回退）
        let after_skill: Vec<&Worker> = match &step.skill_category {
            Some(category) => {
                let filtered: Vec<&Worker> = after_equipment
                    .iter()
                    .copied()
                    .filter(|w| w.skill_category.as_deref() == Some(category.as_str()))
                    .collect();
                if filtered.is_empty() {
                    after_equipment
                } else {
                    filtered
                }
            }
            None => after_equipment,
        };

        // 熟练度降序，sort_by_key 为稳定排序，平级保持输入顺序
        let mut candidates: Vec<Worker> = after_skill.into_iter().cloned().collect();
        candidates.sort_by_key(|w| {
            std::cmp::Reverse(self.proficiency_level(&w.worker_id, &step.step_id))
        });
        candidates
    }

    /// 最优工人（合格候选列表的队首）
    pub fn best_worker(&self, step: &ProductStep, pool: &[Worker]) -> Option<Worker> {
        self.qualified_workers(step, pool).into_iter().next()
    }

    /// 合格候选中小时成本最低的工人（minimize_cost 策略使用）
    ///
    /// 成本相同取熟练度排序靠前者
    pub fn cheapest_worker(&self, step: &ProductStep, pool: &[Worker]) -> Option<Worker> {
        let candidates = self.qualified_workers(step, pool);
        candidates.into_iter().reduce(|best, w| {
            if w.hourly_cost < best.hourly_cost {
                w
            } else {
                best
            }
        })
    }
}

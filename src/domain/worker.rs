// ==========================================
// 车间生产排产系统 - 工人领域模型
// ==========================================
// 工人/认证/熟练度均为引擎只读的参照数据
// 熟练度等级由外部根据历史效率计算，引擎只消费不修改
// ==========================================

use crate::domain::types::WorkerStatus;
use serde::{Deserialize, Serialize};

// ==========================================
// Worker - 工人
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,              // 工人ID
    pub name: String,                   // 姓名
    pub skill_category: Option<String>, // 技能类别
    pub hourly_cost: f64,               // 小时成本
    pub status: WorkerStatus,           // 状态
}

impl Worker {
    /// 判断是否可参与排产
    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Active
    }
}

// ==========================================
// EquipmentCertification - 设备认证
// ==========================================
// 工人↔设备配对，授予设备门控工序的排产资格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentCertification {
    pub worker_id: String,    // 工人ID
    pub equipment_id: String, // 设备ID
}

// ==========================================
// WorkerStepProficiency - 工序熟练度
// ==========================================
// 等级 1-5，由历史平均效率按固定阈值推导
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStepProficiency {
    pub worker_id: String, // 工人ID
    pub step_id: String,   // 工序ID
    pub level: i32,        // 熟练度等级 (1-5)
}

/// 从平均效率百分比推导熟练度等级
///
/// 阈值: ≥130→5, ≥115→4, ≥85→3, ≥70→2, 其余→1
pub fn level_from_efficiency(avg_efficiency_pct: f64) -> i32 {
    if avg_efficiency_pct >= 130.0 {
        5
    } else if avg_efficiency_pct >= 115.0 {
        4
    } else if avg_efficiency_pct >= 85.0 {
        3
    } else if avg_efficiency_pct >= 70.0 {
        2
    } else {
        1
    }
}

// ==========================================
// 车间生产排产系统 - 需求领域模型
// ==========================================
// 需求条目由外部销售数据或人工录入创建
// 红线: 被排产方案引用的需求不可删除
// ==========================================

use crate::domain::types::DemandStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// DemandEntry - 需求条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandEntry {
    pub demand_id: String,         // 需求ID
    pub product_id: String,        // 产品ID
    pub quantity: i64,             // 需求数量（件）
    pub due_date: NaiveDate,       // 交期
    pub priority: i32,             // 优先级（数字越大越优先）
    pub status: DemandStatus,      // 状态
    pub created_at: NaiveDateTime, // 创建时间
    pub updated_at: NaiveDateTime, // 更新时间
}

impl DemandEntry {
    /// 判断是否可进入排产（终态需求不可再排）
    pub fn is_plannable(&self) -> bool {
        !self.status.is_terminal()
    }
}

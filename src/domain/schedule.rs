// ==========================================
// 车间生产排产系统 - 排产计划领域模型
// ==========================================
// ScheduleEntry 即分配器产出的时间块:
// 带日期、起止时间、产出数量与指派工人的连续工作片段
// 红线: 实际执行数据(actual_output)由外部执行跟踪方写入
// ==========================================

use crate::domain::types::TaskStatus;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Schedule - 排产计划（一个需求的已提交计划）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,       // 计划ID
    pub demand_id: String,         // 关联需求
    pub created_at: NaiveDateTime, // 创建时间
    pub revision: i32,             // 乐观锁：修订号
}

// ==========================================
// ScheduleEntry - 排产明细（时间块）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub schedule_id: Option<String>,  // 关联计划（草稿阶段为空）
    pub demand_id: String,            // 关联需求
    pub step_id: String,              // 关联工序
    pub plan_date: NaiveDate,         // 排产日期
    pub start_time: NaiveTime,        // 开始时间
    pub end_time: NaiveTime,          // 结束时间
    pub planned_output: i64,          // 计划产出（件）
    pub worker_id: Option<String>,    // 指派工人（无合格工人时为空）
    pub is_overtime: bool,            // 是否为加班时段
    pub status: TaskStatus,           // 任务状态
    pub actual_output: Option<i64>,   // 实际产出（执行方写入）
}

impl ScheduleEntry {
    /// 块开始时刻
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.plan_date.and_time(self.start_time)
    }

    /// 块结束时刻
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.plan_date.and_time(self.end_time)
    }

    /// 块时长（分钟）
    pub fn duration_minutes(&self) -> i64 {
        (self.end_datetime() - self.start_datetime()).num_minutes()
    }

    /// 判断与另一时间块是否在同日且时间重叠
    ///
    /// 边界相接（a.end == b.start）不算重叠
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.plan_date == other.plan_date
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }

    /// 判断是否为未完成明细（重排时会被替换）
    pub fn is_open(&self) -> bool {
        matches!(self.status, TaskStatus::NotStarted | TaskStatus::Blocked)
    }
}

// ==========================================
// ScheduleDraft - 计划草稿（不透明透传存储）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDraft {
    pub demand_id: String,         // 关联需求
    pub payload_json: String,      // 草稿内容（JSON，引擎不解释）
    pub updated_at: NaiveDateTime, // 更新时间
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: (i32, u32, u32), start: (u32, u32), end: (u32, u32)) -> ScheduleEntry {
        ScheduleEntry {
            schedule_id: None,
            demand_id: "D1".to_string(),
            step_id: "S1".to_string(),
            plan_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            planned_output: 10,
            worker_id: Some("W1".to_string()),
            is_overtime: false,
            status: TaskStatus::NotStarted,
            actual_output: None,
        }
    }

    #[test]
    fn test_overlap_detection() {
        let a = entry((2026, 3, 2), (8, 0), (10, 0));
        let b = entry((2026, 3, 2), (9, 0), (11, 0));
        let c = entry((2026, 3, 2), (10, 0), (11, 0));
        let d = entry((2026, 3, 3), (9, 0), (11, 0));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // 边界相接不算重叠
        assert!(!a.overlaps(&c));
        // 不同日期不算重叠
        assert!(!b.overlaps(&d));
    }

    #[test]
    fn test_duration_minutes() {
        let e = entry((2026, 3, 2), (7, 0), (12, 0));
        assert_eq!(e.duration_minutes(), 300);
    }
}

// ==========================================
// 车间生产排产系统 - 领域类型定义
// ==========================================
// 职责: 状态机枚举与变体标签
// 约定: 数据库存储格式为 SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 需求状态 (Demand Status)
// ==========================================
// 生命周期: PENDING → PLANNED → IN_PROGRESS → COMPLETED | CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemandStatus {
    Pending,    // 待排产
    Planned,    // 已排产
    InProgress, // 生产中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl fmt::Display for DemandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl DemandStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PLANNED" => DemandStatus::Planned,
            "IN_PROGRESS" => DemandStatus::InProgress,
            "COMPLETED" => DemandStatus::Completed,
            "CANCELLED" => DemandStatus::Cancelled,
            _ => DemandStatus::Pending, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DemandStatus::Pending => "PENDING",
            DemandStatus::Planned => "PLANNED",
            DemandStatus::InProgress => "IN_PROGRESS",
            DemandStatus::Completed => "COMPLETED",
            DemandStatus::Cancelled => "CANCELLED",
        }
    }

    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, DemandStatus::Completed | DemandStatus::Cancelled)
    }
}

// ==========================================
// 任务状态 (Task Status)
// ==========================================
// 状态机: NOT_STARTED → IN_PROGRESS → COMPLETED
// BLOCKED / CANCELLED 可从任意非终态通过外部操作进入，均为终态出口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted, // 未开始
    InProgress, // 进行中
    Completed,  // 已完成
    Blocked,    // 被阻断
    Cancelled,  // 已取消
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TaskStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IN_PROGRESS" => TaskStatus::InProgress,
            "COMPLETED" => TaskStatus::Completed,
            "BLOCKED" => TaskStatus::Blocked,
            "CANCELLED" => TaskStatus::Cancelled,
            _ => TaskStatus::NotStarted,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Blocked | TaskStatus::Cancelled
        )
    }

    /// 判断状态转换是否合法
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, target) {
            (TaskStatus::NotStarted, TaskStatus::InProgress) => true,
            (TaskStatus::InProgress, TaskStatus::Completed) => true,
            // 任意非终态可被外部操作阻断/取消
            (_, TaskStatus::Blocked) | (_, TaskStatus::Cancelled) => true,
            _ => false,
        }
    }
}

// ==========================================
// 工人状态 (Worker Status)
// ==========================================
// 只有 ACTIVE 状态的工人可参与排产
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Active,   // 在岗
    Inactive, // 离岗
    OnLeave,  // 休假
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl WorkerStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ACTIVE" => WorkerStatus::Active,
            "ON_LEAVE" => WorkerStatus::OnLeave,
            _ => WorkerStatus::Inactive,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "ACTIVE",
            WorkerStatus::Inactive => "INACTIVE",
            WorkerStatus::OnLeave => "ON_LEAVE",
        }
    }
}

// ==========================================
// 工序依赖关系 (Dependency Relation)
// ==========================================
// 默认关系为 FINISH: 等待前序工序全部完成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyRelation {
    Start,  // 前序开始即可开始
    Finish, // 前序完成才可开始
}

impl fmt::Display for DependencyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl DependencyRelation {
    /// 从字符串解析依赖关系
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "START" => DependencyRelation::Start,
            _ => DependencyRelation::Finish, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DependencyRelation::Start => "START",
            DependencyRelation::Finish => "FINISH",
        }
    }
}

// ==========================================
// 计划运行状态 (Planning Run Status)
// ==========================================
// 生命周期: DRAFT → PENDING → ACCEPTED → EXECUTED → ARCHIVED
// ARCHIVED 为终态且只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanningRunStatus {
    Draft,    // 草稿
    Pending,  // 待决策
    Accepted, // 已采纳
    Executed, // 执行中
    Archived, // 已归档
}

impl fmt::Display for PlanningRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PlanningRunStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PENDING" => PlanningRunStatus::Pending,
            "ACCEPTED" => PlanningRunStatus::Accepted,
            "EXECUTED" => PlanningRunStatus::Executed,
            "ARCHIVED" => PlanningRunStatus::Archived,
            _ => PlanningRunStatus::Draft, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PlanningRunStatus::Draft => "DRAFT",
            PlanningRunStatus::Pending => "PENDING",
            PlanningRunStatus::Accepted => "ACCEPTED",
            PlanningRunStatus::Executed => "EXECUTED",
            PlanningRunStatus::Archived => "ARCHIVED",
        }
    }

    /// 判断是否为终态（归档后只读）
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanningRunStatus::Archived)
    }

    /// 判断状态转换是否合法
    pub fn can_transition_to(&self, target: PlanningRunStatus) -> bool {
        matches!(
            (self, target),
            (PlanningRunStatus::Draft, PlanningRunStatus::Pending)
                | (PlanningRunStatus::Draft, PlanningRunStatus::Accepted)
                | (PlanningRunStatus::Pending, PlanningRunStatus::Accepted)
                | (PlanningRunStatus::Accepted, PlanningRunStatus::Executed)
                | (PlanningRunStatus::Executed, PlanningRunStatus::Archived)
                | (PlanningRunStatus::Accepted, PlanningRunStatus::Archived)
        )
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_transitions() {
        // 正常流转
        assert!(TaskStatus::NotStarted.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));

        // 跳级非法
        assert!(!TaskStatus::NotStarted.can_transition_to(TaskStatus::Completed));

        // 任意非终态可被阻断/取消
        assert!(TaskStatus::NotStarted.can_transition_to(TaskStatus::Blocked));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Cancelled));

        // 终态不可再转换
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Blocked));
    }

    #[test]
    fn test_run_status_transitions() {
        assert!(PlanningRunStatus::Draft.can_transition_to(PlanningRunStatus::Pending));
        assert!(PlanningRunStatus::Pending.can_transition_to(PlanningRunStatus::Accepted));
        assert!(PlanningRunStatus::Accepted.can_transition_to(PlanningRunStatus::Executed));
        assert!(PlanningRunStatus::Executed.can_transition_to(PlanningRunStatus::Archived));

        // 归档为终态
        assert!(!PlanningRunStatus::Archived.can_transition_to(PlanningRunStatus::Draft));
        assert!(PlanningRunStatus::Archived.is_terminal());

        // 不可回退
        assert!(!PlanningRunStatus::Accepted.can_transition_to(PlanningRunStatus::Draft));
    }

    #[test]
    fn test_db_str_roundtrip() {
        for s in [
            DemandStatus::Pending,
            DemandStatus::Planned,
            DemandStatus::InProgress,
            DemandStatus::Completed,
            DemandStatus::Cancelled,
        ] {
            assert_eq!(DemandStatus::from_str(s.to_db_str()), s);
        }
        assert_eq!(DependencyRelation::from_str("start"), DependencyRelation::Start);
        assert_eq!(DependencyRelation::from_str(""), DependencyRelation::Finish);
    }
}

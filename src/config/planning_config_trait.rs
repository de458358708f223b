// ==========================================
// 车间生产排产系统 - 排产配置读取 Trait
// ==========================================
// 职责: 定义排产模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::engine::calendar::CalendarConfig;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PlanningConfigReader Trait
// ==========================================
// 用途: 排产引擎所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PlanningConfigReader: Send + Sync {
    // ===== 工作日历配置 =====

    /// 获取工作日历边界
    ///
    /// # 默认值
    /// - 早班 07:00, 午休 12:00-12:30, 下班 15:30, 加班上限 120 分钟
    async fn get_calendar_config(&self) -> Result<CalendarConfig, Box<dyn Error>>;

    // ===== 成本配置 =====

    /// 获取缺省小时费率（工人无费率时的成本估算兜底）
    ///
    /// # 默认值
    /// - 35.0
    async fn get_default_hourly_rate(&self) -> Result<f64, Box<dyn Error>>;

    // ===== 效率配置 =====

    /// 获取缺省效率系数（百分数, 100 = 标准工时）
    ///
    /// # 默认值
    /// - 100.0
    async fn get_default_efficiency_factor(&self) -> Result<f64, Box<dyn Error>>;
}

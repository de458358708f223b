// ==========================================
// 车间生产排产系统 - 工序领域模型
// ==========================================
// 工序为产品定义（外部）拥有的不可变参照数据
// 依赖关系按约定构成 DAG，排产前需显式检测环路
// ==========================================

use crate::domain::types::DependencyRelation;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductStep - 生产工序
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStep {
    pub step_id: String,                  // 工序ID
    pub product_id: String,               // 所属产品ID
    pub sequence_index: i32,              // 顺序号（依赖序 = 顺序序）
    pub seconds_per_piece: f64,           // 单件标准工时（秒）
    pub skill_category: Option<String>,   // 所需技能类别
    pub equipment_id: Option<String>,     // 所需设备ID
    pub equipment_hourly_cost: Option<f64>, // 设备小时成本（需设备时有效）
    pub dependencies: Vec<StepDependency>, // 前序依赖列表
}

impl ProductStep {
    /// 判断是否需要设备
    pub fn requires_equipment(&self) -> bool {
        self.equipment_id.is_some()
    }

    /// 按效率系数调整后的单件工时（秒）
    ///
    /// efficiency_factor 为百分数（100 = 标准效率）
    pub fn adjusted_seconds_per_piece(&self, efficiency_factor: f64) -> f64 {
        if efficiency_factor <= 0.0 {
            // 非法效率系数按标准效率处理，避免除零
            return self.seconds_per_piece;
        }
        self.seconds_per_piece / (efficiency_factor / 100.0)
    }
}

// ==========================================
// StepDependency - 工序依赖
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDependency {
    pub predecessor_step_id: String,    // 前序工序ID
    pub relation: DependencyRelation,   // 依赖关系（默认 FINISH）
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn step(seconds: f64) -> ProductStep {
        ProductStep {
            step_id: "S1".to_string(),
            product_id: "P1".to_string(),
            sequence_index: 1,
            seconds_per_piece: seconds,
            skill_category: None,
            equipment_id: None,
            equipment_hourly_cost: None,
            dependencies: vec![],
        }
    }

    #[test]
    fn test_adjusted_seconds() {
        // 效率 100% 不变
        assert_eq!(step(20.0).adjusted_seconds_per_piece(100.0), 20.0);
        // 效率 50% 工时翻倍
        assert_eq!(step(20.0).adjusted_seconds_per_piece(50.0), 40.0);
        // 非法效率系数退回标准工时
        assert_eq!(step(20.0).adjusted_seconds_per_piece(0.0), 20.0);
    }
}

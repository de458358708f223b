// ==========================================
// 车间生产排产系统 - 工序依赖检查
// ==========================================
// 职责: 排产前对工序依赖图做显式环路检测
// 红线: 依赖关系按约定为 DAG，但不可依赖约定——
//       检测到环路立即失败并指明工序，禁止进入分配循环
// ==========================================

use crate::domain::product::ProductStep;
use crate::engine::EngineError;
use std::collections::HashMap;

/// DFS 着色状态
#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    InStack,
    Done,
}

/// 校验工序依赖图无环且所有前序工序存在
///
/// 迭代式 DFS，避免深依赖链栈溢出
pub fn check_dependencies(steps: &[ProductStep]) -> Result<(), EngineError> {
    let index: HashMap<&str, &ProductStep> =
        steps.iter().map(|s| (s.step_id.as_str(), s)).collect();

    let mut state: HashMap<&str, VisitState> = steps
        .iter()
        .map(|s| (s.step_id.as_str(), VisitState::Unvisited))
        .collect();

    for start in steps {
        if state[start.step_id.as_str()] != VisitState::Unvisited {
            continue;
        }

        // 栈帧: (工序ID, 下一个待访问的依赖下标)
        let mut stack: Vec<(&str, usize)> = vec![(start.step_id.as_str(), 0)];
        state.insert(start.step_id.as_str(), VisitState::InStack);

        while let Some((step_id, dep_idx)) = stack.pop() {
            let step = index[step_id];

            if dep_idx >= step.dependencies.len() {
                state.insert(step_id, VisitState::Done);
                continue;
            }

            stack.push((step_id, dep_idx + 1));

            let pred_id = step.dependencies[dep_idx].predecessor_step_id.as_str();
            let pred = index.get(pred_id).ok_or_else(|| EngineError::MissingStep {
                step_id: step_id.to_string(),
                predecessor_id: pred_id.to_string(),
            })?;

            match state[pred.step_id.as_str()] {
                VisitState::InStack => {
                    return Err(EngineError::DependencyCycle {
                        step_id: pred_id.to_string(),
                    });
                }
                VisitState::Unvisited => {
                    state.insert(pred.step_id.as_str(), VisitState::InStack);
                    stack.push((pred.step_id.as_str(), 0));
                }
                VisitState::Done => {}
            }
        }
    }

    Ok(())
}

// ==========================================
// UMKM 餐饮经营自动化 - 生产排程领域模型
// ==========================================
// 职责: 生产任务、日排程、冲突与优化建议
// 说明: 排程是输入（订单/原料/配方）的纯投影，每次重新生成而非修补
// ==========================================

use crate::domain::types::{TaskPriority, TaskStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 任务原料需求（已换算为原料库存单位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub required: f64,
    pub available: f64,
    pub shortage: f64,
    pub unit: String,
}

/// 生产任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTask {
    /// 格式: task_{order_id}_{item_id}
    pub id: String,
    pub order_id: String,
    pub order_no: String,
    pub recipe_id: String,
    pub recipe_name: String,
    pub quantity: u32,
    pub batch_count: u32,
    pub estimated_duration_hours: f64,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub blocked_reason: Option<String>,
    pub ingredient_requirements: Vec<IngredientRequirement>,
}

/// 非法的任务状态转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的任务状态转换: from={from} to={to}")]
pub struct InvalidTaskTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl ProductionTask {
    /// 外部驱动的状态转换
    ///
    /// # 规则
    /// - Planned → InProgress / Completed / Blocked
    /// - InProgress → Completed / Blocked
    /// - Blocked → Planned
    /// - Completed 为终态
    /// - 同状态转换视为无操作
    ///
    /// # 返回
    /// - Ok(previous): 转换前状态
    pub fn transition(&mut self, to: TaskStatus) -> Result<TaskStatus, InvalidTaskTransition> {
        let from = self.status;
        if from == to {
            return Ok(from);
        }

        let allowed = matches!(
            (from, to),
            (TaskStatus::Planned, TaskStatus::InProgress)
                | (TaskStatus::Planned, TaskStatus::Completed)
                | (TaskStatus::Planned, TaskStatus::Blocked)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Blocked)
                | (TaskStatus::Blocked, TaskStatus::Planned)
        );
        if !allowed {
            return Err(InvalidTaskTransition { from, to });
        }

        self.status = to;
        if to != TaskStatus::Blocked {
            self.blocked_reason = None;
        }
        Ok(from)
    }

    pub fn is_blocked(&self) -> bool {
        self.status == TaskStatus::Blocked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    IngredientShortage,
}

/// 排程冲突（当日原料总需求超过库存）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub kind: ConflictKind,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub description: String,
    pub required: f64,
    pub available: f64,
    pub unit: String,
    pub affected_tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationKind {
    /// 同配方任务合并生产
    BatchCombination,
    /// 当日工时超出产能
    CapacityOverload,
}

/// 排程优化建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptimization {
    pub kind: OptimizationKind,
    pub recipe_id: Option<String>,
    pub description: String,
    pub time_saved_hours: f64,
    pub recommendation: String,
    pub affected_tasks: Vec<String>,
}

/// 日生产排程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSchedule {
    /// 格式: schedule_{date}
    pub id: String,
    pub date: NaiveDate,
    pub tasks: Vec<ProductionTask>,
    pub total_duration_hours: f64,
    pub workload_percent: f64,
    pub conflicts: Vec<ScheduleConflict>,
    pub optimizations: Vec<ScheduleOptimization>,
}

impl ProductionSchedule {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            id: format!("schedule_{}", date),
            date,
            tasks: Vec::new(),
            total_duration_hours: 0.0,
            workload_percent: 0.0,
            conflicts: Vec::new(),
            optimizations: Vec::new(),
        }
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut ProductionTask> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn blocked_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_blocked()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> ProductionTask {
        ProductionTask {
            id: "task_O1_I1".to_string(),
            order_id: "O1".to_string(),
            order_no: "ORD-001".to_string(),
            recipe_id: "R1".to_string(),
            recipe_name: "Roti Tawar".to_string(),
            quantity: 10,
            batch_count: 1,
            estimated_duration_hours: 1.0,
            planned_start: None,
            planned_end: None,
            priority: TaskPriority::Medium,
            status,
            blocked_reason: None,
            ingredient_requirements: vec![],
        }
    }

    #[test]
    fn test_valid_transitions() {
        let mut t = task(TaskStatus::Planned);
        assert_eq!(t.transition(TaskStatus::InProgress).unwrap(), TaskStatus::Planned);
        assert_eq!(t.transition(TaskStatus::Completed).unwrap(), TaskStatus::InProgress);
        assert_eq!(t.status, TaskStatus::Completed);
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut t = task(TaskStatus::Completed);
        let err = t.transition(TaskStatus::Planned).unwrap_err();
        assert_eq!(err.from, TaskStatus::Completed);
        assert_eq!(err.to, TaskStatus::Planned);
    }

    #[test]
    fn test_unblock_clears_reason() {
        let mut t = task(TaskStatus::Blocked);
        t.blocked_reason = Some("Tepung kurang".to_string());
        t.transition(TaskStatus::Planned).unwrap();
        assert!(t.blocked_reason.is_none());
        assert!(t.transition(TaskStatus::Planned).is_ok());
    }

    #[test]
    fn test_blocked_cannot_complete_directly() {
        let mut t = task(TaskStatus::Blocked);
        assert!(t.transition(TaskStatus::Completed).is_err());
    }
}

// ==========================================
// UMKM 餐饮经营自动化 - 配方领域模型
// ==========================================

use serde::{Deserialize, Serialize};

/// 配方用料行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub ingredient_id: String,
    /// 每份用量（以 unit 计）
    pub quantity: f64,
    pub unit: String,
}

/// 配方 (Recipe)
///
/// servings 为单批产出份数；prep/cook 时间按单批计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub servings: u32,
    pub prep_time_minutes: u32,
    pub cook_time_minutes: u32,
    pub selling_price: Option<f64>,
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    /// 单批总工时（分钟）
    pub fn total_minutes(&self) -> u32 {
        self.prep_time_minutes + self.cook_time_minutes
    }

    /// 单批总工时（小时）
    pub fn total_hours(&self) -> f64 {
        f64::from(self.total_minutes()) / 60.0
    }

    pub fn uses_ingredient(&self, ingredient_id: &str) -> bool {
        self.ingredients.iter().any(|ri| ri.ingredient_id == ingredient_id)
    }
}

// ==========================================
// UMKM 餐饮经营自动化 - 原料领域模型
// ==========================================
// 职责: 原料实体与计量单位换算
// 红线: current_stock / min_stock 不为负; min_stock = 0 表示不设下限
// ==========================================

use serde::{Deserialize, Serialize};

/// 原料 (Ingredient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    /// 库存计量单位（kg / liter / butir ...）
    pub unit: String,
    pub current_stock: f64,
    pub min_stock: f64,
    /// 单价（按 unit 计）；None 表示尚未录入价格，区别于 0 元
    pub price_per_unit: Option<f64>,
}

impl Ingredient {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
        current_stock: f64,
        min_stock: f64,
        price_per_unit: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            current_stock,
            min_stock,
            price_per_unit,
        }
    }

    /// 价格缺失时按 0 计
    pub fn price_or_zero(&self) -> f64 {
        self.price_per_unit.unwrap_or(0.0)
    }

    /// 库存总价值
    pub fn stock_value(&self) -> f64 {
        self.current_stock * self.price_or_zero()
    }
}

// ==========================================
// 计量单位换算
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Mass,
    Volume,
}

/// 返回 (量纲, 换算到基准单位的系数)；基准单位为 kg / liter
fn unit_scale(unit: &str) -> Option<(Dimension, f64)> {
    match unit.trim().to_lowercase().as_str() {
        "g" | "gr" | "gram" => Some((Dimension::Mass, 0.001)),
        "kg" | "kilogram" => Some((Dimension::Mass, 1.0)),
        "ml" | "mililiter" | "milliliter" => Some((Dimension::Volume, 0.001)),
        "l" | "liter" | "litre" => Some((Dimension::Volume, 1.0)),
        _ => None,
    }
}

/// 将 quantity 从 from 单位换算为 to 单位
///
/// # 说明
/// - 同名单位（大小写不敏感）原样返回
/// - g↔kg、ml↔liter 按 1000 换算
/// - 量纲不同或单位未知时不做换算（按计件单位处理，如 butir / lembar）
pub fn convert_quantity(quantity: f64, from: &str, to: &str) -> f64 {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return quantity;
    }

    match (unit_scale(from), unit_scale(to)) {
        (Some((from_dim, from_scale)), Some((to_dim, to_scale))) if from_dim == to_dim => {
            quantity * from_scale / to_scale
        }
        _ => {
            tracing::debug!(from = from, to = to, "单位无法换算，按原数量处理");
            quantity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_mass_and_volume() {
        assert!((convert_quantity(250.0, "g", "kg") - 0.25).abs() < 1e-12);
        assert!((convert_quantity(2.0, "kg", "gram") - 2000.0).abs() < 1e-9);
        assert!((convert_quantity(500.0, "ml", "liter") - 0.5).abs() < 1e-12);
        assert_eq!(convert_quantity(3.0, "KG", "kg"), 3.0);
    }

    #[test]
    fn test_convert_incompatible_units_is_identity() {
        assert_eq!(convert_quantity(4.0, "butir", "kg"), 4.0);
        assert_eq!(convert_quantity(4.0, "g", "ml"), 4.0);
    }

    #[test]
    fn test_price_or_zero() {
        let ing = Ingredient::new("ING-1", "Tepung", "kg", 5.0, 10.0, None);
        assert_eq!(ing.price_or_zero(), 0.0);
        assert_eq!(ing.stock_value(), 0.0);
    }
}

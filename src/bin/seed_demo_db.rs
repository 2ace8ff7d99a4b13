// Dev utility: create (or refresh) a demo database with ingredients, recipes,
// operational costs, upcoming orders and 30 days of usage history.
//
// Usage:
//   cargo run --bin seed_demo_db -- [db_path]
//
// Existing rows with the same ids are overwritten; nothing else is deleted.

use chrono::{Duration, Local, NaiveTime};
use umkm_automation::domain::{
    default_operational_costs, Ingredient, Order, OrderItem, OrderStatus, Recipe,
    RecipeIngredient, StockTransaction, StockTransactionKind,
};
use umkm_automation::repository::{AutomationStore, SqliteStore};

fn recipe(
    id: &str,
    name: &str,
    servings: u32,
    prep: u32,
    cook: u32,
    price: f64,
    lines: &[(&str, f64, &str)],
) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: name.to_string(),
        servings,
        prep_time_minutes: prep,
        cook_time_minutes: cook,
        selling_price: Some(price),
        ingredients: lines
            .iter()
            .map(|(ingredient_id, quantity, unit)| RecipeIngredient {
                ingredient_id: ingredient_id.to_string(),
                quantity: *quantity,
                unit: unit.to_string(),
            })
            .collect(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    umkm_automation::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "umkm_automation.db".to_string());
    let store = SqliteStore::open(&db_path)?;

    let ingredients = vec![
        Ingredient::new("flour", "Tepung Terigu", "kg", 25.0, 10.0, Some(12_000.0)),
        Ingredient::new("sugar", "Gula Pasir", "kg", 4.0, 5.0, Some(15_000.0)),
        Ingredient::new("butter", "Mentega", "kg", 6.0, 2.0, Some(45_000.0)),
        Ingredient::new("eggs", "Telur", "butir", 60.0, 30.0, Some(2_000.0)),
        Ingredient::new("milk", "Susu Cair", "liter", 12.0, 4.0, Some(18_000.0)),
        Ingredient::new("chocolate", "Cokelat Batang", "kg", 0.0, 1.0, Some(90_000.0)),
        Ingredient::new("vanilla", "Vanili", "gram", 50.0, 0.0, None),
    ];
    for ingredient in &ingredients {
        store.upsert_ingredient(ingredient)?;
    }

    let recipes = vec![
        recipe(
            "roti-manis",
            "Roti Manis",
            20,
            45,
            30,
            5_000.0,
            &[
                ("flour", 0.05, "kg"),
                ("sugar", 10.0, "gram"),
                ("butter", 0.01, "kg"),
                ("eggs", 0.25, "butir"),
                ("milk", 20.0, "ml"),
            ],
        ),
        recipe(
            "kue-cokelat",
            "Kue Cokelat",
            12,
            30,
            60,
            12_000.0,
            &[
                ("flour", 0.03, "kg"),
                ("sugar", 0.02, "kg"),
                ("butter", 0.015, "kg"),
                ("eggs", 0.5, "butir"),
                ("chocolate", 25.0, "gram"),
                ("vanilla", 1.0, "gram"),
            ],
        ),
        recipe(
            "donat",
            "Donat Gula",
            24,
            40,
            20,
            4_000.0,
            &[
                ("flour", 0.04, "kg"),
                ("sugar", 0.01, "kg"),
                ("eggs", 0.2, "butir"),
                ("milk", 0.015, "liter"),
            ],
        ),
    ];
    for recipe in &recipes {
        store.upsert_recipe(recipe)?;
    }

    for cost in default_operational_costs() {
        store.upsert_operational_cost(&cost)?;
    }

    let today = Local::now().date_naive();
    let orders = vec![
        ("ord-001", "ORD-001", Some("Bu Sari"), 0, 10, "roti-manis", 40, 200_000.0),
        ("ord-002", "ORD-002", Some("Kafe Senja"), 1, 14, "kue-cokelat", 24, 288_000.0),
        ("ord-003", "ORD-003", None, 1, 9, "donat", 48, 192_000.0),
        ("ord-004", "ORD-004", Some("Pak Budi"), 3, 16, "roti-manis", 60, 300_000.0),
    ];
    for (id, no, customer, day, hour, recipe_id, quantity, total) in orders {
        let delivery = (today + Duration::days(day))
            .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN));
        let order = Order {
            id: id.to_string(),
            order_no: no.to_string(),
            customer_id: customer.map(|name| name.to_lowercase().replace(' ', "-")),
            customer_name: customer.map(str::to_string),
            status: OrderStatus::Confirmed,
            delivery_at: Some(delivery),
            total_amount: total,
            items: vec![OrderItem {
                id: format!("{}-1", id),
                recipe_id: recipe_id.to_string(),
                quantity,
            }],
        };
        store.upsert_order(&order)?;
    }

    // 30 天用量历史（后半段用量上升）
    let start = (today - Duration::days(30)).and_time(NaiveTime::MIN);
    let daily_usage = [
        ("flour", 1.2),
        ("sugar", 0.6),
        ("butter", 0.3),
        ("eggs", 8.0),
        ("milk", 0.8),
    ];
    for day in 0..30 {
        let factor = if day >= 15 { 1.3 } else { 1.0 };
        let occurred_at = start + Duration::days(day) + Duration::hours(15);
        for (ingredient_id, quantity) in daily_usage {
            let tx = StockTransaction::new(
                ingredient_id,
                -(quantity * factor),
                StockTransactionKind::Usage,
                format!("seed-usage-{}", day),
                None,
                occurred_at,
            );
            store.record_stock_transaction(&tx).await?;
        }
    }

    tracing::info!(
        db_path = %db_path,
        ingredients = ingredients.len(),
        recipes = recipes.len(),
        "演示数据写入完成"
    );
    println!("seeded demo data into {}", db_path);

    Ok(())
}

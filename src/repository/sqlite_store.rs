// ==========================================
// UMKM 餐饮经营自动化 - SQLite 数据存储
// ==========================================
// 职责: AutomationStore 的 rusqlite 实现 + 基础数据写入（种子/测试）
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use crate::domain::{
    CustomerStats, FinancialRecord, Ingredient, OperationalCost, Order, OrderCompletion,
    OrderItem, OrderStatus, ParseEnumError, Recipe, RecipeCost, RecipeIngredient,
    SmartNotification, StockTransaction, StockTransactionKind, UsageRecord,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::AutomationStore;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// 时间列统一格式（定宽，便于按 TEXT 比较）
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

fn parse_datetime(idx: usize, raw: &str) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_date(idx: usize, raw: &str) -> SqliteResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T>(idx: usize, raw: &str) -> SqliteResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ==========================================
// SqliteStore
// ==========================================

/// 基于单连接（Arc<Mutex<Connection>>）的数据存储
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开数据库文件并确保表结构存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;
        tracing::info!(db_path = db_path, "SqliteStore 已打开");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_sqlite_connection(&conn)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 基础数据写入（种子数据 / 测试）
    // ==========================================

    pub fn upsert_ingredient(&self, ingredient: &Ingredient) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO ingredient (ingredient_id, name, unit, current_stock, min_stock, price_per_unit)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(ingredient_id) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                current_stock = excluded.current_stock,
                min_stock = excluded.min_stock,
                price_per_unit = excluded.price_per_unit,
                updated_at = datetime('now')
            "#,
            params![
                ingredient.id,
                ingredient.name,
                ingredient.unit,
                ingredient.current_stock,
                ingredient.min_stock,
                ingredient.price_per_unit
            ],
        )?;
        Ok(())
    }

    /// 写入配方（用料整体替换）
    pub fn upsert_recipe(&self, recipe: &Recipe) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO recipe (recipe_id, name, servings, prep_time_minutes, cook_time_minutes, selling_price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(recipe_id) DO UPDATE SET
                name = excluded.name,
                servings = excluded.servings,
                prep_time_minutes = excluded.prep_time_minutes,
                cook_time_minutes = excluded.cook_time_minutes,
                selling_price = excluded.selling_price
            "#,
            params![
                recipe.id,
                recipe.name,
                recipe.servings,
                recipe.prep_time_minutes,
                recipe.cook_time_minutes,
                recipe.selling_price
            ],
        )?;
        tx.execute("DELETE FROM recipe_ingredient WHERE recipe_id = ?1", params![recipe.id])?;
        for ri in &recipe.ingredients {
            tx.execute(
                "INSERT INTO recipe_ingredient (recipe_id, ingredient_id, quantity, unit) VALUES (?1, ?2, ?3, ?4)",
                params![recipe.id, ri.ingredient_id, ri.quantity, ri.unit],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_operational_cost(&self, cost: &OperationalCost) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO operational_cost (cost_id, name, category, amount, period, is_active, auto_allocate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(cost_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                amount = excluded.amount,
                period = excluded.period,
                is_active = excluded.is_active,
                auto_allocate = excluded.auto_allocate,
                updated_at = datetime('now')
            "#,
            params![
                cost.id,
                cost.name,
                cost.category.as_str(),
                cost.amount,
                cost.period.as_str(),
                cost.is_active,
                cost.auto_allocate
            ],
        )?;
        Ok(())
    }

    /// 写入订单（明细整体替换）
    pub fn upsert_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO customer_order (
                order_id, order_no, customer_id, customer_name, status, delivery_at, total_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(order_id) DO UPDATE SET
                order_no = excluded.order_no,
                customer_id = excluded.customer_id,
                customer_name = excluded.customer_name,
                status = excluded.status,
                delivery_at = excluded.delivery_at,
                total_amount = excluded.total_amount
            "#,
            params![
                order.id,
                order.order_no,
                order.customer_id,
                order.customer_name,
                order.status.as_str(),
                order.delivery_at.map(fmt_datetime),
                order.total_amount
            ],
        )?;
        tx.execute("DELETE FROM order_item WHERE order_id = ?1", params![order.id])?;
        for item in &order.items {
            tx.execute(
                "INSERT INTO order_item (item_id, order_id, recipe_id, quantity) VALUES (?1, ?2, ?3, ?4)",
                params![item.id, order.id, item.recipe_id, item.quantity],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_ingredient(row: &Row<'_>) -> SqliteResult<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            unit: row.get(2)?,
            current_stock: row.get(3)?,
            min_stock: row.get(4)?,
            price_per_unit: row.get(5)?,
        })
    }

    fn map_operational_cost(row: &Row<'_>) -> SqliteResult<OperationalCost> {
        Ok(OperationalCost {
            id: row.get(0)?,
            name: row.get(1)?,
            category: parse_enum(2, &row.get::<_, String>(2)?)?,
            amount: row.get(3)?,
            period: parse_enum(4, &row.get::<_, String>(4)?)?,
            is_active: row.get(5)?,
            auto_allocate: row.get(6)?,
        })
    }

    fn map_notification(row: &Row<'_>) -> SqliteResult<SmartNotification> {
        let data_json: String = row.get(6)?;
        let data = serde_json::from_str(&data_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
        Ok(SmartNotification {
            id: row.get(0)?,
            kind: parse_enum(1, &row.get::<_, String>(1)?)?,
            category: parse_enum(2, &row.get::<_, String>(2)?)?,
            priority: parse_enum(3, &row.get::<_, String>(3)?)?,
            title: row.get(4)?,
            message: row.get(5)?,
            data,
            timestamp: parse_datetime(7, &row.get::<_, String>(7)?)?,
            is_read: row.get(8)?,
        })
    }

    fn map_stock_transaction(row: &Row<'_>) -> SqliteResult<StockTransaction> {
        Ok(StockTransaction {
            id: row.get(0)?,
            ingredient_id: row.get(1)?,
            quantity: row.get(2)?,
            kind: parse_enum(3, &row.get::<_, String>(3)?)?,
            reference: row.get(4)?,
            unit_price: row.get(5)?,
            occurred_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
        })
    }

    fn load_recipe_ingredients(
        conn: &Connection,
        recipe_id: &str,
    ) -> RepositoryResult<Vec<RecipeIngredient>> {
        let mut stmt = conn.prepare(
            "SELECT ingredient_id, quantity, unit FROM recipe_ingredient WHERE recipe_id = ?1 ORDER BY ingredient_id",
        )?;
        let items = stmt
            .query_map(params![recipe_id], |row| {
                Ok(RecipeIngredient {
                    ingredient_id: row.get(0)?,
                    quantity: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    fn load_recipes(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<Recipe>> {
        let mut stmt = conn.prepare(sql)?;
        let heads = stmt
            .query_map(args, |row| {
                Ok(Recipe {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    servings: row.get(2)?,
                    prep_time_minutes: row.get(3)?,
                    cook_time_minutes: row.get(4)?,
                    selling_price: row.get(5)?,
                    ingredients: Vec::new(),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut recipes = Vec::with_capacity(heads.len());
        for mut recipe in heads {
            recipe.ingredients = Self::load_recipe_ingredients(conn, &recipe.id)?;
            recipes.push(recipe);
        }
        Ok(recipes)
    }

    fn load_orders(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<Order>> {
        let mut stmt = conn.prepare(sql)?;
        let heads = stmt
            .query_map(args, |row| {
                let delivery_at = match row.get::<_, Option<String>>(5)? {
                    Some(raw) => Some(parse_datetime(5, &raw)?),
                    None => None,
                };
                Ok(Order {
                    id: row.get(0)?,
                    order_no: row.get(1)?,
                    customer_id: row.get(2)?,
                    customer_name: row.get(3)?,
                    status: parse_enum(4, &row.get::<_, String>(4)?)?,
                    delivery_at,
                    total_amount: row.get(6)?,
                    items: Vec::new(),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut item_stmt = conn.prepare(
            "SELECT item_id, recipe_id, quantity FROM order_item WHERE order_id = ?1 ORDER BY item_id",
        )?;
        let mut orders = Vec::with_capacity(heads.len());
        for mut order in heads {
            order.items = item_stmt
                .query_map(params![order.id], |row| {
                    Ok(OrderItem {
                        id: row.get(0)?,
                        recipe_id: row.get(1)?,
                        quantity: row.get(2)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            orders.push(order);
        }
        Ok(orders)
    }

    // ==========================================
    // 事务内写入（conn 可为 Transaction）
    // ==========================================

    fn insert_stock_transaction(conn: &Connection, tx: &StockTransaction) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO stock_transaction (tx_id, ingredient_id, quantity, kind, reference, unit_price, occurred_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                tx.id,
                tx.ingredient_id,
                tx.quantity,
                tx.kind.as_str(),
                tx.reference,
                tx.unit_price,
                fmt_datetime(tx.occurred_at)
            ],
        )?;
        Ok(())
    }

    fn insert_financial_record(conn: &Connection, record: &FinancialRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO financial_record (record_id, kind, category, amount, reference, description, record_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.kind.as_str(),
                record.category,
                record.amount,
                record.reference,
                record.description,
                record.record_date.format(DATE_FMT).to_string()
            ],
        )?;
        Ok(())
    }

    /// 按流水数量调整库存，结果不低于 0
    fn apply_stock_delta(conn: &Connection, tx: &StockTransaction) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE ingredient SET current_stock = MAX(current_stock + ?1, 0), updated_at = datetime('now') WHERE ingredient_id = ?2",
            params![tx.quantity, tx.ingredient_id],
        )?;
        Self::ensure_updated(affected, "Ingredient", &tx.ingredient_id)
    }

    fn has_transaction_kind(
        conn: &Connection,
        reference: &str,
        kind: StockTransactionKind,
    ) -> RepositoryResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM stock_transaction WHERE reference = ?1 AND kind = ?2 LIMIT 1",
                params![reference, kind.as_str()],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    fn ensure_updated(affected: usize, entity: &str, id: &str) -> RepositoryResult<()> {
        if affected == 0 {
            return Err(RepositoryError::not_found(entity, id));
        }
        Ok(())
    }
}

const RECIPE_COLUMNS: &str =
    "SELECT recipe_id, name, servings, prep_time_minutes, cook_time_minutes, selling_price FROM recipe";
const ORDER_COLUMNS: &str = "SELECT order_id, order_no, customer_id, customer_name, status, delivery_at, total_amount FROM customer_order";
const NOTIFICATION_COLUMNS: &str =
    "SELECT notification_id, kind, category, priority, title, message, data_json, created_at, is_read FROM notification";

// ==========================================
// AutomationStore 实现
// ==========================================
#[async_trait]
impl AutomationStore for SqliteStore {
    async fn get_ingredient(&self, ingredient_id: &str) -> RepositoryResult<Option<Ingredient>> {
        let conn = self.get_conn()?;
        let ingredient = conn
            .query_row(
                "SELECT ingredient_id, name, unit, current_stock, min_stock, price_per_unit FROM ingredient WHERE ingredient_id = ?1",
                params![ingredient_id],
                Self::map_ingredient,
            )
            .optional()?;
        Ok(ingredient)
    }

    async fn list_ingredients(&self) -> RepositoryResult<Vec<Ingredient>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT ingredient_id, name, unit, current_stock, min_stock, price_per_unit FROM ingredient ORDER BY ingredient_id",
        )?;
        let items = stmt
            .query_map([], Self::map_ingredient)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    async fn update_ingredient_price(
        &self,
        ingredient_id: &str,
        new_price: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE ingredient SET price_per_unit = ?1, updated_at = datetime('now') WHERE ingredient_id = ?2",
            params![new_price, ingredient_id],
        )?;
        Self::ensure_updated(affected, "Ingredient", ingredient_id)
    }

    async fn get_recipe(&self, recipe_id: &str) -> RepositoryResult<Option<Recipe>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE recipe_id = ?1", RECIPE_COLUMNS);
        let mut recipes = Self::load_recipes(&conn, &sql, &[&recipe_id])?;
        Ok(recipes.pop())
    }

    async fn list_recipes(&self) -> RepositoryResult<Vec<Recipe>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY recipe_id", RECIPE_COLUMNS);
        Self::load_recipes(&conn, &sql, &[])
    }

    async fn list_recipes_using_ingredient(
        &self,
        ingredient_id: &str,
    ) -> RepositoryResult<Vec<Recipe>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE recipe_id IN (SELECT recipe_id FROM recipe_ingredient WHERE ingredient_id = ?1) ORDER BY recipe_id",
            RECIPE_COLUMNS
        );
        Self::load_recipes(&conn, &sql, &[&ingredient_id])
    }

    async fn list_operational_costs(&self) -> RepositoryResult<Vec<OperationalCost>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT cost_id, name, category, amount, period, is_active, auto_allocate FROM operational_cost ORDER BY cost_id",
        )?;
        let costs = stmt
            .query_map([], Self::map_operational_cost)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(costs)
    }

    async fn get_operational_cost(
        &self,
        cost_id: &str,
    ) -> RepositoryResult<Option<OperationalCost>> {
        let conn = self.get_conn()?;
        let cost = conn
            .query_row(
                "SELECT cost_id, name, category, amount, period, is_active, auto_allocate FROM operational_cost WHERE cost_id = ?1",
                params![cost_id],
                Self::map_operational_cost,
            )
            .optional()?;
        Ok(cost)
    }

    async fn update_operational_cost_amount(
        &self,
        cost_id: &str,
        amount: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE operational_cost SET amount = ?1, updated_at = datetime('now') WHERE cost_id = ?2",
            params![amount, cost_id],
        )?;
        Self::ensure_updated(affected, "OperationalCost", cost_id)
    }

    async fn get_order(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE order_id = ?1", ORDER_COLUMNS);
        let mut orders = Self::load_orders(&conn, &sql, &[&order_id])?;
        Ok(orders.pop())
    }

    async fn list_orders_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE delivery_at >= ?1 AND delivery_at < ?2 ORDER BY delivery_at, order_id",
            ORDER_COLUMNS
        );
        let (from, to) = (fmt_datetime(from), fmt_datetime(to));
        Self::load_orders(&conn, &sql, &[&from, &to])
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE customer_order SET status = ?1 WHERE order_id = ?2",
            params![status.as_str(), order_id],
        )?;
        Self::ensure_updated(affected, "Order", order_id)
    }

    async fn save_recipe_cost(&self, cost: &RecipeCost) -> RepositoryResult<()> {
        let missing = serde_json::to_string(&cost.missing_prices)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO recipe_cost (
                recipe_id, recipe_name, material_cost, labor_cost, overhead_cost,
                total_cost, cost_per_serving, missing_prices_json, last_calculated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(recipe_id) DO UPDATE SET
                recipe_name = excluded.recipe_name,
                material_cost = excluded.material_cost,
                labor_cost = excluded.labor_cost,
                overhead_cost = excluded.overhead_cost,
                total_cost = excluded.total_cost,
                cost_per_serving = excluded.cost_per_serving,
                missing_prices_json = excluded.missing_prices_json,
                last_calculated = excluded.last_calculated
            "#,
            params![
                cost.recipe_id,
                cost.recipe_name,
                cost.material_cost,
                cost.labor_cost,
                cost.overhead_cost,
                cost.total_cost,
                cost.cost_per_serving,
                missing,
                fmt_datetime(cost.last_calculated)
            ],
        )?;
        Ok(())
    }

    async fn get_recipe_cost(&self, recipe_id: &str) -> RepositoryResult<Option<RecipeCost>> {
        let conn = self.get_conn()?;
        let cost = conn
            .query_row(
                r#"
                SELECT recipe_id, recipe_name, material_cost, labor_cost, overhead_cost,
                       total_cost, cost_per_serving, missing_prices_json, last_calculated
                FROM recipe_cost WHERE recipe_id = ?1
                "#,
                params![recipe_id],
                |row| {
                    let missing_json: String = row.get(7)?;
                    let missing_prices = serde_json::from_str(&missing_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
                    })?;
                    Ok(RecipeCost {
                        recipe_id: row.get(0)?,
                        recipe_name: row.get(1)?,
                        material_cost: row.get(2)?,
                        labor_cost: row.get(3)?,
                        overhead_cost: row.get(4)?,
                        total_cost: row.get(5)?,
                        cost_per_serving: row.get(6)?,
                        missing_prices,
                        last_calculated: parse_datetime(8, &row.get::<_, String>(8)?)?,
                    })
                },
            )
            .optional()?;
        Ok(cost)
    }

    async fn save_notification(&self, notification: &SmartNotification) -> RepositoryResult<()> {
        let data_json = serde_json::to_string(&notification.data)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO notification (
                notification_id, kind, category, priority, title, message, data_json, created_at, is_read
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(notification_id) DO UPDATE SET is_read = excluded.is_read
            "#,
            params![
                notification.id,
                notification.kind.as_str(),
                notification.category.as_str(),
                notification.priority.as_str(),
                notification.title,
                notification.message,
                data_json,
                fmt_datetime(notification.timestamp),
                notification.is_read
            ],
        )?;
        Ok(())
    }

    async fn list_notifications(&self, limit: usize) -> RepositoryResult<Vec<SmartNotification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            NOTIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let list = stmt
            .query_map(params![limit], Self::map_notification)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(list)
    }

    async fn record_stock_transaction(&self, tx: &StockTransaction) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_stock_transaction(&conn, tx)
    }

    async fn list_stock_transactions_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Vec<StockTransaction>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT tx_id, ingredient_id, quantity, kind, reference, unit_price, occurred_at
            FROM stock_transaction WHERE reference = ?1
            ORDER BY occurred_at, rowid
            "#,
        )?;
        let list = stmt
            .query_map(params![reference], Self::map_stock_transaction)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(list)
    }

    async fn apply_order_completion(
        &self,
        completion: &OrderCompletion,
    ) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let order_id = completion.order_id.as_str();
        let has_income: bool = tx
            .query_row(
                "SELECT 1 FROM financial_record WHERE reference = ?1 LIMIT 1",
                params![order_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if has_income || Self::has_transaction_kind(&tx, order_id, StockTransactionKind::Usage)? {
            return Ok(false);
        }

        for usage in &completion.usages {
            Self::apply_stock_delta(&tx, usage)?;
            Self::insert_stock_transaction(&tx, usage)?;
        }
        Self::insert_financial_record(&tx, &completion.income)?;

        if let Some(customer_id) = &completion.customer_id {
            tx.execute(
                r#"
                INSERT INTO customer_stats (
                    customer_id, total_orders, total_spent, average_order_value, last_order_date
                ) VALUES (?1, 1, ?2, ?2, ?3)
                ON CONFLICT(customer_id) DO UPDATE SET
                    total_orders = total_orders + 1,
                    total_spent = total_spent + excluded.total_spent,
                    average_order_value = (total_spent + excluded.total_spent) / (total_orders + 1),
                    last_order_date = excluded.last_order_date
                "#,
                params![
                    customer_id,
                    completion.income.amount,
                    completion.income.record_date.format(DATE_FMT).to_string()
                ],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    async fn apply_order_cancellation(
        &self,
        order_id: &str,
        restocks: &[StockTransaction],
    ) -> RepositoryResult<Option<usize>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        if Self::has_transaction_kind(&tx, order_id, StockTransactionKind::Adjustment)? {
            return Ok(None);
        }

        for restock in restocks {
            Self::apply_stock_delta(&tx, restock)?;
            Self::insert_stock_transaction(&tx, restock)?;
        }
        let removed = tx.execute(
            "DELETE FROM financial_record WHERE reference = ?1",
            params![order_id],
        )?;

        tx.commit()?;
        Ok(Some(removed))
    }

    async fn list_financial_records_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Vec<FinancialRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT record_id, kind, category, amount, reference, description, record_date
            FROM financial_record WHERE reference = ?1
            ORDER BY record_date, rowid
            "#,
        )?;
        let list = stmt
            .query_map(params![reference], |row| {
                Ok(FinancialRecord {
                    id: row.get(0)?,
                    kind: parse_enum(1, &row.get::<_, String>(1)?)?,
                    category: row.get(2)?,
                    amount: row.get(3)?,
                    reference: row.get(4)?,
                    description: row.get(5)?,
                    record_date: parse_date(6, &row.get::<_, String>(6)?)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(list)
    }

    async fn get_customer_stats(
        &self,
        customer_id: &str,
    ) -> RepositoryResult<Option<CustomerStats>> {
        let conn = self.get_conn()?;
        let stats = conn
            .query_row(
                r#"
                SELECT customer_id, total_orders, total_spent, average_order_value, last_order_date
                FROM customer_stats WHERE customer_id = ?1
                "#,
                params![customer_id],
                |row| {
                    let last_order_date = match row.get::<_, Option<String>>(4)? {
                        Some(raw) => Some(parse_date(4, &raw)?),
                        None => None,
                    };
                    Ok(CustomerStats {
                        customer_id: row.get(0)?,
                        total_orders: row.get(1)?,
                        total_spent: row.get(2)?,
                        average_order_value: row.get(3)?,
                        last_order_date,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    async fn usage_since(
        &self,
        ingredient_id: &str,
        since: NaiveDateTime,
    ) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(ABS(quantity)), 0)
            FROM stock_transaction
            WHERE ingredient_id = ?1 AND kind = ?2 AND occurred_at >= ?3
            "#,
            params![
                ingredient_id,
                StockTransactionKind::Usage.as_str(),
                fmt_datetime(since)
            ],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    async fn daily_usage_since(
        &self,
        ingredient_id: &str,
        since: NaiveDateTime,
    ) -> RepositoryResult<Vec<UsageRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT substr(occurred_at, 1, 10) AS day, SUM(ABS(quantity))
            FROM stock_transaction
            WHERE ingredient_id = ?1 AND kind = ?2 AND occurred_at >= ?3
            GROUP BY day
            ORDER BY day
            "#,
        )?;
        let records = stmt
            .query_map(
                params![
                    ingredient_id,
                    StockTransactionKind::Usage.as_str(),
                    fmt_datetime(since)
                ],
                |row| {
                    Ok(UsageRecord {
                        date: parse_date(0, &row.get::<_, String>(0)?)?,
                        quantity: row.get(1)?,
                    })
                },
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}

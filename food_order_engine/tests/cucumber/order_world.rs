use std::collections::HashMap;

use cucumber::World;
use food_order_engine::{
    db_types::Order,
    events::EventProducers,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    CouponApi,
    LoyaltyApi,
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct FoodOrderWorld {
    pub system: Option<FoodOrderSystem>,
    /// Orders placed in the scenario, by the name the scenario gave them.
    pub orders: HashMap<String, Order>,
    pub last_error: Option<OrderFlowError>,
}

#[derive(Debug)]
pub struct FoodOrderSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub loyalty: LoyaltyApi<SqliteDatabase>,
    pub coupons: CouponApi<SqliteDatabase>,
}

impl FoodOrderWorld {
    pub fn system(&self) -> &FoodOrderSystem {
        self.system.as_ref().expect("Food order system not initialised")
    }

    pub fn order(&self, name: &str) -> &Order {
        self.orders.get(name).unwrap_or_else(|| panic!("No order called {name} has been placed"))
    }
}

impl FoodOrderSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let loyalty = LoyaltyApi::new(db.clone());
        let coupons = CouponApi::new(db.clone());
        Self { db_path: url, db, orders, loyalty, coupons }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_accounts;
mod m20250101_000002_addresses;
mod m20250101_000003_categories;
mod m20250101_000004_orders;
mod m20250101_000005_products_in_order;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_accounts::Migration),
            Box::new(m20250101_000002_addresses::Migration),
            Box::new(m20250101_000003_categories::Migration),
            Box::new(m20250101_000004_orders::Migration),
            Box::new(m20250101_000005_products_in_order::Migration),
        ]
    }
}

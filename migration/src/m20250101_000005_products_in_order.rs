use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000004_orders::Orders;

static FK_PRODUCTS_IN_ORDER_ORDER_ID: &str = "fk_products_in_order_order_id";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductsInOrder::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductsInOrder::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(ProductsInOrder::OrderId))
                    .col(big_integer(ProductsInOrder::InventoryId))
                    .col(big_integer(ProductsInOrder::Quantity))
                    .col(string(ProductsInOrder::CurrencyCode))
                    .col(big_integer(ProductsInOrder::TotalAmount))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_PRODUCTS_IN_ORDER_ORDER_ID)
                            .from(ProductsInOrder::Table, ProductsInOrder::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductsInOrder::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProductsInOrder {
    Table,
    Id,
    OrderId,
    InventoryId,
    Quantity,
    CurrencyCode,
    TotalAmount,
}

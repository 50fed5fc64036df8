use sea_orm_migration::{prelude::*, schema::*};

static IDX_ADDRESSES_USER_ID: &str = "idx_addresses_user_id";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Addresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Addresses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Addresses::UserId))
                    .col(string(Addresses::Street))
                    .col(string(Addresses::Ward))
                    .col(string(Addresses::District))
                    .col(string(Addresses::City))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_ADDRESSES_USER_ID)
                    .table(Addresses::Table)
                    .col(Addresses::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_ADDRESSES_USER_ID)
                    .table(Addresses::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Addresses::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Addresses {
    Table,
    Id,
    UserId,
    Street,
    Ward,
    District,
    City,
}

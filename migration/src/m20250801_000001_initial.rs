use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum TenantRecords {
    Table,
    TenantId,
    Subscription,
    Usage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BillingTransactions {
    Table,
    Id,
    TenantId,
    SessionId,
    Tier,
    BillingCycle,
    Currency,
    Amount,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    TenantId,
    Content,
    Status,
    ScheduledAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("billing_transaction_status"))
                    .values(vec![Alias::new("pending"), Alias::new("completed")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("post_status"))
                    .values(vec![
                        Alias::new("draft"),
                        Alias::new("scheduled"),
                        Alias::new("published"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TenantRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantRecords::TenantId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TenantRecords::Subscription)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantRecords::Usage)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TenantRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BillingTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillingTransactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::TenantId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::SessionId)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::Tier)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::BillingCycle)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::Currency)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::Status)
                            .custom(Alias::new("billing_transaction_status"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BillingTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Posts::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Posts::TenantId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Posts::Content).text().not_null())
                    .col(
                        ColumnDef::new(Posts::Status)
                            .custom(Alias::new("post_status"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Posts::ScheduledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_billing_txn_tenant")
                    .table(BillingTransactions::Table)
                    .col(BillingTransactions::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_posts_tenant")
                    .table(Posts::Table)
                    .col(Posts::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_posts_tenant_status")
                    .table(Posts::Table)
                    .col(Posts::TenantId)
                    .col(Posts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(BillingTransactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(TenantRecords::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("post_status")).to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .name(Alias::new("billing_transaction_status"))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

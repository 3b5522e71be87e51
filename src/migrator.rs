use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_clients_table::Migration),
            Box::new(m20240101_000003_create_services_table::Migration),
            Box::new(m20240101_000004_create_invoice_tables::Migration),
            Box::new(m20240101_000005_create_transaction_tables::Migration),
            Box::new(m20240101_000006_create_time_tracking_tables::Migration),
            Box::new(m20240101_000007_create_projects_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string_len(255).not_null())
                        .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                        .col(ColumnDef::new(Users::Permissions).json().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::LastLogin).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        Permissions,
        IsActive,
        LastLogin,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_clients_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_clients_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Clients::Email).string_len(255).not_null())
                        .col(ColumnDef::new(Clients::Phone).string_len(20).null())
                        .col(ColumnDef::new(Clients::Company).string_len(100).null())
                        .col(ColumnDef::new(Clients::Address).text().null())
                        .col(ColumnDef::new(Clients::Notes).text().null())
                        .col(
                            ColumnDef::new(Clients::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Clients::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_clients_email")
                        .table(Clients::Table)
                        .col(Clients::Email)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Clients {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Company,
        Address,
        Notes,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_services_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_services_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Services::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Services::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Services::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Services::Description).text().null())
                        .col(ColumnDef::new(Services::Price).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Services::Category).string_len(50).not_null())
                        .col(ColumnDef::new(Services::DurationHours).integer().null())
                        .col(
                            ColumnDef::new(Services::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Services::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Services::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Services::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Services {
        Table,
        Id,
        Name,
        Description,
        Price,
        Category,
        DurationHours,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_invoice_tables {
    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_clients_table::Clients;
    use super::m20240101_000003_create_services_table::Services;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_invoice_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Invoices::InvoiceNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Invoices::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Invoices::Amount).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Invoices::TaxAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Invoices::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Invoices::IssueDate).date().not_null())
                        .col(ColumnDef::new(Invoices::DueDate).date().not_null())
                        .col(ColumnDef::new(Invoices::PaidDate).date().null())
                        .col(ColumnDef::new(Invoices::Notes).text().null())
                        .col(ColumnDef::new(Invoices::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_client")
                                .from(Invoices::Table, Invoices::ClientId)
                                .to(Clients::Table, Clients::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_created_by")
                                .from(Invoices::Table, Invoices::CreatedBy)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InvoiceItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InvoiceItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InvoiceItems::InvoiceId).uuid().not_null())
                        .col(ColumnDef::new(InvoiceItems::ServiceId).uuid().null())
                        .col(
                            ColumnDef::new(InvoiceItems::Description)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::LineTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InvoiceItems::Position).integer().not_null())
                        .col(
                            ColumnDef::new(InvoiceItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoice_items_invoice")
                                .from(InvoiceItems::Table, InvoiceItems::InvoiceId)
                                .to(Invoices::Table, Invoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoice_items_service")
                                .from(InvoiceItems::Table, InvoiceItems::ServiceId)
                                .to(Services::Table, Services::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_invoices_client_id", Invoices::ClientId),
                ("idx_invoices_status", Invoices::Status),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Invoices::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoice_items_invoice_id")
                        .table(InvoiceItems::Table)
                        .col(InvoiceItems::InvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Invoices {
        Table,
        Id,
        InvoiceNumber,
        ClientId,
        Amount,
        TaxAmount,
        TotalAmount,
        Status,
        IssueDate,
        DueDate,
        PaidDate,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum InvoiceItems {
        Table,
        Id,
        InvoiceId,
        ServiceId,
        Description,
        Quantity,
        UnitPrice,
        LineTotal,
        Position,
        CreatedAt,
    }
}

mod m20240101_000005_create_transaction_tables {
    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_clients_table::Clients;
    use super::m20240101_000003_create_services_table::Services;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_transaction_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::TransactionNumber)
                                .string_len(80)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Transactions::ClientId).uuid().null())
                        .col(
                            ColumnDef::new(Transactions::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::TaxAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Transactions::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::PaymentMethod)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::PaymentStatus)
                                .string_len(16)
                                .not_null()
                                .default("completed"),
                        )
                        .col(ColumnDef::new(Transactions::Notes).text().null())
                        .col(ColumnDef::new(Transactions::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Transactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transactions_client")
                                .from(Transactions::Table, Transactions::ClientId)
                                .to(Clients::Table, Clients::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transactions_created_by")
                                .from(Transactions::Table, Transactions::CreatedBy)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionItems::ServiceId).uuid().null())
                        .col(
                            ColumnDef::new(TransactionItems::Description)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::LineTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::Position)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_items_transaction")
                                .from(TransactionItems::Table, TransactionItems::TransactionId)
                                .to(Transactions::Table, Transactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_items_service")
                                .from(TransactionItems::Table, TransactionItems::ServiceId)
                                .to(Services::Table, Services::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_transactions_client_id", Transactions::ClientId),
                ("idx_transactions_payment_status", Transactions::PaymentStatus),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Transactions::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_items_transaction_id")
                        .table(TransactionItems::Table)
                        .col(TransactionItems::TransactionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransactionItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Transactions {
        Table,
        Id,
        TransactionNumber,
        ClientId,
        Amount,
        TaxAmount,
        TotalAmount,
        PaymentMethod,
        PaymentStatus,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum TransactionItems {
        Table,
        Id,
        TransactionId,
        ServiceId,
        Description,
        Quantity,
        UnitPrice,
        LineTotal,
        Position,
        CreatedAt,
    }
}

mod m20240101_000006_create_time_tracking_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_time_tracking_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Employees::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Employees::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Employees::Email)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Employees::Phone).string_len(20).null())
                        .col(ColumnDef::new(Employees::Position).string_len(16).not_null())
                        .col(ColumnDef::new(Employees::Department).string_len(50).null())
                        .col(ColumnDef::new(Employees::Salary).decimal_len(10, 2).null())
                        .col(ColumnDef::new(Employees::HireDate).date().null())
                        .col(
                            ColumnDef::new(Employees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Employees::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TimeEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TimeEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TimeEntries::EmployeeId).uuid().not_null())
                        .col(
                            ColumnDef::new(TimeEntries::ClockIn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::ClockOut)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::Status)
                                .string_len(16)
                                .not_null()
                                .default("clocked_in"),
                        )
                        .col(ColumnDef::new(TimeEntries::TotalHours).decimal_len(6, 2).null())
                        .col(ColumnDef::new(TimeEntries::DeviceId).string_len(100).null())
                        .col(ColumnDef::new(TimeEntries::Location).string_len(255).null())
                        .col(ColumnDef::new(TimeEntries::Notes).text().null())
                        .col(
                            ColumnDef::new(TimeEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_time_entries_employee")
                                .from(TimeEntries::Table, TimeEntries::EmployeeId)
                                .to(Employees::Table, Employees::Id),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_time_entries_employee_id", TimeEntries::EmployeeId),
                ("idx_time_entries_clock_in", TimeEntries::ClockIn),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(TimeEntries::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TimeEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Employees {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Position,
        Department,
        Salary,
        HireDate,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum TimeEntries {
        Table,
        Id,
        EmployeeId,
        ClockIn,
        ClockOut,
        Status,
        TotalHours,
        DeviceId,
        Location,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_projects_table {
    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_clients_table::Clients;
    use super::m20240101_000003_create_services_table::Services;
    use super::m20240101_000006_create_time_tracking_tables::Employees;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_projects_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Projects::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Projects::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Projects::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Projects::ServiceId).uuid().not_null())
                        .col(ColumnDef::new(Projects::AssignedTo).uuid().null())
                        .col(
                            ColumnDef::new(Projects::Status)
                                .string_len(20)
                                .not_null()
                                .default("brief_received"),
                        )
                        .col(
                            ColumnDef::new(Projects::Priority)
                                .string_len(8)
                                .not_null()
                                .default("medium"),
                        )
                        .col(
                            ColumnDef::new(Projects::Progress)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Projects::StartDate).date().null())
                        .col(ColumnDef::new(Projects::DueDate).date().null())
                        .col(
                            ColumnDef::new(Projects::Value)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Projects::Notes).text().null())
                        .col(ColumnDef::new(Projects::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Projects::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_projects_client")
                                .from(Projects::Table, Projects::ClientId)
                                .to(Clients::Table, Clients::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_projects_service")
                                .from(Projects::Table, Projects::ServiceId)
                                .to(Services::Table, Services::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_projects_assigned_to")
                                .from(Projects::Table, Projects::AssignedTo)
                                .to(Employees::Table, Employees::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_projects_created_by")
                                .from(Projects::Table, Projects::CreatedBy)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_projects_client_id", Projects::ClientId),
                ("idx_projects_status", Projects::Status),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Projects::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Projects {
        Table,
        Id,
        Name,
        ClientId,
        ServiceId,
        AssignedTo,
        Status,
        Priority,
        Progress,
        StartDate,
        DueDate,
        Value,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

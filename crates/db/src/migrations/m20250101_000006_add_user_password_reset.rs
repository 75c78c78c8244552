//! Add email and password reset columns to the user table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite accepts a single column per ALTER TABLE.
        for column in [
            ColumnDef::new(User::Email).string_len(254).to_owned(),
            ColumnDef::new(User::PasswordResetToken)
                .string_len(64)
                .to_owned(),
            ColumnDef::new(User::PasswordResetSentAt)
                .timestamp_with_time_zone()
                .to_owned(),
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(User::Table)
                        .add_column(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for column in [User::PasswordResetSentAt, User::PasswordResetToken, User::Email] {
            manager
                .alter_table(
                    Table::alter()
                        .table(User::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}

#[derive(Iden)]
enum User {
    Table,
    Email,
    PasswordResetToken,
    PasswordResetSentAt,
}

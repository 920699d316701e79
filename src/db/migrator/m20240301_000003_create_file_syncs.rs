use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileSyncs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FileSyncs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FileSyncs::Filepath).string_len(500).not_null())
                    .col(ColumnDef::new(FileSyncs::Etag).char_len(32).not_null())
                    .col(ColumnDef::new(FileSyncs::CreatedAt).text().not_null())
                    .col(ColumnDef::new(FileSyncs::UpdatedAt).text().not_null())
                    .col(ColumnDef::new(FileSyncs::UserId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_syncs_user_id")
                            .from(FileSyncs::Table, FileSyncs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_syncs_filepath")
                    .table(FileSyncs::Table)
                    .col(FileSyncs::Filepath)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileSyncs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum FileSyncs {
    Table,
    Id,
    Filepath,
    Etag,
    CreatedAt,
    UpdatedAt,
    UserId,
}

use sea_orm_migration::prelude::*;

use super::m20240301_000003_create_file_syncs::FileSyncs;

/// Paths are unique per user, not across the whole server.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_file_syncs_filepath")
                    .table(FileSyncs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_syncs_user_filepath")
                    .table(FileSyncs::Table)
                    .col(FileSyncs::UserId)
                    .col(FileSyncs::Filepath)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_file_syncs_user_filepath")
                    .table(FileSyncs::Table)
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
}

use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_sessions;
mod m20240301_000003_create_file_syncs;
mod m20240315_000001_file_syncs_per_user_unique;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_sessions::Migration),
            Box::new(m20240301_000003_create_file_syncs::Migration),
            Box::new(m20240315_000001_file_syncs_per_user_unique::Migration),
        ]
    }
}

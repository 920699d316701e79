
pub mod file_syncs;
pub mod sessions;
pub mod users;

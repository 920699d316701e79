pub mod session;
pub mod sync_file;
pub mod user;

pub mod session;
pub mod sync_file;
pub mod user;

pub use session::Session;
pub use sync_file::SyncFile;
pub use user::User;

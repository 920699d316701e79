pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod session_service;
pub mod session_service_impl;
pub use session_service::{SessionError, SessionService};
pub use session_service_impl::SeaOrmSessionService;

pub mod sync_service;
pub mod sync_service_impl;
pub use sync_service::{SyncError, SyncService};
pub use sync_service_impl::SeaOrmSyncService;

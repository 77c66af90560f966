/// Router Module Index
///
/// Splits routing by access level so that protection is applied per router
/// (via Axum layers) rather than remembered per handler.

/// Routes open to anonymous clients: health check and login.
pub mod public;

/// Routes behind the `AuthUser` middleware. Any active user may call them.
pub mod authenticated;

/// Routes behind the `AuthUser` middleware whose handlers also require the
/// 'admin' role.
pub mod admin;

/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Registration, login, email verification, 2FA
/// - `properties`: Listing search and CRUD
/// - `agents`: Agency CRUD

pub mod agents;
pub mod health;
pub mod properties;
pub mod users;

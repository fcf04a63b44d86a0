/// Middleware modules for the API server
///
/// - `security`: Response security headers
/// - `rate_limit`: Per-IP throttling of the 2FA code endpoint

pub mod rate_limit;
pub mod security;

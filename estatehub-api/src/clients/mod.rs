/// Outbound HTTP integrations
///
/// - `geocoder`: address to polygon (Nominatim)
/// - `facebook`: social token verification (Graph API)

pub mod facebook;
pub mod geocoder;

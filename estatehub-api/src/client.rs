/// Client details recorded with each login
///
/// The IP is the socket peer address unless the API is configured to sit
/// behind reverse proxies. With [`TrustedProxies`] set to `n`, the client is
/// the `n`-th `X-Forwarded-For` entry counted from the right, since only the
/// entries appended by those proxies can be trusted. `X-Real-IP` is used when
/// a trusted proxy sends no `X-Forwarded-For`. Values that do not parse as an
/// IP address are ignored.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{header, request::Parts, Extensions, HeaderMap},
};
use estatehub_shared::user_agent::UserAgentInfo;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Number of reverse proxies in front of the API, carried as a request extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedProxies(pub usize);

/// Request metadata for the login audit
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: UserAgentInfo,
}

fn parse_ip(value: &str) -> Option<String> {
    value.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn forwarded_ip(headers: &HeaderMap, hops: usize) -> Option<String> {
    let entries: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .collect();

    if entries.is_empty() {
        return headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip);
    }

    let index = entries.len().saturating_sub(hops);
    parse_ip(entries[index])
}

fn ip_from_parts(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let TrustedProxies(hops) = extensions.get::<TrustedProxies>().copied().unwrap_or_default();

    let forwarded = if hops > 0 {
        forwarded_ip(headers, hops)
    } else {
        None
    };

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

/// Client IP for a request, if one can be determined
pub fn client_ip(request: &Request) -> Option<String> {
    ip_from_parts(request.headers(), request.extensions())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(UserAgentInfo::parse)
            .unwrap_or_default();

        Ok(ClientInfo {
            ip_address: ip_from_parts(&parts.headers, &parts.extensions),
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)], hops: usize) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut().insert(TrustedProxies(hops));
        req
    }

    fn with_peer(mut req: Request) -> Request {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 44], 4000))));
        req
    }

    #[test]
    fn test_forwarded_headers_ignored_without_trusted_proxy() {
        let headers = [("x-forwarded-for", "203.0.113.7"), ("x-real-ip", "198.51.100.2")];

        assert_eq!(client_ip(&request(&headers, 0)), None);
        assert_eq!(client_ip(&with_peer(request(&headers, 0))).as_deref(), Some("192.0.2.44"));
    }

    #[test]
    fn test_forwarded_for_counts_trusted_hops_from_the_right() {
        // Client-supplied entries come first, proxies append to the end
        let headers = [("x-forwarded-for", "10.9.9.9, 203.0.113.7, 10.0.0.1")];

        assert_eq!(client_ip(&request(&headers, 1)).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&request(&headers, 2)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&request(&headers, 5)).as_deref(), Some("10.9.9.9"));
    }

    #[test]
    fn test_falls_back_to_real_ip_then_socket() {
        let req = request(&[("x-real-ip", "198.51.100.2")], 1);
        assert_eq!(client_ip(&req).as_deref(), Some("198.51.100.2"));

        let req = with_peer(request(&[("x-forwarded-for", "garbage")], 1));
        assert_eq!(client_ip(&req).as_deref(), Some("192.0.2.44"));

        assert_eq!(client_ip(&request(&[], 1)), None);
    }

    #[tokio::test]
    async fn test_extracts_user_agent() {
        let req = request(&[
            (
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
            ("x-forwarded-for", "2001:db8::1"),
        ], 1);
        let (mut parts, _) = req.into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(info.ip_address.as_deref(), Some("2001:db8::1"));
        assert_eq!(info.user_agent.operating_system, "Windows");
        assert_eq!(info.user_agent.browser, "Chrome");
    }

    #[tokio::test]
    async fn test_missing_user_agent_is_other() {
        let (mut parts, _) = request(&[], 0).into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.user_agent, UserAgentInfo::default());
    }
}

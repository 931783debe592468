// Cross-origin access for browser editors talking to the Folio API.
//
// `FOLIO_CORS_ORIGINS` selects the policy: unset admits any loopback origin
// on any port, `*` admits everyone, anything else is an exact origin list.
// The API carries no credentials, so none are ever allowed.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;
use url::Url;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginPolicy {
    Loopback,
    Any,
    Listed(Vec<HeaderValue>),
}

impl OriginPolicy {
    fn from_config(origins: Option<&str>) -> Self {
        match origins.map(str::trim) {
            None | Some("") => Self::Loopback,
            Some("*") => Self::Any,
            Some(list) => Self::Listed(
                list.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .filter_map(|origin| match HeaderValue::from_str(origin) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!(origin, "ignoring unusable CORS origin");
                            None
                        }
                    })
                    .collect(),
            ),
        }
    }

    fn into_allow_origin(self) -> AllowOrigin {
        match self {
            Self::Loopback => AllowOrigin::predicate(|origin, _| is_loopback_origin(origin)),
            Self::Any => AllowOrigin::any(),
            Self::Listed(origins) => AllowOrigin::list(origins),
        }
    }
}

/// Layer for the whole router: the methods the document, tree and asset
/// routes use, JSON bodies, and request-id correlation in both directions.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(OriginPolicy::from_config(origins).into_allow_origin())
        .allow_methods([Method::GET, Method::PUT, Method::PATCH, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, request_id()])
        .expose_headers([request_id()])
        .max_age(PREFLIGHT_MAX_AGE)
}

fn request_id() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

fn is_loopback_origin(origin: &HeaderValue) -> bool {
    let Some(url) = origin.to_str().ok().and_then(|s| Url::parse(s).ok()) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https")
        && match url.host() {
            Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        }
}

//! Identity extraction from Lizmap headers, with request parameters as fallback.

use axum::http::HeaderMap;
use lizmap_core::context::{headers, params, parse_flag, parse_groups, parse_login};
use lizmap_core::{OwsParams, RequestContext};

/// Value of `header`, or of `param` when the header is absent.
///
/// A header that is present wins even when empty. Non-UTF-8 header values
/// are treated as absent.
fn header_or_param<'a>(
    map: &'a HeaderMap,
    header: &str,
    ows: &'a OwsParams,
    param: &str,
) -> Option<&'a str> {
    match map.get(header) {
        Some(value) => value.to_str().ok(),
        None => ows.get(param),
    }
}

/// Lizmap groups of the user, comma separated on the wire.
#[must_use]
pub fn get_lizmap_groups(map: &HeaderMap, ows: &OwsParams) -> Vec<String> {
    header_or_param(map, headers::USER_GROUPS, ows, params::USER_GROUPS)
        .map(parse_groups)
        .unwrap_or_default()
}

#[must_use]
pub fn get_lizmap_user_login(map: &HeaderMap, ows: &OwsParams) -> Option<String> {
    header_or_param(map, headers::USER, ows, params::USER).and_then(parse_login)
}

/// Whether the request comes from an editing session.
#[must_use]
pub fn is_editing_context(map: &HeaderMap, ows: &OwsParams) -> bool {
    header_or_param(map, headers::EDITION_CONTEXT, ows, params::EDITION_CONTEXT)
        .is_some_and(parse_flag)
}

#[must_use]
pub fn request_context(map: &HeaderMap, ows: &OwsParams) -> RequestContext {
    RequestContext {
        groups: get_lizmap_groups(map, ows),
        user_login: get_lizmap_user_login(map, ows),
        editing: is_editing_context(map, ows),
    }
}

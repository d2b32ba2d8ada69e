//! `/ows` endpoint: the `SERVICE=LIZMAP` family of OWS requests.

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use lizmap_core::OwsParams;

use super::AppState;
use crate::service::identity::request_context;
use crate::service::{LizmapRequest, ServiceError};

pub const SERVICE_PARAM: &str = "SERVICE";
pub const MAP_PARAM: &str = "MAP";
pub const LIZMAP_SERVICE: &str = "LIZMAP";

/// Handles `GET` and `POST` `/ows`.
///
/// Parameters come from the query string, then from an
/// `application/x-www-form-urlencoded` body. The `MAP` project is loaded
/// before the request reaches the service.
pub async fn ows_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();

    let Some(mut params) = parse_params(query.as_deref().unwrap_or_default()) else {
        return ServiceError::bad_request("Invalid query string").into_response();
    };

    let body = (method == Method::POST && !body.is_empty()).then_some(body);
    if let Some(body) = &body {
        if is_form(&headers) {
            add_form_params(&mut params, body);
        }
    }

    match params.get(SERVICE_PARAM) {
        Some(service) if service.eq_ignore_ascii_case(LIZMAP_SERVICE) => {}
        other => {
            return ServiceError::bad_request(format!(
                "Invalid SERVICE parameter: must be LIZMAP, found '{}'",
                other.unwrap_or_default()
            ))
            .into_response();
        }
    }

    let project = match params.get_non_empty(MAP_PARAM) {
        Some(map) => match state.projects.load(map).await {
            Ok(project) => Some(project),
            Err(e) => return ServiceError::from(e).into_response(),
        },
        None => None,
    };

    let request = request_context(&headers, &params);
    state
        .service
        .execute(LizmapRequest {
            params,
            body,
            request,
            project,
        })
        .await
}

/// Parses an urlencoded string into case-insensitive parameters.
fn parse_params(raw: &str) -> Option<OwsParams> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
        .ok()
        .map(|pairs| pairs.into_iter().collect())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Adds form body parameters; query string values keep precedence.
/// Bodies that are not UTF-8 are left for the service to reject.
fn add_form_params(params: &mut OwsParams, body: &Bytes) {
    let Ok(text) = std::str::from_utf8(body) else {
        return;
    };
    if let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(text) {
        for (key, value) in pairs {
            params.insert(&key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn query_strings_are_decoded() {
        let params = parse_params("service=LIZMAP&Request=GetSubsetString&LAYER=my%20layer").unwrap();
        assert_eq!(params.get("SERVICE"), Some("LIZMAP"));
        assert_eq!(params.get("REQUEST"), Some("GetSubsetString"));
        assert_eq!(params.get("layer"), Some("my layer"));
        assert!(parse_params("").unwrap().is_empty());
    }

    #[test]
    fn form_bodies_add_parameters() {
        let mut params = parse_params("SERVICE=LIZMAP&LAYER=a").unwrap();
        add_form_params(&mut params, &Bytes::from_static(b"LAYER=b&REQUEST=GetSubsetString"));
        assert_eq!(params.get("LAYER"), Some("a"));
        assert_eq!(params.get("REQUEST"), Some("GetSubsetString"));

        add_form_params(&mut params, &Bytes::from_static(&[0xff, 0x3d, 0x31]));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn form_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        assert!(is_form(&headers));
    }
}

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

pub mod jwt;

/// Redirect the browser to `to`. HTMX requests get an `HX-Redirect` header
/// so the swap turns into a full navigation; plain requests get a 303.
pub fn redirect_to(request_headers: &HeaderMap, to: &str) -> Response {
    if request_headers.contains_key("HX-Request") {
        if let Ok(value) = HeaderValue::from_str(to) {
            let mut headers = HeaderMap::new();
            headers.insert("HX-Redirect", value);
            return (StatusCode::OK, headers, "").into_response();
        }
    }
    Redirect::to(to).into_response()
}

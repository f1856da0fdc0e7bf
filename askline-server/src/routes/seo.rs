//! `GET /robots.txt` and `GET /sitemap.xml`.
//!
//! Origin resolution order: `PUBLIC_BASE_URL` config, else
//! `X-Forwarded-Proto`/`X-Forwarded-Host`, else the request's own `Host`
//! header over plain http.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

fn origin(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.public_base_url {
        return base.trim_end_matches('/').to_string();
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{proto}://{host}")
}

pub async fn robots(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let origin = origin(&state, &headers);
    let body = format!("User-agent: *\nAllow: /\nDisallow: /api/\nSitemap: {origin}/sitemap.xml\n");
    plain_text_response(body)
}

pub async fn sitemap(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let origin = origin(&state, &headers);
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
         \t<url><loc>{origin}/</loc><changefreq>daily</changefreq><priority>1.0</priority></url>\n\
         </urlset>\n"
    );
    xml_response(body)
}

fn plain_text_response(body: String) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn xml_response(body: String) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/xml; charset=utf-8"));
    response
}

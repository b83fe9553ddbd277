//! Range and link headers for paged list responses.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;
use url::Url;

use super::window::PaginationWindow;

/// Pagination annotations of one list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeaders {
    pub accept_range: String,
    pub content_range: String,
    pub page_element_count: u64,
    pub total_element: u64,
    pub total_page: u64,
    pub links: Vec<String>,
}

impl PageHeaders {
    /// Compute headers for `returned` items out of `total`.
    ///
    /// Links are copies of `base_url` with the `page` parameter rewritten;
    /// every other query parameter is kept in place.
    pub fn compute(
        resource: &str,
        max_allowed: u64,
        total: u64,
        returned: u64,
        window: &PaginationWindow,
        base_url: &Url,
    ) -> Self {
        let size = window.size().max(1);
        let min_index = i128::from(window.offset());
        let max_index = min_index + i128::from(returned) - 1;
        let total_pages = total.div_ceil(size);

        let mut links = Vec::with_capacity(4);
        if window.page() + 1 < total_pages {
            links.push(link(base_url, window.page() + 1, "next"));
        }
        if window.page() > 0 {
            links.push(link(base_url, window.page() - 1, "prev"));
        }
        links.push(link(base_url, total_pages.max(1) - 1, "last"));
        links.push(link(base_url, 0, "first"));

        Self {
            accept_range: format!("{resource} {max_allowed}"),
            content_range: format!("{min_index}-{max_index}/{total}"),
            page_element_count: returned,
            total_element: total,
            total_page: total_pages,
            links,
        }
    }

    /// The joined `Link` header value.
    pub fn link_header(&self) -> String {
        self.links.join(", ")
    }

    /// Render as response headers.
    pub fn to_header_map(&self) -> HeaderMap {
        let entries = [
            ("accept-range", self.accept_range.clone()),
            ("content-range", self.content_range.clone()),
            ("x-page-element-count", self.page_element_count.to_string()),
            ("x-total-element", self.total_element.to_string()),
            ("x-total-page", self.total_page.to_string()),
            ("link", self.link_header()),
        ];

        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(name), value);
                }
                Err(_) => warn!(header = name, value = %value, "skipping unrepresentable header"),
            }
        }
        headers
    }
}

fn link(base_url: &Url, page: u64, rel: &str) -> String {
    let page = page.to_string();
    let mut seen = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in base_url.query_pairs() {
        if key == "page" {
            if !seen {
                pairs.push((key.into_owned(), page.clone()));
                seen = true;
            }
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    if !seen {
        pairs.push(("page".to_string(), page));
    }

    let mut url = base_url.clone();
    url.query_pairs_mut().clear().extend_pairs(&pairs);
    format!("<{url}>; rel=\"{rel}\"")
}

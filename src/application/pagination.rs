//! Offset/limit pagination: parameter resolution, page windows and navigation links.
//!
//! Windowing happens in two stages. The store is asked for `LIMIT limit OFFSET offset`
//! rows, then the returned set is re-sliced by `[start, end)`. `start` and `end` never
//! depend on `offset`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use thiserror::Error;
use url::form_urlencoded;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;

pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "perPage";
pub const OFFSET_PARAM: &str = "offset";
pub const LIMIT_PARAM: &str = "limit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("invalid pagination parameter `{name}`: `{value}`")]
    InvalidParameter { name: &'static str, value: String },
    #[error("page {page} does not exist")]
    PageOutOfRange { page: u32 },
}

/// Resolved pagination window for a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    per_page: u32,
    offset: u32,
    limit: u32,
    start: u64,
    end: u64,
}

impl Pagination {
    /// Resolve a window from already-parsed parameters.
    ///
    /// `limit == 0` means unlimited. When a limit is set, `end` is capped by it and
    /// `per_page` is clamped down to it.
    pub fn resolve(page: u32, per_page: u32, offset: u32, limit: u32) -> Self {
        let per_page_wide = u64::from(per_page);
        let start = per_page_wide * u64::from(page.saturating_sub(1));
        let mut end = per_page_wide * u64::from(page);
        if limit > 0 && end > u64::from(limit) {
            end = u64::from(limit);
        }
        let per_page = if limit > 0 && per_page > limit {
            limit
        } else {
            per_page
        };

        Self {
            page,
            per_page,
            offset,
            limit,
            start,
            end,
        }
    }

    /// Parse `page`, `perPage`, `offset` and `limit` from a raw query string.
    ///
    /// Absent or empty values take their defaults; anything else must be a
    /// non-negative integer. `page` and `perPage` must also be non-zero.
    pub fn from_query(query: Option<&str>) -> Result<Self, PaginationError> {
        let mut page = None;
        let mut per_page = None;
        let mut offset = None;
        let mut limit = None;

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                PAGE_PARAM => &mut page,
                PER_PAGE_PARAM => &mut per_page,
                OFFSET_PARAM => &mut offset,
                LIMIT_PARAM => &mut limit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let page = parse_param(PAGE_PARAM, page.as_deref(), DEFAULT_PAGE)?;
        let per_page = parse_param(PER_PAGE_PARAM, per_page.as_deref(), DEFAULT_PER_PAGE)?;
        let offset = parse_param(OFFSET_PARAM, offset.as_deref(), 0)?;
        let limit = parse_param(LIMIT_PARAM, limit.as_deref(), 0)?;

        if page == 0 {
            return Err(PaginationError::InvalidParameter {
                name: PAGE_PARAM,
                value: "0".to_string(),
            });
        }
        if per_page == 0 {
            return Err(PaginationError::InvalidParameter {
                name: PER_PAGE_PARAM,
                value: "0".to_string(),
            });
        }

        Ok(Self::resolve(page, per_page, offset, limit))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Slice bounds into a result set of `total` rows.
    ///
    /// Fails when `start` lies past the last row, which includes every page of an
    /// empty result set.
    pub fn window(&self, total: usize) -> Result<Range<usize>, PaginationError> {
        let total = total as u64;
        if total == 0 || self.start > total - 1 {
            return Err(PaginationError::PageOutOfRange { page: self.page });
        }
        let end = self.end.min(total);
        Ok(self.start as usize..end as usize)
    }

    /// Number of the last page given `total` rows.
    pub fn last_page(&self, total: usize) -> u64 {
        let total = total as u64;
        let bound = if self.limit > 0 {
            total.min(u64::from(self.limit))
        } else {
            total
        };
        bound.div_ceil(u64::from(self.per_page.max(1)))
    }

    /// Values echoed back as response headers, in emission order.
    pub fn header_values(&self) -> [(&'static str, String); 4] {
        [
            (LIMIT_PARAM, self.limit.to_string()),
            (PAGE_PARAM, self.page.to_string()),
            (PER_PAGE_PARAM, self.per_page.to_string()),
            (OFFSET_PARAM, self.offset.to_string()),
        ]
    }

    /// Navigation links for the current page.
    ///
    /// `self` and `first` are always present, `next` only when it does not pass the
    /// last page, `prev` only when it is not page zero, then `last`.
    pub fn links(&self, target: &LinkTarget, total: usize) -> Vec<NavLink> {
        let current = u64::from(self.page);
        let next = current + 1;
        let prev = current.saturating_sub(1);
        let last = self.last_page(total);

        let mut links = Vec::with_capacity(5);
        links.push(target.link("self", current));
        links.push(target.link("first", 1));
        if next <= last {
            links.push(target.link("next", next));
        }
        if prev != 0 {
            links.push(target.link("prev", prev));
        }
        links.push(target.link("last", last));
        links
    }
}

fn parse_param(name: &'static str, raw: Option<&str>, default: u32) -> Result<u32, PaginationError> {
    match raw {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| PaginationError::InvalidParameter {
                name,
                value: value.to_string(),
            }),
    }
}

/// The request URI that navigation links are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    scheme: String,
    host: String,
    path: String,
    query: BTreeMap<String, Vec<String>>,
}

impl LinkTarget {
    pub fn new(scheme: &str, host: &str, path: &str, query: Option<&str>) -> Self {
        let mut pairs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            pairs
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query: pairs,
        }
    }

    /// URI for `page`, all other query parameters preserved and sorted by key.
    pub fn uri_for_page(&self, page: u64) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let page_value = page.to_string();
        let mut page_written = false;

        for (key, values) in &self.query {
            if key == PAGE_PARAM {
                serializer.append_pair(key, &page_value);
                page_written = true;
                continue;
            }
            if !page_written && key.as_str() > PAGE_PARAM {
                serializer.append_pair(PAGE_PARAM, &page_value);
                page_written = true;
            }
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        if !page_written {
            serializer.append_pair(PAGE_PARAM, &page_value);
        }

        format!(
            "{}://{}{}?{}",
            self.scheme,
            self.host,
            self.path,
            serializer.finish()
        )
    }

    fn link(&self, rel: &'static str, page: u64) -> NavLink {
        NavLink {
            rel,
            page,
            uri: self.uri_for_page(page),
        }
    }
}

/// One RFC 5988 style navigation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub rel: &'static str,
    pub page: u64,
    pub uri: String,
}

impl fmt::Display for NavLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>; rel=\"{}\"", self.uri, self.rel)
    }
}

/// Join links into a single `Link` header value.
pub fn link_header(links: &[NavLink]) -> String {
    links
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

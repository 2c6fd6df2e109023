//! Paged DQL execution.
//!
//! The repository hands out one page per request. [`PagedFetcher::fetch`]
//! walks pages strictly in order until one of:
//! - the page carries no `next` link,
//! - the accumulated rows reach the limit,
//! - `ceil(limit / page_size)` pages were requested (hard bound against a
//!   repository that keeps advertising `next`).
//!
//! A failed page request fails the whole query; rows already fetched are
//! dropped.

use crate::credentials::CredentialBroker;
use crate::envelope::{Page, Row};
use crate::error::{Error, Result};
use crate::flatten::{project, ResponseFlattener};
use crate::transport::{RestRequest, Transport, TransportError};
use casegate_dql::Query;
use serde::Serialize;
use std::sync::Arc;

/// Which credentials page requests carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScope {
    #[default]
    User,
    Service,
}

/// Aggregated result of a bounded query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows beyond `limit` were returned by the repository and discarded.
    pub truncated: bool,
    pub limit: u32,
}

impl RowSet {
    pub fn total_count(&self) -> usize {
        self.rows.len()
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSlice {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub page: u32,
    pub items_per_page: u32,
    pub has_next: bool,
}

#[derive(Clone)]
pub struct PagedFetcher {
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
    flattener: ResponseFlattener,
    scope: AuthScope,
}

impl PagedFetcher {
    pub fn new(transport: Arc<dyn Transport>, broker: Arc<CredentialBroker>) -> Self {
        Self {
            transport,
            broker,
            flattener: ResponseFlattener::new(),
            scope: AuthScope::User,
        }
    }

    pub fn with_scope(mut self, scope: AuthScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_flattener(mut self, flattener: ResponseFlattener) -> Self {
        self.flattener = flattener;
        self
    }

    fn authorization(&self) -> String {
        match self.scope {
            AuthScope::User => self.broker.user_auth_header(),
            AuthScope::Service => self.broker.service_auth_header(),
        }
    }

    /// Run `query`, returning at most `limit` rows.
    pub fn fetch(&self, query: &Query, page_size: u32, limit: u32) -> Result<RowSet> {
        let limit = limit.max(1);
        let page_size = page_size.clamp(1, limit);
        let max_pages = limit.div_ceil(page_size);
        let cap = limit as usize;

        let authorization = self.authorization();
        let mut columns = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut page_no = 1u32;

        loop {
            let page = self
                .request_page(query.text(), page_no, page_size, &authorization)
                .map_err(|source| Error::QueryExecution {
                    page: page_no,
                    source,
                })?;

            let has_next = page.has_next();
            let page_rows = self.flattener.flatten(&page, &mut columns);
            tracing::debug!(
                page = page_no,
                rows = page_rows.len(),
                has_next,
                "fetched query page"
            );
            rows.extend(page_rows);

            if !has_next || rows.len() >= cap || page_no >= max_pages {
                break;
            }
            page_no += 1;
        }

        // Rows flattened before any page carried a non-empty property bag.
        for row in rows.iter_mut().filter(|row| row.len() != columns.len()) {
            *row = project(row, &columns);
        }

        let truncated = rows.len() > cap;
        rows.truncate(cap);

        Ok(RowSet {
            columns,
            rows,
            truncated,
            limit,
        })
    }

    /// Run `statement` as-is and return a single page of it.
    pub fn fetch_page(&self, statement: &str, page: u32, items_per_page: u32) -> Result<PageSlice> {
        let page = page.max(1);
        let items_per_page = items_per_page.max(1);
        let authorization = self.authorization();

        let envelope = self
            .request_page(statement, page, items_per_page, &authorization)
            .map_err(|source| Error::QueryExecution { page, source })?;

        let (columns, rows) = self.flattener.flatten_page(&envelope);
        Ok(PageSlice {
            columns,
            rows,
            page,
            items_per_page,
            has_next: envelope.has_next(),
        })
    }

    fn request_page(
        &self,
        statement: &str,
        page: u32,
        items_per_page: u32,
        authorization: &str,
    ) -> std::result::Result<Page, TransportError> {
        let request = RestRequest::get("", authorization)
            .param("dql", statement)
            .param("items-per-page", items_per_page)
            .param("page", page)
            .param("inline", true);
        Page::from_value(self.transport.execute(&request)?)
    }
}

//! Ad-hoc DQL execution.

use super::ServiceContext;
use crate::error::{Error, Result};
use crate::fetch::{AuthScope, PagedFetcher, RowSet};
use casegate_dql::{Query, QueryRewriter, RequiredColumns};
use serde::Serialize;

/// The statement actually sent and what it returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub statement: String,
    #[serde(flatten)]
    pub result: RowSet,
}

pub struct QueryService {
    fetcher: PagedFetcher,
    rewriter: QueryRewriter,
    default_limit: u32,
    page_size: u32,
}

impl QueryService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            fetcher: context.fetcher(),
            rewriter: QueryRewriter::new(),
            default_limit: context.config().default_limit,
            page_size: context.config().page_size,
        }
    }

    pub fn with_scope(mut self, scope: AuthScope) -> Self {
        self.fetcher = self.fetcher.with_scope(scope);
        self
    }

    pub fn with_required_columns(mut self, required: RequiredColumns) -> Self {
        self.rewriter = self.rewriter.with_required_columns(required);
        self
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Rewrite without executing.
    pub fn prepare(&self, raw: &str) -> Result<Query> {
        if raw.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        Ok(self.rewriter.rewrite(raw, self.default_limit))
    }

    /// Rewrite `raw` and fetch up to its effective limit.
    pub fn execute(&self, raw: &str) -> Result<QueryOutcome> {
        let query = self.prepare(raw)?;
        tracing::info!(
            statement = %query,
            limit = query.effective_limit(),
            rewritten = query.requires_rewrite(),
            "executing DQL query"
        );

        let result = self
            .fetcher
            .fetch(&query, self.page_size, query.effective_limit())
            .inspect_err(|err| tracing::error!(error = %err, "DQL query failed"))?;

        Ok(QueryOutcome {
            statement: query.into_text(),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestConfig;
    use crate::testing::{dql_page, ScriptedTransport};
    use std::sync::Arc;

    fn context(transport: &Arc<ScriptedTransport>) -> ServiceContext {
        let mut config = RestConfig::new("http://repo/rest", "cms", "clerk", "pw");
        config.page_size = 100;
        ServiceContext::new(config, transport.clone())
    }

    #[test]
    fn test_blank_query_rejected_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let service = context(&transport).query();

        assert!(matches!(service.execute("   "), Err(Error::EmptyQuery)));
        assert!(matches!(service.execute(""), Err(Error::EmptyQuery)));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_execute_rewrites_and_bounds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(dql_page(0, 3, false));
        let service = context(&transport).query();

        let outcome = service.execute("SELECT object_name FROM cms_case_folder").unwrap();
        assert_eq!(
            outcome.statement,
            "SELECT r_object_id, object_name FROM cms_case_folder ENABLE(RETURN_TOP 10000)"
        );
        assert_eq!(outcome.result.limit, 10_000);
        assert_eq!(outcome.result.total_count(), 3);
        assert_eq!(
            transport.requests()[0].query_param("dql"),
            Some(outcome.statement.as_str())
        );
    }

    #[test]
    fn test_execute_honours_embedded_return_top() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(dql_page(0, 40, true));
        transport.push_ok(dql_page(40, 40, true));
        let service = context(&transport).query().with_page_size(40);

        let outcome = service
            .execute("SELECT r_object_id, user_name FROM dm_user ENABLE(RETURN_TOP 50)")
            .unwrap();
        assert_eq!(outcome.result.limit, 50);
        assert_eq!(outcome.result.total_count(), 50);
        assert!(outcome.result.truncated);
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(dql_page(0, 1, false));
        let outcome = context(&transport)
            .query()
            .execute("SELECT COUNT(*) FROM dm_user")
            .unwrap();

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["statement"], "SELECT COUNT(*) FROM dm_user");
        assert!(value["rows"].is_array());
        assert_eq!(value["truncated"], false);
    }
}

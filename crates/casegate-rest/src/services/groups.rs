use super::ServiceContext;
use crate::error::Result;
use crate::fetch::{PageSlice, PagedFetcher};
use crate::flatten::ResponseFlattener;
use casegate_dql::statement::{group_search, GROUP_COLUMNS};

/// `dm_group` listing, filtered by name prefix.
pub struct GroupService {
    fetcher: PagedFetcher,
}

impl GroupService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            fetcher: context
                .fetcher()
                .with_flattener(ResponseFlattener::with_columns(GROUP_COLUMNS.iter().copied())),
        }
    }

    pub fn search(&self, name_prefix: Option<&str>, page: u32, items_per_page: u32) -> Result<PageSlice> {
        let statement = group_search(name_prefix);
        tracing::debug!(statement = %statement, page, "searching groups");
        self.fetcher.fetch_page(&statement, page, items_per_page)
    }
}

//! Case folder search.

use super::ServiceContext;
use crate::error::Result;
use crate::fetch::{PageSlice, PagedFetcher};
use crate::flatten::ResponseFlattener;
use casegate_dql::statement::{case_search, CaseFilter, CASE_COLUMNS};
use chrono::{Local, Months, NaiveDate};

pub struct CaseService {
    fetcher: PagedFetcher,
    default_load_months: u32,
}

impl CaseService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            fetcher: context
                .fetcher()
                .with_flattener(ResponseFlattener::with_columns(CASE_COLUMNS.iter().copied())),
            default_load_months: context.config().case_default_load_months,
        }
    }

    /// Cases whose number contains `case_number`, or the recent ones when
    /// no number is given.
    pub fn search(&self, case_number: Option<&str>, page: u32, items_per_page: u32) -> Result<PageSlice> {
        self.search_on(Local::now().date_naive(), case_number, page, items_per_page)
    }

    /// [`search`](Self::search) with an explicit "today".
    pub fn search_on(
        &self,
        today: NaiveDate,
        case_number: Option<&str>,
        page: u32,
        items_per_page: u32,
    ) -> Result<PageSlice> {
        let page = page.max(1);
        let items_per_page = items_per_page.max(1);

        let filter = match case_number.map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => CaseFilter::NumberContains(number.to_string()),
            None => {
                let since = today
                    .checked_sub_months(Months::new(self.default_load_months))
                    .unwrap_or(today);
                CaseFilter::CreatedSince(since)
            }
        };

        let statement = case_search(&filter, page.saturating_mul(items_per_page));
        tracing::info!(statement = %statement, page, items_per_page, "searching cases");
        self.fetcher.fetch_page(&statement, page, items_per_page)
    }
}

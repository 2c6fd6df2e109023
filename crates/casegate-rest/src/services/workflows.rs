//! Workflow templates and instances.
//!
//! Running workflows come from the `/workflows` collection filtered by
//! process template. Workflows attached to a case are found through
//! `dmi_package`, then resolved one object at a time; a workflow whose detail
//! request fails is logged and left out rather than failing the listing.

use super::ServiceContext;
use crate::credentials::CredentialBroker;
use crate::envelope::{object_properties, Page, Row};
use crate::error::{Error, Result};
use crate::fetch::{PageSlice, PagedFetcher};
use crate::flatten::ResponseFlattener;
use crate::transport::{RestRequest, Transport};
use casegate_dql::statement::{process_filter, workflow_ids_for_case};
use serde_json::Value;
use std::sync::Arc;

const WORKFLOWS_PATH: &str = "/workflows";
const OBJECTS_PATH: &str = "/objects";
const PACKAGE_LOOKUP_SIZE: u32 = 100;

pub struct WorkflowService {
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
    packages: PagedFetcher,
    processes: Vec<String>,
}

impl WorkflowService {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            transport: context.transport().clone(),
            broker: context.broker().clone(),
            packages: context
                .fetcher()
                .with_flattener(ResponseFlattener::with_columns(["r_workflow_id"])),
            processes: context.config().workflow_processes.clone(),
        }
    }

    /// Configured process templates, one row per name.
    pub fn process_templates(&self) -> Vec<Row> {
        self.processes
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| {
                let mut row = Row::new();
                row.insert("title".to_string(), Value::from(name));
                row.insert("object_name".to_string(), Value::from(name));
                row
            })
            .collect()
    }

    /// Workflow instances started from `process_id`.
    pub fn running(&self, process_id: &str, page: u32, items_per_page: u32) -> Result<PageSlice> {
        let page = page.max(1);
        let items_per_page = items_per_page.max(1);
        let request = RestRequest::get(WORKFLOWS_PATH, &self.broker.user_auth_header())
            .param("filter", process_filter(process_id))
            .param("items-per-page", items_per_page)
            .param("page", page)
            .param("inline", true);

        let envelope = self
            .transport
            .execute(&request)
            .and_then(Page::from_value)
            .map_err(Error::request("list running workflows"))?;

        let (columns, rows) = ResponseFlattener::new().flatten_page(&envelope);
        Ok(PageSlice {
            columns,
            rows,
            page,
            items_per_page,
            has_next: envelope.has_next(),
        })
    }

    /// Property bags of every workflow carrying `case_id` as a package.
    pub fn for_case(&self, case_id: &str) -> Result<Vec<Row>> {
        let case_id = case_id.trim();
        if case_id.is_empty() {
            return Ok(Vec::new());
        }

        let packages = self
            .packages
            .fetch_page(&workflow_ids_for_case(case_id), 1, PACKAGE_LOOKUP_SIZE)?;

        let mut workflow_ids: Vec<&str> = Vec::new();
        for id in packages
            .rows
            .iter()
            .filter_map(|row| row.get("r_workflow_id").and_then(Value::as_str))
        {
            if !workflow_ids.contains(&id) {
                workflow_ids.push(id);
            }
        }
        tracing::info!(case_id, count = workflow_ids.len(), "found workflows for case");

        let authorization = self.broker.user_auth_header();
        let workflows: Vec<Row> = workflow_ids
            .into_iter()
            .filter_map(|workflow_id| {
                let request = RestRequest::get(&format!("{OBJECTS_PATH}/{workflow_id}"), &authorization);
                match self.transport.execute(&request) {
                    Ok(body) => object_properties(&body).cloned(),
                    Err(err) => {
                        tracing::warn!(workflow_id, error = %err, "skipping workflow details");
                        None
                    }
                }
            })
            .collect();

        Ok(workflows)
    }
}

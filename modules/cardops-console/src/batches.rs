//! Read views over submitted batches, their applications and past drafts.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use cardops_client::{
    ApplicationBatch, ApplicationFilter, ApplicationRecord, BatchAction, BatchFilter, Page,
    StagingBatch,
};

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::session::SessionSnapshot;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const RECENT_BATCHES: u32 = 5;

/// Tabs of the "View Applications" screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BatchTab {
    #[default]
    Pending,
    Approved,
    Rejected,
    All,
}

impl BatchTab {
    pub const TABS: [BatchTab; 4] = [
        BatchTab::Pending,
        BatchTab::Approved,
        BatchTab::Rejected,
        BatchTab::All,
    ];

    /// Backend status filter for this tab.
    pub fn status_filter(self) -> &'static str {
        match self {
            BatchTab::Pending => "PENDING_APPROVAL",
            BatchTab::Approved => {
                "APPROVED,ISSUANCE_IN_PROGRESS,PARTIALLY_ISSUED,ISSUED,ISSUANCE_FAILED"
            }
            BatchTab::Rejected => "REJECTED,CANCELED",
            BatchTab::All => "ALL",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchTab::Pending => "pending",
            BatchTab::Approved => "approved",
            BatchTab::Rejected => "rejected",
            BatchTab::All => "all",
        }
    }
}

impl fmt::Display for BatchTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchTab {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        BatchTab::TABS
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConsoleError::NotFound(format!("tab {s}")))
    }
}

/// Position of a page within a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Zero-based page index.
    pub page: u32,
    pub size: u32,
    pub offset: u64,
    pub number_of_elements: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn from_page<T>(page: &Page<T>, size: u32) -> Self {
        Self {
            page: page.number,
            size,
            offset: page.pageable.offset,
            number_of_elements: page.number_of_elements,
            total_elements: page.total_elements,
            total_pages: page.total_pages,
        }
    }

    /// "Showing a-b of n".
    pub fn summary(&self) -> String {
        if self.number_of_elements == 0 {
            return format!("Showing 0-0 of {}", self.total_elements);
        }
        let first = self.offset + 1;
        let last = self.offset + self.number_of_elements as u64;
        format!("Showing {first}-{last} of {}", self.total_elements)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

#[derive(Debug, Clone)]
pub struct BatchList {
    pub tab: BatchTab,
    pub batches: Vec<ApplicationBatch>,
    pub pagination: Pagination,
}

pub async fn load_batches(api: &dyn ConsoleApi, tab: BatchTab, page: u32, size: u32) -> Result<BatchList> {
    let filter = BatchFilter {
        status: Some(tab.status_filter().to_string()),
        batch_id: None,
    };
    let result = api.list_batches(filter, page, size).await?;
    debug!(%tab, page, count = result.content.len(), "Batches loaded");

    Ok(BatchList {
        tab,
        pagination: Pagination::from_page(&result, size),
        batches: result.content,
    })
}

/// One batch with a page of its application lines.
#[derive(Debug, Clone)]
pub struct BatchDetails {
    pub batch: ApplicationBatch,
    pub applications: Vec<ApplicationRecord>,
    pub pagination: Pagination,
}

impl BatchDetails {
    /// Actions the user may take on this batch. Only batches awaiting
    /// approval can be acted on.
    pub fn available_actions(&self, session: &SessionSnapshot) -> Vec<BatchAction> {
        if !self.batch.is_pending_approval() {
            return Vec::new();
        }
        [
            (BatchAction::Approve, "applications.approve"),
            (BatchAction::Reject, "applications.reject"),
            (BatchAction::Cancel, "applications.cancel"),
        ]
        .into_iter()
        .filter(|(_, permission)| session.has_permission(permission))
        .map(|(action, _)| action)
        .collect()
    }
}

pub async fn load_batch_details(
    api: &dyn ConsoleApi,
    batch_id: i64,
    page: u32,
    size: u32,
) -> Result<BatchDetails> {
    let batch = find_batch(api, batch_id).await?;
    let filter = ApplicationFilter {
        batch_id: Some(batch_id),
        application_id: None,
    };
    let result = api.list_applications(filter, page, size).await?;

    Ok(BatchDetails {
        batch,
        pagination: Pagination::from_page(&result, size),
        applications: result.content,
    })
}

async fn find_batch(api: &dyn ConsoleApi, batch_id: i64) -> Result<ApplicationBatch> {
    let filter = BatchFilter {
        status: None,
        batch_id: Some(batch_id),
    };
    api.list_batches(filter, 0, 1)
        .await?
        .content
        .into_iter()
        .find(|b| b.batch_id == batch_id)
        .ok_or_else(|| ConsoleError::NotFound(format!("batch {batch_id}")))
}

/// A single application record of a batch.
pub async fn load_application(
    api: &dyn ConsoleApi,
    batch_id: i64,
    application_id: i64,
) -> Result<ApplicationRecord> {
    let filter = ApplicationFilter {
        batch_id: Some(batch_id),
        application_id: Some(application_id),
    };
    api.list_applications(filter, 0, 1)
        .await?
        .content
        .into_iter()
        .find(|a| a.id == application_id)
        .ok_or_else(|| ConsoleError::NotFound(format!("application {application_id}")))
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub pending_count: u64,
    pub recent: Vec<ApplicationBatch>,
}

pub async fn load_dashboard(api: &dyn ConsoleApi) -> Result<Dashboard> {
    let pending = load_batches(api, BatchTab::Pending, 0, 1).await?;
    let recent = load_batches(api, BatchTab::All, 0, RECENT_BATCHES).await?;

    Ok(Dashboard {
        pending_count: pending.pagination.total_elements,
        recent: recent.batches,
    })
}

/// Past staging batches, newest first as returned by the backend.
#[derive(Debug, Clone)]
pub struct DraftList {
    pub drafts: Vec<StagingBatch>,
    pub pagination: Pagination,
}

pub async fn load_drafts(api: &dyn ConsoleApi, page: u32, size: u32) -> Result<DraftList> {
    let result = api.list_drafts(page, size).await?;
    Ok(DraftList {
        pagination: Pagination::from_page(&result, size),
        drafts: result.content,
    })
}

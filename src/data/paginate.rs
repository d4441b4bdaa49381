//! Marker-based pagination over an account's transaction history.

use tracing::{debug, info, warn};

use crate::data::ExplorerClient;
use crate::domain::TransactionRecord;

/// Page size used by the explorer's own UI.
pub const DEFAULT_PAGE_SIZE: usize = 25;

pub struct Paginator<'a> {
    client: &'a ExplorerClient,
    page_size: usize,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a ExplorerClient, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    /// Fetch up to `target_count` transactions for `account`, in the order the
    /// explorer returns them (newest first).
    ///
    /// Stops when the target is reached, the marker is missing or empty, a page comes back
    /// empty, or a page cannot be fetched at all. The last case keeps whatever was
    /// collected so far; nothing here is an error.
    pub fn fetch_all(&self, account: &str, target_count: usize) -> Vec<TransactionRecord> {
        let mut out: Vec<TransactionRecord> = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        while out.len() < target_count {
            let limit = self.page_size.min(target_count - out.len());
            let Some(page) = self
                .client
                .fetch_transactions_page(account, limit, marker.as_deref())
            else {
                warn!(account, collected = out.len(), ?marker, "page unavailable, keeping partial history");
                break;
            };
            pages += 1;

            let received = page.transactions.len();
            out.extend(page.transactions);
            debug!(account, page = pages, received, collected = out.len(), "page fetched");

            if received == 0 {
                break;
            }
            match page.marker {
                Some(next) if !next.is_empty() => marker = Some(next),
                _ => break,
            }
        }

        info!(account, pages, collected = out.len(), target = target_count, "history fetched");
        out
    }
}

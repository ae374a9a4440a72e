use async_trait::async_trait;
use feedtally_core::{PartnerDirectory, PartnerRecord};

use crate::backoff::RetryPolicy;
use crate::client::{Endpoint, StoreClient};
use crate::error::StoreError;
use crate::protocol::{DirectoryResponse, DirectoryRow, Request};

/// Anything that can supply the feed id to partner mapping.
#[async_trait]
pub trait PartnerSource: Send + Sync {
    async fn partner_directory(&self, only_active: bool) -> Result<PartnerDirectory, StoreError>;
}

#[async_trait]
impl PartnerSource for StoreClient {
    async fn partner_directory(&self, only_active: bool) -> Result<PartnerDirectory, StoreError> {
        let resp: DirectoryResponse = self
            .call_ok(
                Endpoint::Reader,
                &Request::GetPartnerDirectory { only_active },
                RetryPolicy::once(),
            )
            .await?;
        let directory = directory_from_rows(resp.rows, only_active);
        tracing::debug!(partners = directory.len(), only_active, "loaded partner directory");
        Ok(directory)
    }
}

/// A fixed directory, for previews and tests.
#[async_trait]
impl PartnerSource for PartnerDirectory {
    async fn partner_directory(&self, _only_active: bool) -> Result<PartnerDirectory, StoreError> {
        Ok(self.clone())
    }
}

/// Rows without a usable feed id are skipped; when `only_active` is set,
/// rows flagged inactive are skipped too.
pub fn directory_from_rows(rows: Vec<DirectoryRow>, only_active: bool) -> PartnerDirectory {
    PartnerDirectory::new(rows.into_iter().filter_map(|row| {
        let feed_id = row.feed_id?;
        let active = row.active.unwrap_or(true);
        if only_active && !active {
            return None;
        }
        Some(PartnerRecord {
            feed_id,
            partner_name: row.partner.unwrap_or_default().trim().to_string(),
            code: row.code.trim().to_string(),
            active,
        })
    }))
}

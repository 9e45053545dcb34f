use serde::{Deserialize, Serialize};

use crate::dto::listing_dto::ListingResponse;
use crate::error::{Error, Result};
use crate::services::import_service::ImportMode;
use crate::services::lifecycle_service::CleanupSummary;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfirmQuery {
    pub confirm: bool,
}

impl ConfirmQuery {
    /// Destructive admin actions only run with `confirm=true`.
    pub fn require(&self, action: &str) -> Result<()> {
        if self.confirm {
            Ok(())
        } else {
            Err(Error::ConfirmationRequired(format!(
                "{} is destructive; repeat the request with confirm=true",
                action
            )))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportQuery {
    pub mode: ImportMode,
    pub confirm: bool,
}

impl ImportQuery {
    pub fn confirmation(&self) -> ConfirmQuery {
        ConfirmQuery {
            confirm: self.confirm,
        }
    }
}

/// Admin table view: the cleanup that ran on load plus every active record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListResponse {
    pub cleanup: CleanupSummary,
    pub total: usize,
    pub listings: Vec<ListingResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedResponse {
    pub kind: String,
    pub affected: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub id: String,
    /// `false` for local collections, which remove the record outright.
    pub soft: bool,
}

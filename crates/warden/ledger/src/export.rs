//! Audit package export

use crate::entry::AuditEntry;
use crate::verify::ChainVerification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_types::{RequestId, TenantId};

/// Filter for [`crate::AuditLedger::export`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportFilter {
    /// Only entries recorded under this request.
    pub request_id: Option<RequestId>,

    /// Only entries whose details carry this tenant.
    pub tenant_id: Option<TenantId>,
}

impl ExportFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            tenant_id: None,
        }
    }

    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            request_id: None,
            tenant_id: Some(tenant_id),
        }
    }
}

/// A self-contained export of (filtered) audit entries plus a fresh
/// verification result over the full chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPackage {
    pub package_id: Uuid,
    pub exported_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    pub entry_count: usize,
    pub entries: Vec<AuditEntry>,
    pub verification: ChainVerification,
}

// =============================================================================
// MODELS MODULE
// =============================================================================
// Request bodies, query strings and response shapes of the HTTP API.
//
// NOTES:
// - Stored records live next to their entities (entity/*.rs); this module
//   only holds what the API adds around them
// - View-models are plain attribute maps plus ordered lists ("loops"); how
//   they are rendered is up to the client
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::part::Stock;
use crate::entity::structural::{BreadcrumbEntry, NodeRecord};

// =============================================================================
// REQUESTS
// =============================================================================

/// Body of `POST /api/v1/parts/:id/stock`
///
/// ```json
/// { "delta": -3 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockRequest {
    /// Positive to add, negative to remove
    pub delta: i64,
}

/// Body of `PUT /api/v1/parts/:id/stock`; `null` marks the stock unknown.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStockRequest {
    pub instock: Stock,
}

/// Body of `POST /api/v1/parts/:id/actions`
///
/// ```json
/// { "action": "add_to_device", "device_id": 3, "quantity": 2, "mount_names": "R1,R2" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PartAction {
    /// Take `amount` pieces out of stock
    Decrease { amount: i64 },
    /// Put `amount` pieces into stock
    Increase { amount: i64 },
    /// Mark the part for manual ordering
    Order { quantity: i64 },
    /// Remove the manual order mark
    Unorder,
    AddToDevice {
        device_id: i64,
        quantity: i64,
        #[serde(default)]
        mount_names: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceholderQuery {
    pub template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtreeQuery {
    #[serde(default)]
    pub include_self: bool,
}

/// Body of `POST /api/v1/attachments/proposed-filenames`
#[derive(Debug, Clone, Deserialize)]
pub struct ProposedFilenamesRequest {
    pub missing: String,
    pub available: Vec<String>,
}

// =============================================================================
// PART DETAIL VIEW
// =============================================================================

/// A structural reference of a part, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralRefView {
    pub id: i64,
    pub name: String,
    pub full_path: String,
    pub breadcrumb: Vec<BreadcrumbEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceView {
    pub min_discount_quantity: u32,
    pub price_related_quantity: u32,
    /// Price for `price_related_quantity` pieces
    pub price: String,
    pub single_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetailView {
    pub id: i64,
    pub supplier_id: i64,
    pub supplier_full_path: String,
    pub supplierpartnr: String,
    pub supplier_product_url: String,
    pub obsolete: bool,
    pub prices: Vec<PriceView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentView {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub is_picture: bool,
    pub show_in_table: bool,
}

/// Attachments of one attachment type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentGroupView {
    pub type_id: i64,
    pub type_full_path: String,
    pub attachments: Vec<AttachmentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceUsageView {
    pub device_id: i64,
    pub name: String,
    pub full_path: String,
    pub mount_quantity: u32,
    pub mount_names: String,
}

/// What the acting user may do with this part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartPermissionsView {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_move: bool,
    pub can_instock: bool,
    pub can_order: bool,
    pub can_orderdetails: bool,
    pub can_attachments: bool,
    pub can_devices: bool,
}

/// Which sections a client should show
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionVisibility {
    pub footprint: bool,
    pub manufacturer: bool,
    pub orderdetails: bool,
    pub attachments: bool,
    pub devices: bool,
    pub actions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartDetailView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub visible: bool,

    pub instock: Stock,
    pub instock_text: String,
    pub instock_unknown: bool,
    pub mininstock: u32,

    pub auto_order: bool,
    pub manual_order: bool,
    pub manual_order_exists: bool,
    pub order_quantity: u32,

    pub category: Option<StructuralRefView>,
    pub footprint: Option<StructuralRefView>,
    pub storelocation: Option<StructuralRefView>,
    pub manufacturer: Option<StructuralRefView>,
    /// Own URL, or the manufacturer's product URL template filled in
    pub manufacturer_product_url: String,

    pub datetime_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    pub orderdetails: Vec<OrderDetailView>,
    /// Only set when there is a positive average price
    pub average_price: Option<String>,
    pub attachment_groups: Vec<AttachmentGroupView>,
    pub devices: Vec<DeviceUsageView>,

    pub permissions: PartPermissionsView,
    pub sections: SectionVisibility,
}

// =============================================================================
// OTHER RESPONSES
// =============================================================================

/// One structural element with its position in the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub record: NodeRecord,
    pub full_path: String,
    pub breadcrumb: Vec<BreadcrumbEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderResponse {
    pub template: String,
    pub result: String,
}

/// Row counts per table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsResponse {
    pub counts: BTreeMap<String, i64>,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

/// Simple health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Detailed readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-checkable error kind
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }
}

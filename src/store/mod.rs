// =============================================================================
// STORAGE MODULE
// =============================================================================
// The storage collaborator: row primitives only.
//
// NOTES:
// - The entity layer issues these calls and nothing else: fetch by id,
//   fetch by parent/owner, insert, update by typed diff, delete, count
// - Each primitive is atomic on its own; entities validate a whole batch
//   before issuing a single update
// - Two implementations: PostgreSQL (sqlx) and an in-memory arena
// =============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::entity::attachment::{AttachmentRecord, NewAttachment};
use crate::entity::device_part::{DevicePartChanges, DevicePartRecord, NewDevicePart};
use crate::entity::orderdetail::{
    NewOrderDetail, NewPriceDetail, OrderDetailRecord, PriceDetailRecord,
};
use crate::entity::part::{NewPart, PartDiff, PartRecord};
use crate::entity::structural::{NewNode, NodeChanges, NodeKind, NodeRecord};
use crate::entity::user::{GroupRecord, UserRecord};
use crate::error::AppResult;
use crate::permission::PermissionRule;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

// -----------------------------------------------------------------------------
// TABLES AND FILTERS
// -----------------------------------------------------------------------------
/// Backing tables known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Parts,
    Nodes(NodeKind),
    OrderDetails,
    PriceDetails,
    Attachments,
    DeviceParts,
    Users,
    Groups,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Parts => "parts",
            Table::Nodes(kind) => kind.table(),
            Table::OrderDetails => "orderdetails",
            Table::PriceDetails => "pricedetails",
            Table::Attachments => "attachements",
            Table::DeviceParts => "device_parts",
            Table::Users => "users",
            Table::Groups => "groups",
        }
    }
}

/// Integer columns usable in equality filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ParentId,
    PartId,
    CategoryId,
    FootprintId,
    StoreLocationId,
    ManufacturerId,
    SupplierId,
    DeviceId,
    TypeId,
    GroupId,
    OrderDetailsId,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::ParentId => "parent_id",
            Column::PartId => "part_id",
            Column::CategoryId => "category_id",
            Column::FootprintId => "footprint_id",
            Column::StoreLocationId => "storelocation_id",
            Column::ManufacturerId => "manufacturer_id",
            Column::SupplierId => "supplier_id",
            Column::DeviceId => "device_id",
            Column::TypeId => "type_id",
            Column::GroupId => "group_id",
            Column::OrderDetailsId => "orderdetails_id",
        }
    }
}

/// `column = value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub value: i64,
}

impl Filter {
    pub fn eq(column: Column, value: i64) -> Self {
        Self { column, value }
    }
}

// -----------------------------------------------------------------------------
// STORAGE TRAIT
// -----------------------------------------------------------------------------
#[async_trait]
pub trait Storage: Send + Sync {
    // ----- structural elements -----
    async fn fetch_node(&self, kind: NodeKind, id: i64) -> AppResult<Option<NodeRecord>>;
    async fn fetch_children(&self, kind: NodeKind, parent_id: i64) -> AppResult<Vec<NodeRecord>>;
    async fn insert_node(&self, kind: NodeKind, node: &NewNode) -> AppResult<NodeRecord>;
    async fn update_node(&self, kind: NodeKind, id: i64, changes: &NodeChanges) -> AppResult<()>;
    async fn delete_node(&self, kind: NodeKind, id: i64) -> AppResult<()>;

    // ----- parts -----
    async fn fetch_part(&self, id: i64) -> AppResult<Option<PartRecord>>;
    async fn insert_part(&self, part: &NewPart) -> AppResult<PartRecord>;
    async fn update_part(&self, id: i64, diff: &PartDiff) -> AppResult<()>;
    /// Deletes the part together with the rows it owns.
    async fn delete_part(&self, id: i64) -> AppResult<()>;

    // ----- order details and prices -----
    async fn fetch_orderdetails(&self, part_id: i64) -> AppResult<Vec<OrderDetailRecord>>;
    async fn insert_orderdetail(&self, detail: &NewOrderDetail) -> AppResult<OrderDetailRecord>;
    async fn fetch_pricedetails(&self, orderdetails_id: i64) -> AppResult<Vec<PriceDetailRecord>>;
    async fn insert_pricedetail(&self, price: &NewPriceDetail) -> AppResult<PriceDetailRecord>;

    // ----- attachments -----
    async fn fetch_attachments(&self, part_id: i64) -> AppResult<Vec<AttachmentRecord>>;
    async fn insert_attachment(&self, attachment: &NewAttachment) -> AppResult<AttachmentRecord>;

    // ----- device parts -----
    async fn fetch_device_parts(&self, part_id: i64) -> AppResult<Vec<DevicePartRecord>>;
    async fn fetch_device_part(
        &self,
        device_id: i64,
        part_id: i64,
    ) -> AppResult<Option<DevicePartRecord>>;
    async fn insert_device_part(&self, device_part: &NewDevicePart) -> AppResult<DevicePartRecord>;
    async fn update_device_part(&self, id: i64, changes: &DevicePartChanges) -> AppResult<()>;

    // ----- users and groups -----
    async fn fetch_user(&self, id: i64) -> AppResult<Option<UserRecord>>;
    async fn fetch_group(&self, id: i64) -> AppResult<Option<GroupRecord>>;
    async fn fetch_group_rules(&self, group_id: i64) -> AppResult<Vec<PermissionRule>>;

    // ----- counting -----
    async fn count(&self, table: Table, filter: Option<Filter>) -> AppResult<i64>;

    /// Is the backing store reachable?
    async fn health_check(&self) -> bool;
}

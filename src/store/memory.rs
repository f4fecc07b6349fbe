// =============================================================================
// IN-MEMORY STORAGE
// =============================================================================
// Arena of typed rows behind one RwLock. Used by the unit tests and as the
// backend when no DATABASE_URL is configured.
//
// NOTES:
// - Ids are assigned per table (max id + 1), starting at 1
// - Each primitive takes the lock once, so every call is atomic on its own
// - A poisoned lock surfaces as an internal error
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::{Column, Filter, Storage, Table};
use crate::entity::attachment::{AttachmentRecord, NewAttachment};
use crate::entity::device_part::{DevicePartChanges, DevicePartRecord, NewDevicePart};
use crate::entity::orderdetail::{
    NewOrderDetail, NewPriceDetail, OrderDetailRecord, PriceDetailRecord,
};
use crate::entity::part::{NewPart, PartDiff, PartRecord, Stock};
use crate::entity::structural::{
    CategoryAttributes, CompanyAttributes, NewNode, NodeAttributes, NodeChanges, NodeKind,
    NodeRecord,
};
use crate::entity::user::{GroupRecord, UserRecord};
use crate::error::{AppError, AppResult};
use crate::permission::{Operation, PermissionRule, Resource};

#[derive(Debug, Default)]
struct Arena {
    nodes: HashMap<NodeKind, BTreeMap<i64, NodeRecord>>,
    parts: BTreeMap<i64, PartRecord>,
    orderdetails: BTreeMap<i64, OrderDetailRecord>,
    pricedetails: BTreeMap<i64, PriceDetailRecord>,
    attachments: BTreeMap<i64, AttachmentRecord>,
    device_parts: BTreeMap<i64, DevicePartRecord>,
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    rules: Vec<PermissionRule>,
    /// Last id handed out per table; ids of deleted rows are never reused.
    sequences: HashMap<Table, i64>,
}

fn unknown_column(table: Table, column: Column) -> AppError {
    AppError::Internal(format!(
        "column {} does not exist in table {}",
        column.name(),
        table.name()
    ))
}

impl Arena {
    fn next_id(&mut self, table: Table) -> i64 {
        let last = self.sequences.entry(table).or_insert(0);
        *last += 1;
        *last
    }

    fn nodes(&self, kind: NodeKind) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.get(&kind).into_iter().flat_map(|rows| rows.values())
    }

    fn insert_node(&mut self, kind: NodeKind, node: &NewNode) -> NodeRecord {
        let id = self.next_id(Table::Nodes(kind));
        let rows = self.nodes.entry(kind).or_default();
        let now = Utc::now();
        let record = NodeRecord {
            id,
            parent_id: node.parent_id,
            name: node.name.clone(),
            comment: node.comment.clone(),
            attributes: node
                .attributes
                .clone()
                .unwrap_or_else(|| kind.default_attributes()),
            datetime_added: now,
            last_modified: now,
        };
        rows.insert(record.id, record.clone());
        record
    }

    fn insert_part(&mut self, part: &NewPart) -> PartRecord {
        let now = Utc::now();
        let record = PartRecord {
            id: self.next_id(Table::Parts),
            name: part.name.clone(),
            description: part.description.clone(),
            comment: part.comment.clone(),
            instock: part.instock,
            mininstock: part.mininstock,
            visible: part.visible,
            manual_order: false,
            order_quantity: 0,
            category_id: part.category_id,
            footprint_id: part.footprint_id,
            storelocation_id: part.storelocation_id,
            manufacturer_id: part.manufacturer_id,
            manufacturer_product_url: part.manufacturer_product_url.clone(),
            datetime_added: now,
            last_modified: now,
        };
        self.parts.insert(record.id, record.clone());
        record
    }

    fn insert_orderdetail(&mut self, detail: &NewOrderDetail) -> OrderDetailRecord {
        let record = OrderDetailRecord {
            id: self.next_id(Table::OrderDetails),
            part_id: detail.part_id,
            supplier_id: detail.supplier_id,
            supplierpartnr: detail.supplierpartnr.clone(),
            obsolete: detail.obsolete,
            supplier_product_url: detail.supplier_product_url.clone(),
        };
        self.orderdetails.insert(record.id, record.clone());
        record
    }

    fn insert_pricedetail(&mut self, price: &NewPriceDetail) -> PriceDetailRecord {
        let record = PriceDetailRecord {
            id: self.next_id(Table::PriceDetails),
            orderdetails_id: price.orderdetails_id,
            price: price.price,
            price_related_quantity: price.price_related_quantity,
            min_discount_quantity: price.min_discount_quantity,
        };
        self.pricedetails.insert(record.id, record.clone());
        record
    }

    fn count(&self, table: Table, filter: Option<Filter>) -> AppResult<i64> {
        let Some(Filter { column, value }) = filter else {
            let total = match table {
                Table::Parts => self.parts.len(),
                Table::Nodes(kind) => self.nodes(kind).count(),
                Table::OrderDetails => self.orderdetails.len(),
                Table::PriceDetails => self.pricedetails.len(),
                Table::Attachments => self.attachments.len(),
                Table::DeviceParts => self.device_parts.len(),
                Table::Users => self.users.len(),
                Table::Groups => self.groups.len(),
            };
            return Ok(total as i64);
        };

        let matching = match (table, column) {
            (Table::Parts, column) => {
                let field: fn(&PartRecord) -> Option<i64> = match column {
                    Column::CategoryId => |p| p.category_id,
                    Column::FootprintId => |p| p.footprint_id,
                    Column::StoreLocationId => |p| p.storelocation_id,
                    Column::ManufacturerId => |p| p.manufacturer_id,
                    _ => return Err(unknown_column(table, column)),
                };
                self.parts.values().filter(|p| field(p) == Some(value)).count()
            }
            (Table::Nodes(kind), Column::ParentId) => {
                self.nodes(kind).filter(|n| n.parent_id == value).count()
            }
            (Table::OrderDetails, Column::PartId) => {
                self.orderdetails.values().filter(|o| o.part_id == value).count()
            }
            (Table::OrderDetails, Column::SupplierId) => {
                self.orderdetails.values().filter(|o| o.supplier_id == value).count()
            }
            (Table::PriceDetails, Column::OrderDetailsId) => self
                .pricedetails
                .values()
                .filter(|p| p.orderdetails_id == value)
                .count(),
            (Table::Attachments, Column::PartId) => {
                self.attachments.values().filter(|a| a.part_id == value).count()
            }
            (Table::Attachments, Column::TypeId) => {
                self.attachments.values().filter(|a| a.type_id == value).count()
            }
            (Table::DeviceParts, Column::PartId) => {
                self.device_parts.values().filter(|d| d.part_id == value).count()
            }
            (Table::DeviceParts, Column::DeviceId) => {
                self.device_parts.values().filter(|d| d.device_id == value).count()
            }
            (Table::Users, Column::GroupId) => {
                self.users.values().filter(|u| u.group_id == value).count()
            }
            (table, column) => return Err(unknown_column(table, column)),
        };
        Ok(matching as i64)
    }
}

// =============================================================================
// STORAGE HANDLE
// =============================================================================
#[derive(Debug, Default)]
pub struct MemoryStorage {
    arena: RwLock<Arena>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Arena>> {
        self.arena
            .read()
            .map_err(|_| AppError::Internal("memory storage lock poisoned".into()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Arena>> {
        self.arena
            .write()
            .map_err(|_| AppError::Internal("memory storage lock poisoned".into()))
    }

    // -------------------------------------------------------------------------
    // ACCOUNT SETUP
    // -------------------------------------------------------------------------
    // Users and groups are administered outside this service; these helpers
    // only fill the arena.

    pub fn add_group(&self, name: &str) -> i64 {
        let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
        let id = arena.next_id(Table::Groups);
        arena.groups.insert(
            id,
            GroupRecord {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    /// Sets one rule, replacing an existing rule for the same pair.
    pub fn add_rule(&self, group_id: i64, resource: Resource, operation: Operation, allowed: bool) {
        let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
        arena
            .rules
            .retain(|r| !(r.group_id == group_id && r.resource == resource && r.operation == operation));
        arena.rules.push(PermissionRule {
            group_id,
            resource,
            operation,
            allowed,
        });
    }

    pub fn add_user(&self, name: &str, group_id: i64) -> i64 {
        let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
        let id = arena.next_id(Table::Users);
        arena.users.insert(
            id,
            UserRecord {
                id,
                name: name.to_string(),
                group_id,
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                department: String::new(),
            },
        );
        id
    }

    // -------------------------------------------------------------------------
    // SAMPLE DATA
    // -------------------------------------------------------------------------
    /// A small workshop inventory for running without a database.
    ///
    /// - user 1 "admin" (group "admins", every rule allowed)
    /// - user 2 "guest" (group "readonly", read rules only)
    pub fn seeded() -> Self {
        let store = Self::new();

        let admins = store.add_group("admins");
        let readonly = store.add_group("readonly");
        for resource in Resource::ALL {
            for operation in Operation::ALL {
                store.add_rule(admins, resource, operation, true);
            }
            store.add_rule(readonly, resource, Operation::Read, true);
        }
        store.add_user("admin", admins);
        store.add_user("guest", readonly);

        let mut arena = store.arena.write().unwrap_or_else(|e| e.into_inner());

        let node = |parent_id: i64, name: &str| NewNode::new(parent_id, name);
        let electronics = arena.insert_node(NodeKind::Category, &node(0, "Electronics")).id;
        let passive = arena.insert_node(NodeKind::Category, &node(electronics, "Passive")).id;
        let resistors = arena.insert_node(NodeKind::Category, &node(passive, "Resistors")).id;
        let capacitors = arena.insert_node(NodeKind::Category, &node(passive, "Capacitors")).id;
        let semis = arena.insert_node(NodeKind::Category, &node(electronics, "Semiconductors")).id;
        let leds = arena.insert_node(NodeKind::Category, &node(semis, "LEDs")).id;
        arena.insert_node(
            NodeKind::Category,
            &NewNode {
                attributes: Some(NodeAttributes::Category(CategoryAttributes {
                    disable_footprints: true,
                    ..CategoryAttributes::default()
                })),
                ..node(0, "Mechanical")
            },
        );

        let smd = arena.insert_node(NodeKind::Footprint, &node(0, "SMD")).id;
        let r0805 = arena.insert_node(NodeKind::Footprint, &node(smd, "0805")).id;
        let tht = arena.insert_node(NodeKind::Footprint, &node(0, "THT")).id;
        let led5 = arena.insert_node(NodeKind::Footprint, &node(tht, "LED 5mm")).id;

        let cabinet = arena.insert_node(NodeKind::StoreLocation, &node(0, "Cabinet A")).id;
        let drawer = arena.insert_node(NodeKind::StoreLocation, &node(cabinet, "Drawer 1")).id;

        let yageo = arena
            .insert_node(
                NodeKind::Manufacturer,
                &NewNode {
                    attributes: Some(NodeAttributes::Company(CompanyAttributes {
                        website: "https://www.yageo.com".into(),
                        auto_product_url: "https://www.yageo.com/search?q=%PARTNUMBER%".into(),
                        ..CompanyAttributes::default()
                    })),
                    ..node(0, "Yageo")
                },
            )
            .id;
        let kingbright = arena.insert_node(NodeKind::Manufacturer, &node(0, "Kingbright")).id;

        let reichelt = arena.insert_node(NodeKind::Supplier, &node(0, "Reichelt")).id;
        let mouser = arena.insert_node(NodeKind::Supplier, &node(0, "Mouser")).id;

        arena.insert_node(NodeKind::Device, &node(0, "Amplifier"));
        arena.insert_node(NodeKind::AttachmentType, &node(0, "Datasheets"));
        arena.insert_node(NodeKind::AttachmentType, &node(0, "Pictures"));

        let resistor = arena.insert_part(&NewPart {
            description: "10k 1% 0805".into(),
            instock: Stock::Known(420),
            mininstock: 100,
            category_id: Some(resistors),
            footprint_id: Some(r0805),
            storelocation_id: Some(drawer),
            manufacturer_id: Some(yageo),
            ..NewPart::named("RC0805FR-0710KL")
        });
        let led = arena.insert_part(&NewPart {
            description: "LED red 5mm".into(),
            instock: Stock::Known(3),
            mininstock: 20,
            category_id: Some(leds),
            footprint_id: Some(led5),
            storelocation_id: Some(drawer),
            manufacturer_id: Some(kingbright),
            ..NewPart::named("L-53HD")
        });
        arena.insert_part(&NewPart {
            description: "100nF 50V X7R".into(),
            instock: Stock::Unknown,
            category_id: Some(capacitors),
            footprint_id: Some(r0805),
            ..NewPart::named("Ceramic 100n")
        });

        let offers = [
            (resistor.id, reichelt, "SMD-0805 10K", vec![(1, Decimal::new(10, 2)), (100, Decimal::new(2, 2))]),
            (led.id, reichelt, "LED 5MM RT", vec![(1, Decimal::new(8, 2))]),
            (led.id, mouser, "604-L-53HD", vec![(1, Decimal::new(12, 2))]),
        ];
        for (part_id, supplier_id, supplierpartnr, prices) in offers {
            let detail = arena.insert_orderdetail(&NewOrderDetail {
                part_id,
                supplier_id,
                supplierpartnr: supplierpartnr.into(),
                obsolete: false,
                supplier_product_url: String::new(),
            });
            for (min_discount_quantity, price) in prices {
                arena.insert_pricedetail(&NewPriceDetail {
                    orderdetails_id: detail.id,
                    price,
                    price_related_quantity: 1,
                    min_discount_quantity,
                });
            }
        }

        drop(arena);
        store
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    // ----- structural elements -----
    async fn fetch_node(&self, kind: NodeKind, id: i64) -> AppResult<Option<NodeRecord>> {
        Ok(self.read()?.nodes(kind).find(|n| n.id == id).cloned())
    }

    async fn fetch_children(&self, kind: NodeKind, parent_id: i64) -> AppResult<Vec<NodeRecord>> {
        Ok(self
            .read()?
            .nodes(kind)
            .filter(|n| n.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn insert_node(&self, kind: NodeKind, node: &NewNode) -> AppResult<NodeRecord> {
        Ok(self.write()?.insert_node(kind, node))
    }

    async fn update_node(&self, kind: NodeKind, id: i64, changes: &NodeChanges) -> AppResult<()> {
        let mut arena = self.write()?;
        let record = arena
            .nodes
            .get_mut(&kind)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| AppError::not_found(kind.entity_name(), id))?;
        if let Some(name) = &changes.name {
            record.name = name.clone();
        }
        if let Some(parent_id) = changes.parent_id {
            record.parent_id = parent_id;
        }
        if let Some(comment) = &changes.comment {
            record.comment = comment.clone();
        }
        if let Some(attributes) = &changes.attributes {
            record.attributes = attributes.clone();
        }
        record.last_modified = Utc::now();
        Ok(())
    }

    async fn delete_node(&self, kind: NodeKind, id: i64) -> AppResult<()> {
        let mut arena = self.write()?;
        arena
            .nodes
            .get_mut(&kind)
            .and_then(|rows| rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(kind.entity_name(), id))
    }

    // ----- parts -----
    async fn fetch_part(&self, id: i64) -> AppResult<Option<PartRecord>> {
        Ok(self.read()?.parts.get(&id).cloned())
    }

    async fn insert_part(&self, part: &NewPart) -> AppResult<PartRecord> {
        Ok(self.write()?.insert_part(part))
    }

    async fn update_part(&self, id: i64, diff: &PartDiff) -> AppResult<()> {
        let mut arena = self.write()?;
        let record = arena
            .parts
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Part", id))?;
        diff.apply(record);
        record.last_modified = Utc::now();
        Ok(())
    }

    async fn delete_part(&self, id: i64) -> AppResult<()> {
        let mut arena = self.write()?;
        if arena.parts.remove(&id).is_none() {
            return Err(AppError::not_found("Part", id));
        }
        let details: Vec<i64> = arena
            .orderdetails
            .values()
            .filter(|o| o.part_id == id)
            .map(|o| o.id)
            .collect();
        arena
            .pricedetails
            .retain(|_, p| !details.contains(&p.orderdetails_id));
        arena.orderdetails.retain(|_, o| o.part_id != id);
        arena.attachments.retain(|_, a| a.part_id != id);
        arena.device_parts.retain(|_, d| d.part_id != id);
        Ok(())
    }

    // ----- order details and prices -----
    async fn fetch_orderdetails(&self, part_id: i64) -> AppResult<Vec<OrderDetailRecord>> {
        Ok(self
            .read()?
            .orderdetails
            .values()
            .filter(|o| o.part_id == part_id)
            .cloned()
            .collect())
    }

    async fn insert_orderdetail(&self, detail: &NewOrderDetail) -> AppResult<OrderDetailRecord> {
        Ok(self.write()?.insert_orderdetail(detail))
    }

    async fn fetch_pricedetails(&self, orderdetails_id: i64) -> AppResult<Vec<PriceDetailRecord>> {
        Ok(self
            .read()?
            .pricedetails
            .values()
            .filter(|p| p.orderdetails_id == orderdetails_id)
            .cloned()
            .collect())
    }

    async fn insert_pricedetail(&self, price: &NewPriceDetail) -> AppResult<PriceDetailRecord> {
        Ok(self.write()?.insert_pricedetail(price))
    }

    // ----- attachments -----
    async fn fetch_attachments(&self, part_id: i64) -> AppResult<Vec<AttachmentRecord>> {
        Ok(self
            .read()?
            .attachments
            .values()
            .filter(|a| a.part_id == part_id)
            .cloned()
            .collect())
    }

    async fn insert_attachment(&self, attachment: &NewAttachment) -> AppResult<AttachmentRecord> {
        let mut arena = self.write()?;
        let record = AttachmentRecord {
            id: arena.next_id(Table::Attachments),
            part_id: attachment.part_id,
            type_id: attachment.type_id,
            name: attachment.name.clone(),
            filename: attachment.filename.clone(),
            show_in_table: attachment.show_in_table,
        };
        arena.attachments.insert(record.id, record.clone());
        Ok(record)
    }

    // ----- device parts -----
    async fn fetch_device_parts(&self, part_id: i64) -> AppResult<Vec<DevicePartRecord>> {
        Ok(self
            .read()?
            .device_parts
            .values()
            .filter(|d| d.part_id == part_id)
            .cloned()
            .collect())
    }

    async fn fetch_device_part(
        &self,
        device_id: i64,
        part_id: i64,
    ) -> AppResult<Option<DevicePartRecord>> {
        Ok(self
            .read()?
            .device_parts
            .values()
            .find(|d| d.device_id == device_id && d.part_id == part_id)
            .cloned())
    }

    async fn insert_device_part(&self, device_part: &NewDevicePart) -> AppResult<DevicePartRecord> {
        let mut arena = self.write()?;
        let record = DevicePartRecord {
            id: arena.next_id(Table::DeviceParts),
            device_id: device_part.device_id,
            part_id: device_part.part_id,
            quantity: device_part.quantity,
            mount_names: device_part.mount_names.clone(),
        };
        arena.device_parts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_device_part(&self, id: i64, changes: &DevicePartChanges) -> AppResult<()> {
        let mut arena = self.write()?;
        let record = arena
            .device_parts
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("DevicePart", id))?;
        if let Some(quantity) = changes.quantity {
            record.quantity = quantity;
        }
        if let Some(mount_names) = &changes.mount_names {
            record.mount_names = mount_names.clone();
        }
        Ok(())
    }

    // ----- users and groups -----
    async fn fetch_user(&self, id: i64) -> AppResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn fetch_group(&self, id: i64) -> AppResult<Option<GroupRecord>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    async fn fetch_group_rules(&self, group_id: i64) -> AppResult<Vec<PermissionRule>> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect())
    }

    // ----- counting -----
    async fn count(&self, table: Table, filter: Option<Filter>) -> AppResult<i64> {
        self.read()?.count(table, filter)
    }

    async fn health_check(&self) -> bool {
        self.arena.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_assigned_per_table() {
        let store = MemoryStorage::new();
        let a = store.insert_node(NodeKind::Category, &NewNode::new(0, "A")).await.unwrap();
        let b = store.insert_node(NodeKind::Footprint, &NewNode::new(0, "B")).await.unwrap();
        let c = store.insert_node(NodeKind::Category, &NewNode::new(a.id, "C")).await.unwrap();
        assert_eq!((a.id, b.id, c.id), (1, 1, 2));
        assert_eq!(store.fetch_children(NodeKind::Category, a.id).await.unwrap(), vec![c]);
    }

    #[tokio::test]
    async fn test_delete_part_cascades() {
        let store = MemoryStorage::new();
        let part = store.insert_part(&NewPart::named("P")).await.unwrap();
        let detail = store
            .insert_orderdetail(&NewOrderDetail {
                part_id: part.id,
                supplier_id: 1,
                supplierpartnr: "X".into(),
                obsolete: false,
                supplier_product_url: String::new(),
            })
            .await
            .unwrap();
        store
            .insert_pricedetail(&NewPriceDetail {
                orderdetails_id: detail.id,
                price: Decimal::ONE,
                price_related_quantity: 1,
                min_discount_quantity: 1,
            })
            .await
            .unwrap();

        store.delete_part(part.id).await.unwrap();
        assert_eq!(store.count(Table::OrderDetails, None).await.unwrap(), 0);
        assert_eq!(store.count(Table::PriceDetails, None).await.unwrap(), 0);
        assert!(store.delete_part(part.id).await.is_err());
    }

    #[tokio::test]
    async fn test_ids_of_deleted_rows_are_not_reused() {
        let store = MemoryStorage::new();
        let first = store.insert_part(&NewPart::named("P1")).await.unwrap();
        let second = store.insert_part(&NewPart::named("P2")).await.unwrap();
        store.delete_part(second.id).await.unwrap();

        let third = store.insert_part(&NewPart::named("P3")).await.unwrap();
        assert_eq!((first.id, second.id, third.id), (1, 2, 3));
        assert!(store.fetch_part(second.id).await.unwrap().is_none());

        let node = store.insert_node(NodeKind::Device, &NewNode::new(0, "D")).await.unwrap();
        store.delete_node(NodeKind::Device, node.id).await.unwrap();
        let next = store.insert_node(NodeKind::Device, &NewNode::new(0, "E")).await.unwrap();
        assert_eq!(next.id, node.id + 1);
    }

    #[tokio::test]
    async fn test_count_rejects_unknown_columns() {
        let store = MemoryStorage::new();
        let err = store
            .count(Table::Groups, Some(Filter::eq(Column::PartId, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_seeded_dataset() {
        let store = MemoryStorage::seeded();
        assert_eq!(store.count(Table::Parts, None).await.unwrap(), 3);
        assert_eq!(store.count(Table::Nodes(NodeKind::Category), None).await.unwrap(), 7);
        assert_eq!(store.count(Table::Users, None).await.unwrap(), 2);
        let admin_rules = store.fetch_group_rules(1).await.unwrap();
        assert_eq!(admin_rules.len(), Resource::ALL.len() * Operation::ALL.len());
        assert!(store.health_check().await);
    }
}

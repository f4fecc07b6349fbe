// =============================================================================
// STRUCTURAL ELEMENTS
// =============================================================================
// Named, tree-positioned records: categories, footprints, storage locations,
// manufacturers, suppliers, devices and attachment types.
//
// NOTES:
// - Each kind is a forest; parent_id = 0 means "child of the virtual root"
// - Parents are stored as ids, never as live pointers; paths are recomputed
//   on demand by walking parent ids
// - Invariants: no element is its own ancestor, and sibling names are unique
//   case-insensitively
// - Walks are bounded by MAX_TREE_DEPTH so corrupted rows cannot loop forever
// =============================================================================

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_name, Derived, Entity, ROOT_ID};
use crate::error::{AppError, AppResult, ValidationError};
use crate::permission::Resource;
use crate::store::{Column, Filter, Storage, Table};

/// Deepest allowed nesting below the virtual root.
pub const MAX_TREE_DEPTH: usize = 64;

/// Separator used for full paths unless the caller asks for another one.
pub const DEFAULT_PATH_SEPARATOR: &str = " → ";

// =============================================================================
// KINDS
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "categories")]
    Category,
    #[serde(rename = "footprints")]
    Footprint,
    #[serde(rename = "storelocations")]
    StoreLocation,
    #[serde(rename = "manufacturers")]
    Manufacturer,
    #[serde(rename = "suppliers")]
    Supplier,
    #[serde(rename = "devices")]
    Device,
    #[serde(rename = "attachement_types")]
    AttachmentType,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Category,
        NodeKind::Footprint,
        NodeKind::StoreLocation,
        NodeKind::Manufacturer,
        NodeKind::Supplier,
        NodeKind::Device,
        NodeKind::AttachmentType,
    ];

    /// Backing table (also the URL segment)
    pub fn table(&self) -> &'static str {
        match self {
            NodeKind::Category => "categories",
            NodeKind::Footprint => "footprints",
            NodeKind::StoreLocation => "storelocations",
            NodeKind::Manufacturer => "manufacturers",
            NodeKind::Supplier => "suppliers",
            NodeKind::Device => "devices",
            NodeKind::AttachmentType => "attachement_types",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.table() == value)
    }

    pub fn entity_name(&self) -> &'static str {
        match self {
            NodeKind::Category => "Category",
            NodeKind::Footprint => "Footprint",
            NodeKind::StoreLocation => "StoreLocation",
            NodeKind::Manufacturer => "Manufacturer",
            NodeKind::Supplier => "Supplier",
            NodeKind::Device => "Device",
            NodeKind::AttachmentType => "AttachmentType",
        }
    }

    /// Permission resource guarding this kind
    pub fn resource(&self) -> Resource {
        match self {
            NodeKind::Category => Resource::Categories,
            NodeKind::Footprint => Resource::Footprints,
            NodeKind::StoreLocation => Resource::StoreLocations,
            NodeKind::Manufacturer => Resource::Manufacturers,
            NodeKind::Supplier => Resource::Suppliers,
            NodeKind::Device => Resource::Devices,
            NodeKind::AttachmentType => Resource::AttachmentTypes,
        }
    }

    /// Default breadcrumb route and id parameter name
    pub fn default_route(&self) -> (&'static str, &'static str) {
        match self {
            NodeKind::Category => ("show_category_parts", "cid"),
            NodeKind::Footprint => ("show_footprint_parts", "fid"),
            NodeKind::StoreLocation => ("show_location_parts", "lid"),
            NodeKind::Manufacturer => ("show_manufacturer_parts", "mid"),
            NodeKind::Supplier => ("show_supplier_parts", "sid"),
            NodeKind::Device => ("show_device_parts", "device_id"),
            NodeKind::AttachmentType => ("show_attachement_type", "aid"),
        }
    }

    pub fn default_attributes(&self) -> NodeAttributes {
        match self {
            NodeKind::Category => NodeAttributes::Category(CategoryAttributes::default()),
            NodeKind::Footprint => NodeAttributes::Footprint(FootprintAttributes::default()),
            NodeKind::StoreLocation => {
                NodeAttributes::StoreLocation(StoreLocationAttributes::default())
            }
            NodeKind::Manufacturer | NodeKind::Supplier => {
                NodeAttributes::Company(CompanyAttributes::default())
            }
            NodeKind::Device => NodeAttributes::Device(DeviceAttributes::default()),
            NodeKind::AttachmentType => NodeAttributes::Plain,
        }
    }

    /// Table and column of the records that reference an element of this kind.
    /// An element with dependents cannot be deleted.
    pub fn dependents(&self) -> (Table, Column, &'static str) {
        match self {
            NodeKind::Category => (Table::Parts, Column::CategoryId, "parts"),
            NodeKind::Footprint => (Table::Parts, Column::FootprintId, "parts"),
            NodeKind::StoreLocation => (Table::Parts, Column::StoreLocationId, "parts"),
            NodeKind::Manufacturer => (Table::Parts, Column::ManufacturerId, "parts"),
            NodeKind::Supplier => (Table::OrderDetails, Column::SupplierId, "order details"),
            NodeKind::Device => (Table::DeviceParts, Column::DeviceId, "device parts"),
            NodeKind::AttachmentType => (Table::Attachments, Column::TypeId, "attachments"),
        }
    }
}

// =============================================================================
// KIND-SPECIFIC ATTRIBUTES
// =============================================================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryAttributes {
    pub disable_footprints: bool,
    pub disable_manufacturers: bool,
    pub disable_autodatasheets: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintAttributes {
    pub filename: String,
    pub filename_3d: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLocationAttributes {
    pub is_full: bool,
}

/// Shared by manufacturers and suppliers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyAttributes {
    pub address: String,
    pub phone_number: String,
    pub fax_number: String,
    pub email_address: String,
    pub website: String,
    /// URL template for product pages, `%PARTNUMBER%` is replaced
    pub auto_product_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceAttributes {
    pub order_quantity: u32,
    pub order_only_missing_parts: bool,
}

/// Extra attributes stored next to the common columns (as JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeAttributes {
    Category(CategoryAttributes),
    Footprint(FootprintAttributes),
    StoreLocation(StoreLocationAttributes),
    Company(CompanyAttributes),
    Device(DeviceAttributes),
    Plain,
}

impl NodeAttributes {
    pub fn matches(&self, kind: NodeKind) -> bool {
        matches!(
            (self, kind),
            (NodeAttributes::Category(_), NodeKind::Category)
                | (NodeAttributes::Footprint(_), NodeKind::Footprint)
                | (NodeAttributes::StoreLocation(_), NodeKind::StoreLocation)
                | (NodeAttributes::Company(_), NodeKind::Manufacturer)
                | (NodeAttributes::Company(_), NodeKind::Supplier)
                | (NodeAttributes::Device(_), NodeKind::Device)
                | (NodeAttributes::Plain, NodeKind::AttachmentType)
        )
    }
}

// =============================================================================
// RECORDS
// =============================================================================
/// One stored row of a structural table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    /// 0 = child of the virtual root
    pub parent_id: i64,
    pub name: String,
    pub comment: String,
    pub attributes: NodeAttributes,
    pub datetime_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Insert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub parent_id: i64,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    /// Defaults to the kind's default attributes
    #[serde(default)]
    pub attributes: Option<NodeAttributes>,
}

impl NewNode {
    pub fn new(parent_id: i64, name: impl Into<String>) -> Self {
        Self {
            parent_id,
            name: name.into(),
            comment: String::new(),
            attributes: None,
        }
    }
}

/// Batch of attribute changes; also the storage-level diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeChanges {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
    pub comment: Option<String>,
    pub attributes: Option<NodeAttributes>,
}

impl NodeChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parent_id.is_none()
            && self.comment.is_none()
            && self.attributes.is_none()
    }
}

// =============================================================================
// VIEW HELPERS
// =============================================================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbEntry {
    pub id: i64,
    pub label: String,
    /// None for the current element when `link_self` is off
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreadcrumbOptions {
    pub route: String,
    pub id_field: String,
    /// When set, an entry for the virtual root is prepended with this label
    pub root_label: Option<String>,
    pub link_self: bool,
}

impl BreadcrumbOptions {
    pub fn new(route: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            id_field: id_field.into(),
            root_label: None,
            link_self: true,
        }
    }

    pub fn for_kind(kind: NodeKind) -> Self {
        let (route, id_field) = kind.default_route();
        Self::new(route, id_field)
    }

    fn link(&self, id: i64) -> String {
        format!("{}?{}={}", self.route, self.id_field, id)
    }
}

/// One element of a subtree listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtreeEntry {
    /// Distance from the element the subtree was requested for
    pub level: usize,
    pub node: NodeRecord,
}

/// Nested navigation tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: i64,
    pub text: String,
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<TreeNode>,
}

fn sort_key(node: &NodeRecord) -> (String, i64) {
    (node.name.to_lowercase(), node.id)
}

// =============================================================================
// STRUCTURAL ELEMENT
// =============================================================================
#[derive(Debug, Clone)]
pub struct StructuralElement {
    kind: NodeKind,
    record: NodeRecord,
    /// Root-to-self chain, excluding the virtual root
    ancestors: Derived<Vec<NodeRecord>>,
}

impl Entity for StructuralElement {
    fn entity_name(&self) -> &'static str {
        self.kind.entity_name()
    }

    fn id(&self) -> i64 {
        self.record.id
    }

    fn invalidate(&mut self) {
        self.ancestors.invalidate();
    }
}

impl StructuralElement {
    // -------------------------------------------------------------------------
    // CONSTRUCTION / LOADING
    // -------------------------------------------------------------------------
    pub fn from_record(kind: NodeKind, record: NodeRecord) -> Self {
        Self {
            kind,
            record,
            ancestors: Derived::default(),
        }
    }

    /// The virtual root of a kind's forest
    pub fn root(kind: NodeKind) -> Self {
        let now = Utc::now();
        Self::from_record(
            kind,
            NodeRecord {
                id: ROOT_ID,
                parent_id: ROOT_ID,
                name: "Root".to_string(),
                comment: String::new(),
                attributes: kind.default_attributes(),
                datetime_added: now,
                last_modified: now,
            },
        )
    }

    /// Loads an element; id 0 yields the virtual root.
    pub async fn load(store: &dyn Storage, kind: NodeKind, id: i64) -> AppResult<Self> {
        if id == ROOT_ID {
            return Ok(Self::root(kind));
        }
        let record = store
            .fetch_node(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(kind.entity_name(), id))?;
        Ok(Self::from_record(kind, record))
    }

    /// Loads an optional reference (None or 0 means "no element").
    pub async fn load_optional(
        store: &dyn Storage,
        kind: NodeKind,
        id: Option<i64>,
    ) -> AppResult<Option<Self>> {
        match id {
            Some(id) if id != ROOT_ID => Ok(Some(Self::load(store, kind, id).await?)),
            _ => Ok(None),
        }
    }

    /// Validates and inserts a new element below `new.parent_id`.
    pub async fn create(store: &dyn Storage, kind: NodeKind, new: NewNode) -> AppResult<Self> {
        let name = normalize_name("name", &new.name)?;
        let attributes = new.attributes.unwrap_or_else(|| kind.default_attributes());
        if !attributes.matches(kind) {
            return Err(ValidationError::attribute(
                "attributes",
                format!("attributes do not belong to a {}", kind.entity_name()),
            )
            .into());
        }

        ensure_parent_exists(store, kind, new.parent_id).await?;
        ensure_depth_fits(store, kind, new.parent_id, 1).await?;
        ensure_unique_name(store, kind, new.parent_id, &name, None).await?;

        let record = store
            .insert_node(
                kind,
                &NewNode {
                    parent_id: new.parent_id,
                    name,
                    comment: new.comment,
                    attributes: Some(attributes),
                },
            )
            .await?;
        Ok(Self::from_record(kind, record))
    }

    // -------------------------------------------------------------------------
    // ACCESSORS
    // -------------------------------------------------------------------------
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    pub fn into_record(self) -> NodeRecord {
        self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn parent_id(&self) -> i64 {
        self.record.parent_id
    }

    pub fn comment(&self) -> &str {
        &self.record.comment
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.record.attributes
    }

    pub fn is_root(&self) -> bool {
        self.record.id == ROOT_ID
    }

    // -------------------------------------------------------------------------
    // MUTATION
    // -------------------------------------------------------------------------
    /// Validates the whole batch, then commits it with one storage update.
    /// On failure nothing is written and `self` is unchanged.
    pub async fn set_attributes(
        &mut self,
        store: &dyn Storage,
        changes: NodeChanges,
    ) -> AppResult<()> {
        if self.is_root() {
            return Err(AppError::invalid("the root element cannot be modified"));
        }
        if changes.is_empty() {
            return Ok(());
        }

        let mut diff = NodeChanges {
            comment: changes.comment,
            ..NodeChanges::default()
        };

        if let Some(name) = &changes.name {
            diff.name = Some(normalize_name("name", name)?);
        }

        if let Some(attributes) = changes.attributes {
            if !attributes.matches(self.kind) {
                return Err(ValidationError::attribute(
                    "attributes",
                    format!("attributes do not belong to a {}", self.kind.entity_name()),
                )
                .into());
            }
            diff.attributes = Some(attributes);
        }

        if let Some(new_parent_id) = changes.parent_id {
            if new_parent_id != self.record.parent_id {
                self.ensure_not_below_self(store, new_parent_id).await?;
                ensure_parent_exists(store, self.kind, new_parent_id).await?;
                let height = self
                    .subtree(store, true)
                    .await?
                    .iter()
                    .map(|entry| entry.level + 1)
                    .max()
                    .unwrap_or(1);
                ensure_depth_fits(store, self.kind, new_parent_id, height).await?;
            }
            diff.parent_id = Some(new_parent_id);
        }

        let target_parent = diff.parent_id.unwrap_or(self.record.parent_id);
        let target_name = diff.name.as_deref().unwrap_or(&self.record.name);
        let moved = target_parent != self.record.parent_id;
        let renamed = target_name.to_lowercase() != self.record.name.to_lowercase();
        if moved || renamed {
            ensure_unique_name(store, self.kind, target_parent, target_name, Some(self.record.id))
                .await?;
        }

        store.update_node(self.kind, self.record.id, &diff).await?;

        // Re-read the authoritative row so timestamps match storage
        self.record = store
            .fetch_node(self.kind, self.record.id)
            .await?
            .ok_or_else(|| AppError::not_found(self.kind.entity_name(), self.record.id))?;
        self.invalidate();
        Ok(())
    }

    pub async fn rename(&mut self, store: &dyn Storage, name: &str) -> AppResult<()> {
        self.set_attributes(
            store,
            NodeChanges {
                name: Some(name.to_string()),
                ..NodeChanges::default()
            },
        )
        .await
    }

    /// Moves the element below `new_parent_id` (0 = top level).
    pub async fn reparent(&mut self, store: &dyn Storage, new_parent_id: i64) -> AppResult<()> {
        self.set_attributes(
            store,
            NodeChanges {
                parent_id: Some(new_parent_id),
                ..NodeChanges::default()
            },
        )
        .await
    }

    /// Deletes the element. Fails with NotEmpty while children or
    /// dependent records exist.
    pub async fn delete(self, store: &dyn Storage) -> AppResult<()> {
        if self.is_root() {
            return Err(AppError::invalid("the root element cannot be deleted"));
        }
        let id = self.record.id;
        let entity = self.kind.entity_name();

        let children = store
            .count(Table::Nodes(self.kind), Some(Filter::eq(Column::ParentId, id)))
            .await?;
        if children > 0 {
            return Err(AppError::NotEmpty {
                entity,
                id,
                reason: format!("it still has {children} child element(s)"),
            });
        }

        let (table, column, label) = self.kind.dependents();
        let dependents = store.count(table, Some(Filter::eq(column, id))).await?;
        if dependents > 0 {
            return Err(AppError::NotEmpty {
                entity,
                id,
                reason: format!("it is referenced by {dependents} {label}"),
            });
        }

        store.delete_node(self.kind, id).await
    }

    /// CycleError when `new_parent_id` is self or one of self's descendants.
    async fn ensure_not_below_self(&self, store: &dyn Storage, new_parent_id: i64) -> AppResult<()> {
        let cycle = || ValidationError::Cycle {
            entity: self.kind.entity_name(),
            id: self.record.id,
            new_parent_id,
        };
        if new_parent_id == self.record.id {
            return Err(cycle().into());
        }
        if new_parent_id == ROOT_ID {
            return Ok(());
        }
        let Some(parent) = store.fetch_node(self.kind, new_parent_id).await? else {
            return Ok(()); // reported by ensure_parent_exists
        };
        let chain = walk_ancestors(store, self.kind, parent).await?;
        if chain.iter().any(|node| node.id == self.record.id) {
            return Err(cycle().into());
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // PATHS
    // -------------------------------------------------------------------------
    /// Root-to-self chain (virtual root excluded, self included).
    pub async fn ancestors(&mut self, store: &dyn Storage) -> AppResult<Vec<NodeRecord>> {
        if let Some(chain) = self.ancestors.get() {
            return Ok(chain.clone());
        }
        let chain = if self.is_root() {
            Vec::new()
        } else {
            walk_ancestors(store, self.kind, self.record.clone()).await?
        };
        self.ancestors.set(chain.clone());
        Ok(chain)
    }

    /// Number of levels below the virtual root (top-level elements have depth 1).
    pub async fn depth(&mut self, store: &dyn Storage) -> AppResult<usize> {
        Ok(self.ancestors(store).await?.len())
    }

    /// Names from the top-level ancestor down to self, joined by `separator`.
    pub async fn full_path(&mut self, store: &dyn Storage, separator: &str) -> AppResult<String> {
        let chain = self.ancestors(store).await?;
        Ok(chain
            .iter()
            .map(|node| node.name.as_str())
            .collect::<Vec<_>>()
            .join(separator))
    }

    /// Ordered (label, link) pairs for navigation.
    pub async fn breadcrumb(
        &mut self,
        store: &dyn Storage,
        options: &BreadcrumbOptions,
    ) -> AppResult<Vec<BreadcrumbEntry>> {
        let chain = self.ancestors(store).await?;
        let mut entries = Vec::with_capacity(chain.len() + 1);

        if let Some(label) = &options.root_label {
            entries.push(BreadcrumbEntry {
                id: ROOT_ID,
                label: label.clone(),
                link: Some(options.link(ROOT_ID)),
            });
        }

        let last = chain.len().saturating_sub(1);
        for (index, node) in chain.iter().enumerate() {
            let link = if index == last && !options.link_self {
                None
            } else {
                Some(options.link(node.id))
            };
            entries.push(BreadcrumbEntry {
                id: node.id,
                label: node.name.clone(),
                link,
            });
        }
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // SUBTREES
    // -------------------------------------------------------------------------
    /// Direct children, ordered by name (case-insensitive) then id.
    pub async fn children(&self, store: &dyn Storage) -> AppResult<Vec<NodeRecord>> {
        let mut children = store.fetch_children(self.kind, self.record.id).await?;
        children.sort_by_key(sort_key);
        Ok(children)
    }

    /// All descendants in depth-first pre-order, siblings alphabetical.
    pub async fn subtree(
        &self,
        store: &dyn Storage,
        include_self: bool,
    ) -> AppResult<Vec<SubtreeEntry>> {
        let corrupt = || ValidationError::CorruptTree {
            entity: self.kind.entity_name(),
            id: self.record.id,
            max_depth: MAX_TREE_DEPTH,
        };

        let mut result = Vec::new();
        if include_self {
            result.push(SubtreeEntry {
                level: 0,
                node: self.record.clone(),
            });
        }

        let mut visited = HashSet::from([self.record.id]);
        // Stack holds (level, node); children are pushed in reverse so the
        // alphabetically first child is expanded first.
        let mut stack: Vec<(usize, NodeRecord)> = self
            .children(store)
            .await?
            .into_iter()
            .rev()
            .map(|node| (1, node))
            .collect();

        while let Some((level, node)) = stack.pop() {
            if level > MAX_TREE_DEPTH || !visited.insert(node.id) {
                return Err(corrupt().into());
            }
            let mut children = store.fetch_children(self.kind, node.id).await?;
            children.sort_by_key(sort_key);
            stack.extend(children.into_iter().rev().map(|child| (level + 1, child)));
            result.push(SubtreeEntry { level, node });
        }
        Ok(result)
    }

    /// Ids of self and all descendants.
    pub async fn subtree_ids(&self, store: &dyn Storage) -> AppResult<Vec<i64>> {
        Ok(self
            .subtree(store, true)
            .await?
            .into_iter()
            .map(|entry| entry.node.id)
            .collect())
    }

    /// Nested navigation tree of all descendants.
    pub async fn tree_view(
        &self,
        store: &dyn Storage,
        options: &BreadcrumbOptions,
    ) -> AppResult<Vec<TreeNode>> {
        let entries = self.subtree(store, false).await?;

        let mut by_parent: HashMap<i64, Vec<NodeRecord>> = HashMap::new();
        for entry in entries {
            by_parent.entry(entry.node.parent_id).or_default().push(entry.node);
        }

        fn build(
            parent_id: i64,
            by_parent: &HashMap<i64, Vec<NodeRecord>>,
            options: &BreadcrumbOptions,
        ) -> Vec<TreeNode> {
            by_parent
                .get(&parent_id)
                .map(|children| {
                    children
                        .iter()
                        .map(|node| TreeNode {
                            id: node.id,
                            text: node.name.clone(),
                            href: Some(options.link(node.id)),
                            nodes: build(node.id, by_parent, options),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        Ok(build(self.record.id, &by_parent, options))
    }

    // -------------------------------------------------------------------------
    // INHERITED CATEGORY FLAGS
    // -------------------------------------------------------------------------
    /// Does this category (or, with `recursive`, any ancestor) hide footprints?
    pub async fn disable_footprints(
        &mut self,
        store: &dyn Storage,
        recursive: bool,
    ) -> AppResult<bool> {
        self.category_flag(store, recursive, |attrs| attrs.disable_footprints)
            .await
    }

    /// Does this category (or, with `recursive`, any ancestor) hide manufacturers?
    pub async fn disable_manufacturers(
        &mut self,
        store: &dyn Storage,
        recursive: bool,
    ) -> AppResult<bool> {
        self.category_flag(store, recursive, |attrs| attrs.disable_manufacturers)
            .await
    }

    async fn category_flag(
        &mut self,
        store: &dyn Storage,
        recursive: bool,
        flag: impl Fn(&CategoryAttributes) -> bool,
    ) -> AppResult<bool> {
        let check = |node: &NodeRecord| match &node.attributes {
            NodeAttributes::Category(attrs) => flag(attrs),
            _ => false,
        };
        if !recursive {
            return Ok(check(&self.record));
        }
        Ok(self.ancestors(store).await?.iter().any(check))
    }
}

// =============================================================================
// HELPERS
// =============================================================================
/// Walks parent ids from `start` up to the virtual root.
/// Returns the chain root-first; fails on cycles, dangling parents or depth
/// beyond MAX_TREE_DEPTH.
async fn walk_ancestors(
    store: &dyn Storage,
    kind: NodeKind,
    start: NodeRecord,
) -> AppResult<Vec<NodeRecord>> {
    let start_id = start.id;
    let corrupt = || ValidationError::CorruptTree {
        entity: kind.entity_name(),
        id: start_id,
        max_depth: MAX_TREE_DEPTH,
    };

    let mut visited = HashSet::from([start.id]);
    let mut chain = vec![start];

    loop {
        let parent_id = match chain.last() {
            Some(node) => node.parent_id,
            None => break,
        };
        if parent_id == ROOT_ID {
            break;
        }
        if chain.len() >= MAX_TREE_DEPTH || !visited.insert(parent_id) {
            return Err(corrupt().into());
        }
        let parent = store
            .fetch_node(kind, parent_id)
            .await?
            .ok_or_else(corrupt)?;
        chain.push(parent);
    }

    chain.reverse();
    Ok(chain)
}

async fn ensure_parent_exists(store: &dyn Storage, kind: NodeKind, parent_id: i64) -> AppResult<()> {
    if parent_id == ROOT_ID {
        return Ok(());
    }
    if parent_id < 0 || store.fetch_node(kind, parent_id).await?.is_none() {
        return Err(ValidationError::attribute(
            "parent_id",
            format!("{} {} does not exist", kind.entity_name(), parent_id),
        )
        .into());
    }
    Ok(())
}

/// Rejects hanging `height` levels below `parent_id` when the deepest of
/// them would end up beyond MAX_TREE_DEPTH.
async fn ensure_depth_fits(
    store: &dyn Storage,
    kind: NodeKind,
    parent_id: i64,
    height: usize,
) -> AppResult<()> {
    let parent_depth = match store.fetch_node(kind, parent_id).await? {
        Some(parent) if parent_id != ROOT_ID => walk_ancestors(store, kind, parent).await?.len(),
        _ => 0,
    };
    if parent_depth + height > MAX_TREE_DEPTH {
        return Err(ValidationError::attribute(
            "parent_id",
            format!(
                "{} {} is {} levels deep, {} more would exceed {}",
                kind.entity_name(),
                parent_id,
                parent_depth,
                height,
                MAX_TREE_DEPTH
            ),
        )
        .into());
    }
    Ok(())
}

/// A reference from a part or one of its rows to an element of `kind`.
/// `None` means "no reference"; the virtual root is not a real element.
pub async fn ensure_reference_exists(
    store: &dyn Storage,
    kind: NodeKind,
    id: Option<i64>,
) -> AppResult<()> {
    match id {
        Some(id) if id != ROOT_ID => {
            if id < 0 || store.fetch_node(kind, id).await?.is_none() {
                return Err(ValidationError::attribute(
                    "reference",
                    format!("{} {} does not exist", kind.entity_name(), id),
                )
                .into());
            }
            Ok(())
        }
        Some(_) => Err(ValidationError::attribute(
            "reference",
            format!("the {} root cannot be referenced", kind.entity_name()),
        )
        .into()),
        None => Ok(()),
    }
}

async fn ensure_unique_name(
    store: &dyn Storage,
    kind: NodeKind,
    parent_id: i64,
    name: &str,
    except_id: Option<i64>,
) -> AppResult<()> {
    let lowered = name.to_lowercase();
    let siblings = store.fetch_children(kind, parent_id).await?;
    let taken = siblings
        .iter()
        .filter(|sibling| Some(sibling.id) != except_id)
        .any(|sibling| sibling.name.to_lowercase() == lowered);
    if taken {
        return Err(ValidationError::DuplicateName {
            name: name.to_string(),
            parent_id,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::part::{NewPart, Part};
    use crate::error::ErrorKind;
    use crate::store::MemoryStorage;
    use proptest::prelude::*;

    async fn add(store: &MemoryStorage, kind: NodeKind, parent: i64, name: &str) -> StructuralElement {
        StructuralElement::create(store, kind, NewNode::new(parent, name))
            .await
            .expect("create element")
    }

    /// Electronics → Passive → Resistors, Electronics → Passive → Capacitors,
    /// Electronics → Active
    async fn sample_tree(store: &MemoryStorage) -> (i64, i64, i64, i64, i64) {
        let electronics = add(store, NodeKind::Category, 0, "Electronics").await.id();
        let passive = add(store, NodeKind::Category, electronics, "Passive").await.id();
        let resistors = add(store, NodeKind::Category, passive, "Resistors").await.id();
        let capacitors = add(store, NodeKind::Category, passive, "Capacitors").await.id();
        let active = add(store, NodeKind::Category, electronics, "Active").await.id();
        (electronics, passive, resistors, capacitors, active)
    }

    #[tokio::test]
    async fn test_full_path_and_depth() {
        let store = MemoryStorage::new();
        let (_, _, resistors, _, _) = sample_tree(&store).await;

        let mut element = StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .unwrap();
        assert_eq!(
            element.full_path(&store, DEFAULT_PATH_SEPARATOR).await.unwrap(),
            "Electronics → Passive → Resistors"
        );
        assert_eq!(element.full_path(&store, "/").await.unwrap(), "Electronics/Passive/Resistors");
        assert_eq!(element.depth(&store).await.unwrap(), 3);

        let mut root = StructuralElement::load(&store, NodeKind::Category, ROOT_ID)
            .await
            .unwrap();
        assert!(root.is_root());
        assert_eq!(root.full_path(&store, "/").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemoryStorage::new();
        let err = StructuralElement::load(&store, NodeKind::Footprint, 99)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_breadcrumb_links() {
        let store = MemoryStorage::new();
        let (electronics, passive, resistors, _, _) = sample_tree(&store).await;
        let mut element = StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .unwrap();

        let mut options = BreadcrumbOptions::new("show_category_parts", "cid");
        options.root_label = Some("Categories".into());
        options.link_self = false;

        let crumbs = element.breadcrumb(&store, &options).await.unwrap();
        let labels: Vec<_> = crumbs.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Categories", "Electronics", "Passive", "Resistors"]);
        assert_eq!(crumbs[0].link.as_deref(), Some("show_category_parts?cid=0"));
        assert_eq!(
            crumbs[1].link,
            Some(format!("show_category_parts?cid={electronics}"))
        );
        assert_eq!(crumbs[2].link, Some(format!("show_category_parts?cid={passive}")));
        assert_eq!(crumbs[3].link, None);
    }

    #[tokio::test]
    async fn test_subtree_is_alphabetical_depth_first() {
        let store = MemoryStorage::new();
        let (electronics, ..) = sample_tree(&store).await;
        let element = StructuralElement::load(&store, NodeKind::Category, electronics)
            .await
            .unwrap();

        let names: Vec<_> = element
            .subtree(&store, true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.level, e.node.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (0, "Electronics".to_string()),
                (1, "Active".to_string()),
                (1, "Passive".to_string()),
                (2, "Capacitors".to_string()),
                (2, "Resistors".to_string()),
            ]
        );

        let without_self = element.subtree(&store, false).await.unwrap();
        assert_eq!(without_self.len(), 4);
    }

    #[tokio::test]
    async fn test_tree_view_nests_children() {
        let store = MemoryStorage::new();
        sample_tree(&store).await;
        let root = StructuralElement::root(NodeKind::Category);

        let tree = root
            .tree_view(&store, &BreadcrumbOptions::for_kind(NodeKind::Category))
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].text, "Electronics");
        let second_level: Vec<_> = tree[0].nodes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(second_level, ["Active", "Passive"]);
        assert_eq!(tree[0].nodes[1].nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_sibling_name_is_case_insensitive() {
        let store = MemoryStorage::new();
        let (electronics, ..) = sample_tree(&store).await;

        let err = StructuralElement::create(&store, NodeKind::Category, NewNode::new(electronics, "passive"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::DuplicateName { .. })
        ));

        // Same name under another parent is fine
        add(&store, NodeKind::Category, 0, "Passive").await;
    }

    #[tokio::test]
    async fn test_reparent_into_own_subtree_fails() {
        let store = MemoryStorage::new();
        let (electronics, passive, resistors, _, active) = sample_tree(&store).await;
        let mut element = StructuralElement::load(&store, NodeKind::Category, electronics)
            .await
            .unwrap();

        for target in [electronics, passive, resistors, active] {
            let err = element.reparent(&store, target).await.unwrap_err();
            assert!(
                matches!(err.validation(), Some(ValidationError::Cycle { .. })),
                "moving below {target} must fail"
            );
        }
        assert_eq!(element.parent_id(), ROOT_ID);
    }

    /// Chain of `levels` nested categories; returns their ids top-down.
    async fn chain(store: &MemoryStorage, levels: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(levels);
        let mut parent = ROOT_ID;
        for level in 1..=levels {
            parent = add(store, NodeKind::Category, parent, &format!("Level {level}")).await.id();
            ids.push(parent);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_refuses_level_beyond_max_depth() {
        let store = MemoryStorage::new();
        let ids = chain(&store, MAX_TREE_DEPTH).await;
        let deepest = *ids.last().unwrap();

        let err = StructuralElement::create(&store, NodeKind::Category, NewNode::new(deepest, "Too deep"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.fetch_children(NodeKind::Category, deepest).await.unwrap().is_empty());

        let mut leaf = StructuralElement::load(&store, NodeKind::Category, deepest)
            .await
            .unwrap();
        assert_eq!(leaf.depth(&store).await.unwrap(), MAX_TREE_DEPTH);
        assert!(leaf.full_path(&store, "/").await.unwrap().ends_with("Level 64"));
    }

    #[tokio::test]
    async fn test_reparent_refuses_subtree_beyond_max_depth() {
        let store = MemoryStorage::new();
        let ids = chain(&store, MAX_TREE_DEPTH - 1).await;
        let top = add(&store, NodeKind::Category, ROOT_ID, "Loose").await.id();
        add(&store, NodeKind::Category, top, "Loose child").await;

        let mut moving = StructuralElement::load(&store, NodeKind::Category, top)
            .await
            .unwrap();
        let err = moving
            .reparent(&store, ids[MAX_TREE_DEPTH - 2])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(moving.parent_id(), ROOT_ID);

        moving.reparent(&store, ids[MAX_TREE_DEPTH - 3]).await.unwrap();
        assert_eq!(moving.depth(&store).await.unwrap(), MAX_TREE_DEPTH - 1);
    }

    #[tokio::test]
    async fn test_reparent_checks_target_siblings() {
        let store = MemoryStorage::new();
        let (electronics, _, resistors, _, active) = sample_tree(&store).await;
        add(&store, NodeKind::Category, active, "Resistors").await;

        let mut element = StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .unwrap();
        let err = element.reparent(&store, active).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::DuplicateName { .. })
        ));

        element.reparent(&store, electronics).await.unwrap();
        assert_eq!(element.parent_id(), electronics);
        assert_eq!(
            element.full_path(&store, "/").await.unwrap(),
            "Electronics/Resistors"
        );
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let store = MemoryStorage::new();
        let (electronics, passive, ..) = sample_tree(&store).await;
        let mut element = StructuralElement::load(&store, NodeKind::Category, electronics)
            .await
            .unwrap();

        // Valid rename combined with an invalid move: nothing may change
        let err = element
            .set_attributes(
                &store,
                NodeChanges {
                    name: Some("Parts".into()),
                    parent_id: Some(passive),
                    ..NodeChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let reloaded = StructuralElement::load(&store, NodeKind::Category, electronics)
            .await
            .unwrap();
        assert_eq!(reloaded.name(), "Electronics");
        assert_eq!(element.name(), "Electronics");
    }

    #[tokio::test]
    async fn test_rename_rejects_blank_and_wrong_attributes() {
        let store = MemoryStorage::new();
        let mut element = add(&store, NodeKind::StoreLocation, 0, "Shelf A").await;

        let err = element.rename(&store, "   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = element
            .set_attributes(
                &store,
                NodeChanges {
                    attributes: Some(NodeAttributes::Plain),
                    ..NodeChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        element.rename(&store, "Shelf B").await.unwrap();
        assert_eq!(element.name(), "Shelf B");
    }

    #[tokio::test]
    async fn test_delete_blocked_by_children_and_parts() {
        let store = MemoryStorage::new();
        let (_, passive, resistors, ..) = sample_tree(&store).await;

        let element = StructuralElement::load(&store, NodeKind::Category, passive)
            .await
            .unwrap();
        let err = element.delete(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEmpty);

        let mut new_part = NewPart::named("10k resistor");
        new_part.category_id = Some(resistors);
        let part = Part::create(&store, new_part).await.unwrap();

        let element = StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .unwrap();
        let err = element.delete(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEmpty);

        part.delete(&store).await.unwrap();
        let element = StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .unwrap();
        element.delete(&store).await.unwrap();
        assert!(StructuralElement::load(&store, NodeKind::Category, resistors)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_root_cannot_be_changed() {
        let store = MemoryStorage::new();
        let mut root = StructuralElement::root(NodeKind::Device);
        assert_eq!(
            root.rename(&store, "x").await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            root.delete(&store).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_corrupted_cycle_is_rejected() {
        let store = MemoryStorage::new();
        let a = add(&store, NodeKind::Footprint, 0, "A").await.id();
        let b = add(&store, NodeKind::Footprint, a, "B").await.id();
        // Bypass validation to corrupt the data: A's parent becomes B
        store
            .update_node(
                NodeKind::Footprint,
                a,
                &NodeChanges {
                    parent_id: Some(b),
                    ..NodeChanges::default()
                },
            )
            .await
            .unwrap();

        let mut element = StructuralElement::load(&store, NodeKind::Footprint, b)
            .await
            .unwrap();
        let err = element.full_path(&store, "/").await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::CorruptTree { .. })
        ));
    }

    #[tokio::test]
    async fn test_inherited_category_flags() {
        let store = MemoryStorage::new();
        let parent = StructuralElement::create(
            &store,
            NodeKind::Category,
            NewNode {
                parent_id: 0,
                name: "Mechanical".into(),
                comment: String::new(),
                attributes: Some(NodeAttributes::Category(CategoryAttributes {
                    disable_footprints: true,
                    ..CategoryAttributes::default()
                })),
            },
        )
        .await
        .unwrap();
        let mut child = add(&store, NodeKind::Category, parent.id(), "Screws").await;

        assert!(!child.disable_footprints(&store, false).await.unwrap());
        assert!(child.disable_footprints(&store, true).await.unwrap());
        assert!(!child.disable_manufacturers(&store, true).await.unwrap());
    }

    // -------------------------------------------------------------------------
    // PROPERTIES
    // -------------------------------------------------------------------------
    // A random forest is described by, for each new node, the index of its
    // parent among the previously created nodes (or None for top level).
    fn forest() -> impl Strategy<Value = Vec<Option<prop::sample::Index>>> {
        prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), 1..20)
    }

    async fn build_forest(store: &MemoryStorage, shape: &[Option<prop::sample::Index>]) -> Vec<(i64, usize)> {
        let mut nodes: Vec<(i64, usize)> = Vec::new();
        for (i, parent) in shape.iter().enumerate() {
            let (parent_id, depth) = match parent {
                Some(index) if !nodes.is_empty() => {
                    let (id, depth) = nodes[index.index(nodes.len())];
                    (id, depth + 1)
                }
                _ => (ROOT_ID, 1),
            };
            let node = add(store, NodeKind::Device, parent_id, &format!("node-{i}")).await;
            nodes.push((node.id(), depth));
        }
        nodes
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_full_path_length_equals_depth(shape in forest()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStorage::new();
                for (id, depth) in build_forest(&store, &shape).await {
                    let mut element = StructuralElement::load(&store, NodeKind::Device, id).await.unwrap();
                    let path = element.full_path(&store, "/").await.unwrap();
                    assert_eq!(path.split('/').count(), depth);
                }
            });
        }

        #[test]
        fn prop_reparent_into_subtree_always_cycles(shape in forest()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStorage::new();
                let nodes = build_forest(&store, &shape).await;
                let (first, _) = nodes[0];
                let mut element = StructuralElement::load(&store, NodeKind::Device, first).await.unwrap();
                for target in element.subtree_ids(&store).await.unwrap() {
                    let err = element.reparent(&store, target).await.unwrap_err();
                    assert!(matches!(err.validation(), Some(ValidationError::Cycle { .. })));
                }
            });
        }
    }
}

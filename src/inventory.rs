// =============================================================================
// INVENTORY OPERATIONS
// =============================================================================
// The controller layer between HTTP handlers and the entities: every
// operation takes the acting principal, checks its permissions and then
// drives the entities.
//
// NOTES:
// - Permission checks come first; a denied call touches nothing
// - View-models are built from freshly loaded entities on every call
// - Stock metrics are recorded here, entities stay free of side effects
// =============================================================================

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::Config;
use crate::entity::attachment::AttachmentRecord;
use crate::entity::part::{NewPart, Part, PartChanges, PartRecord, Stock};
use crate::entity::structural::{
    BreadcrumbOptions, NewNode, NodeAttributes, NodeChanges, NodeKind, NodeRecord,
    StructuralElement, SubtreeEntry, TreeNode,
};
use crate::entity::user::Principal;
use crate::entity::{Entity, ROOT_ID};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    AttachmentGroupView, AttachmentView, DeviceUsageView, NodeView, OrderDetailView,
    PartAction, PartDetailView, PartPermissionsView, PriceView, SectionVisibility,
    StatisticsResponse, StructuralRefView,
};
use crate::permission::{Operation, PermissionManager, Resource};
use crate::placeholder::{expand_placeholders, PlaceholderContext};
use crate::store::{Storage, Table};
use crate::util::{format_price, parse_barcode};

/// Quantity the average price refers to in views and placeholders
const REFERENCE_QUANTITY: u32 = 1;

/// Replaced by the part name in a manufacturer's product URL template
const PART_NUMBER_TOKEN: &str = "%PARTNUMBER%";

// =============================================================================
// PART DETAIL VIEW
// =============================================================================

pub async fn part_detail(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    part_id: i64,
) -> AppResult<PartDetailView> {
    PermissionManager::require(principal, Resource::Parts, Operation::Read)?;
    let mut part = Part::load(store, part_id).await?;
    build_detail(store, config, principal, &mut part).await
}

/// Looks a part up by its printed 7/8 digit label.
pub async fn part_by_barcode(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    code: &str,
) -> AppResult<PartDetailView> {
    let part_id = parse_barcode(code)?;
    part_detail(store, config, principal, part_id).await
}

async fn build_detail(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    part: &mut Part,
) -> AppResult<PartDetailView> {
    let features = &config.features;
    let sep = config.path_separator.as_str();

    // ----- structural references -----
    let mut category = part.reference(store, NodeKind::Category).await?;
    let (footprint_hidden, manufacturer_hidden) = match category.as_mut() {
        Some(category) => (
            category.disable_footprints(store, true).await?,
            category.disable_manufacturers(store, true).await?,
        ),
        None => (false, false),
    };
    let manufacturer = part.reference(store, NodeKind::Manufacturer).await?;
    let manufacturer_product_url = product_url(part.record(), manufacturer.as_ref());

    let category = structural_ref(store, sep, category).await?;
    let footprint =
        structural_ref(store, sep, part.reference(store, NodeKind::Footprint).await?).await?;
    let storelocation =
        structural_ref(store, sep, part.reference(store, NodeKind::StoreLocation).await?).await?;
    let manufacturer = structural_ref(store, sep, manufacturer).await?;

    // ----- order details and prices -----
    let currency = Some(config.currency_symbol.as_str());
    let details = part.orderdetails(store).await?.to_vec();
    let mut orderdetails = Vec::with_capacity(details.len());
    for detail in details {
        let mut supplier =
            StructuralElement::load(store, NodeKind::Supplier, detail.record.supplier_id).await?;
        orderdetails.push(OrderDetailView {
            id: detail.record.id,
            supplier_id: detail.record.supplier_id,
            supplier_full_path: supplier.full_path(store, sep).await?,
            supplierpartnr: detail.record.supplierpartnr.clone(),
            supplier_product_url: detail.record.supplier_product_url.clone(),
            obsolete: detail.record.obsolete,
            prices: detail
                .pricedetails
                .iter()
                .map(|price| PriceView {
                    min_discount_quantity: price.min_discount_quantity,
                    price_related_quantity: price.price_related_quantity,
                    price: format_price(Some(price.price), currency),
                    single_price: format_price(Some(price.unit_price()), currency),
                })
                .collect(),
        });
    }
    let average_price = part
        .get_average_price(store, REFERENCE_QUANTITY)
        .await?
        .filter(|price| *price > Decimal::ZERO)
        .map(|price| format_price(Some(price), currency));

    // ----- attachments, grouped by type -----
    let attachments = part.attachments(store).await?.to_vec();
    let attachment_groups = group_attachments(store, sep, attachments).await?;

    // ----- devices -----
    let device_parts = part.device_parts(store).await?.to_vec();
    let mut devices = Vec::with_capacity(device_parts.len());
    for device_part in device_parts {
        let mut device =
            StructuralElement::load(store, NodeKind::Device, device_part.record.device_id).await?;
        devices.push(DeviceUsageView {
            device_id: device.id(),
            name: device.name().to_string(),
            full_path: device.full_path(store, sep).await?,
            mount_quantity: device_part.record.quantity,
            mount_names: device_part.record.mount_names.clone(),
        });
    }

    let can = |resource, operation| PermissionManager::can(principal, resource, operation);
    let permissions = PartPermissionsView {
        can_edit: can(Resource::Parts, Operation::Edit),
        can_delete: can(Resource::Parts, Operation::Delete),
        can_move: can(Resource::Parts, Operation::Move),
        can_instock: can(Resource::PartsInstock, Operation::Edit),
        can_order: can(Resource::PartsOrder, Operation::Edit),
        can_orderdetails: can(Resource::PartsOrderdetails, Operation::Read),
        can_attachments: can(Resource::PartsAttachments, Operation::Read),
        can_devices: can(Resource::DeviceParts, Operation::Read),
    };

    let sections = SectionVisibility {
        footprint: !features.footprints_disabled && !footprint_hidden,
        manufacturer: !features.manufacturers_disabled && !manufacturer_hidden,
        orderdetails: !features.suppliers_disabled
            && !(features.hide_empty_orderdetails && orderdetails.is_empty()),
        attachments: !(features.hide_empty_attachments && attachment_groups.is_empty()),
        devices: !features.devices_disabled,
        actions: !features.hide_actions,
    };

    let auto_order = part.get_auto_order(features);
    let manual_order_exists = part.manual_order_exists();
    let record = part.record();

    Ok(PartDetailView {
        id: record.id,
        name: record.name.clone(),
        description: record.description.clone(),
        comment: record.comment.clone(),
        visible: record.visible,
        instock: record.instock,
        instock_text: record.instock.to_string(),
        instock_unknown: record.instock.is_unknown(),
        mininstock: record.mininstock,
        auto_order,
        manual_order: record.manual_order,
        manual_order_exists,
        order_quantity: record.order_quantity,
        category,
        footprint,
        storelocation,
        manufacturer,
        manufacturer_product_url,
        datetime_added: record.datetime_added,
        last_modified: record.last_modified,
        orderdetails,
        average_price,
        attachment_groups,
        devices,
        permissions,
        sections,
    })
}

async fn structural_ref(
    store: &dyn Storage,
    separator: &str,
    element: Option<StructuralElement>,
) -> AppResult<Option<StructuralRefView>> {
    let Some(mut element) = element else {
        return Ok(None);
    };
    let options = BreadcrumbOptions::for_kind(element.kind());
    Ok(Some(StructuralRefView {
        id: element.id(),
        name: element.name().to_string(),
        full_path: element.full_path(store, separator).await?,
        breadcrumb: element.breadcrumb(store, &options).await?,
    }))
}

/// The part's own product URL, else the manufacturer's template with the
/// part name filled in.
fn product_url(record: &PartRecord, manufacturer: Option<&StructuralElement>) -> String {
    if !record.manufacturer_product_url.is_empty() {
        return record.manufacturer_product_url.clone();
    }
    match manufacturer.map(StructuralElement::attributes) {
        Some(NodeAttributes::Company(company)) if !company.auto_product_url.is_empty() => company
            .auto_product_url
            .replace(PART_NUMBER_TOKEN, &record.name),
        _ => String::new(),
    }
}

async fn group_attachments(
    store: &dyn Storage,
    separator: &str,
    attachments: Vec<AttachmentRecord>,
) -> AppResult<Vec<AttachmentGroupView>> {
    let mut by_type: BTreeMap<i64, Vec<AttachmentRecord>> = BTreeMap::new();
    for attachment in attachments {
        by_type.entry(attachment.type_id).or_default().push(attachment);
    }

    let mut groups = Vec::with_capacity(by_type.len());
    for (type_id, records) in by_type {
        let mut attachment_type =
            StructuralElement::load(store, NodeKind::AttachmentType, type_id).await?;
        groups.push(AttachmentGroupView {
            type_id,
            type_full_path: attachment_type.full_path(store, separator).await?,
            attachments: records
                .iter()
                .map(|a| AttachmentView {
                    id: a.id,
                    name: a.name.clone(),
                    filename: a.filename.clone(),
                    is_picture: a.is_picture(),
                    show_in_table: a.show_in_table,
                })
                .collect(),
        });
    }
    groups.sort_by(|a, b| a.type_full_path.to_lowercase().cmp(&b.type_full_path.to_lowercase()));
    Ok(groups)
}

// =============================================================================
// PART MUTATIONS
// =============================================================================

pub async fn create_part(
    store: &dyn Storage,
    principal: &Principal,
    new: NewPart,
) -> AppResult<PartRecord> {
    PermissionManager::require(principal, Resource::Parts, Operation::Create)?;
    let part = Part::create(store, new).await?;
    Ok(part.record().clone())
}

/// Applies a batch of attribute changes. Besides `Parts/Edit`, each touched
/// field needs its own edit right, and a category change needs `Parts/Move`.
pub async fn update_part(
    store: &dyn Storage,
    principal: &Principal,
    part_id: i64,
    changes: PartChanges,
) -> AppResult<PartRecord> {
    PermissionManager::require(principal, Resource::Parts, Operation::Edit)?;
    let mut part = Part::load(store, part_id).await?;

    let field_rights = [
        (changes.name.is_some(), Resource::PartsName),
        (changes.description.is_some(), Resource::PartsDescription),
        (changes.comment.is_some(), Resource::PartsComment),
        (changes.mininstock.is_some(), Resource::PartsMininstock),
        (changes.footprint_id.is_some(), Resource::PartsFootprint),
    ];
    for (touched, resource) in field_rights {
        if touched {
            PermissionManager::require(principal, resource, Operation::Edit)?;
        }
    }
    if let Some(category_id) = changes.category_id {
        if category_id != part.record().category_id {
            PermissionManager::require(principal, Resource::Parts, Operation::Move)?;
        }
    }

    part.set_attributes(store, changes).await?;
    Ok(part.record().clone())
}

pub async fn delete_part(store: &dyn Storage, principal: &Principal, part_id: i64) -> AppResult<()> {
    PermissionManager::require(principal, Resource::Parts, Operation::Delete)?;
    Part::load(store, part_id).await?.delete(store).await
}

/// Changes the stock by `delta`.
pub async fn adjust_stock(
    store: &dyn Storage,
    principal: &Principal,
    part_id: i64,
    delta: i64,
) -> AppResult<PartRecord> {
    PermissionManager::require(principal, Resource::PartsInstock, Operation::Edit)?;
    let mut part = Part::load(store, part_id).await?;
    let kind = if delta < 0 { "decrease" } else { "increase" };

    let result = part.adjust_stock(store, delta).await;
    metrics::record_stock_adjustment(kind, result.is_ok());
    result?;

    report_stock_level(&part);
    Ok(part.record().clone())
}

/// Sets the stock to an absolute value (inventory count) or to unknown.
pub async fn set_stock(
    store: &dyn Storage,
    principal: &Principal,
    part_id: i64,
    instock: Stock,
) -> AppResult<PartRecord> {
    PermissionManager::require(principal, Resource::PartsInstock, Operation::Edit)?;
    let mut part = Part::load(store, part_id).await?;

    let result = match instock {
        Stock::Known(count) => part.set_instock(store, i64::from(count)).await,
        Stock::Unknown => part.set_instock_unknown(store).await,
    };
    metrics::record_stock_adjustment("set", result.is_ok());
    result?;

    report_stock_level(&part);
    Ok(part.record().clone())
}

fn report_stock_level(part: &Part) {
    if let Stock::Known(level) = part.instock() {
        metrics::set_stock_level(part.id(), level);
    }
}

/// Runs one action of the part detail page.
pub async fn apply_action(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    part_id: i64,
    action: PartAction,
) -> AppResult<PartRecord> {
    match action {
        PartAction::Decrease { amount } => {
            let amount = positive("amount", amount)?;
            adjust_stock(store, principal, part_id, -amount).await
        }
        PartAction::Increase { amount } => {
            let amount = positive("amount", amount)?;
            adjust_stock(store, principal, part_id, amount).await
        }
        PartAction::Order { quantity } => {
            PermissionManager::require(principal, Resource::PartsOrder, Operation::Edit)?;
            let mut part = Part::load(store, part_id).await?;
            part.set_manual_order(store, true, quantity).await?;
            Ok(part.record().clone())
        }
        PartAction::Unorder => {
            PermissionManager::require(principal, Resource::PartsOrder, Operation::Edit)?;
            let mut part = Part::load(store, part_id).await?;
            part.set_manual_order(store, false, 0).await?;
            Ok(part.record().clone())
        }
        PartAction::AddToDevice {
            device_id,
            quantity,
            mount_names,
        } => {
            if config.features.devices_disabled {
                return Err(AppError::invalid("devices are disabled"));
            }
            PermissionManager::require(principal, Resource::DeviceParts, Operation::Create)?;
            let mut part = Part::load(store, part_id).await?;
            part.attach_to_device(store, device_id, quantity, &mount_names)
                .await?;
            Ok(part.record().clone())
        }
    }
}

fn positive(field: &str, value: i64) -> AppResult<i64> {
    if value <= 0 {
        return Err(AppError::invalid(format!("{field} must be positive, got {value}")));
    }
    Ok(value)
}

// =============================================================================
// PLACEHOLDERS
// =============================================================================

/// Expands a label template with the values of one part.
pub async fn expand_for_part(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    part_id: i64,
    template: &str,
) -> AppResult<String> {
    PermissionManager::require(principal, Resource::Parts, Operation::Read)?;
    let mut part = Part::load(store, part_id).await?;
    let context = placeholder_context(store, config, &mut part).await?;
    Ok(expand_placeholders(template, &context))
}

async fn placeholder_context(
    store: &dyn Storage,
    config: &Config,
    part: &mut Part,
) -> AppResult<PlaceholderContext> {
    let sep = config.path_separator.as_str();

    let (category, category_full) =
        name_and_path(store, sep, part.reference(store, NodeKind::Category).await?).await?;
    let (footprint, footprint_full) =
        name_and_path(store, sep, part.reference(store, NodeKind::Footprint).await?).await?;
    let (storelocation, storelocation_full) =
        name_and_path(store, sep, part.reference(store, NodeKind::StoreLocation).await?).await?;
    let manufacturer = part
        .reference(store, NodeKind::Manufacturer)
        .await?
        .map(|m| m.name().to_string())
        .unwrap_or_default();

    let first_detail = part.orderdetails(store).await?.first().cloned();
    let (supplier, order_nr) = match first_detail {
        Some(detail) => {
            let supplier =
                StructuralElement::load(store, NodeKind::Supplier, detail.record.supplier_id)
                    .await?;
            (supplier.name().to_string(), detail.record.supplierpartnr)
        }
        None => (String::new(), String::new()),
    };

    let average_price = match part.get_average_price(store, REFERENCE_QUANTITY).await? {
        Some(price) => format_price(Some(price), None),
        None => String::new(),
    };

    let record = part.record();
    Ok(PlaceholderContext {
        id: record.id,
        name: record.name.clone(),
        description: record.description.clone(),
        comment: record.comment.clone(),
        mininstock: record.mininstock,
        instock: record.instock.to_string(),
        average_price,
        category,
        category_full,
        footprint,
        footprint_full,
        manufacturer,
        supplier,
        order_nr,
        storelocation,
        storelocation_full,
    })
}

/// (name, full path), both empty for an absent reference
async fn name_and_path(
    store: &dyn Storage,
    separator: &str,
    element: Option<StructuralElement>,
) -> AppResult<(String, String)> {
    match element {
        Some(mut element) => {
            let full_path = element.full_path(store, separator).await?;
            Ok((element.name().to_string(), full_path))
        }
        None => Ok((String::new(), String::new())),
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

pub async fn statistics(store: &dyn Storage, principal: &Principal) -> AppResult<StatisticsResponse> {
    PermissionManager::require(principal, Resource::Parts, Operation::Read)?;

    let tables = [Table::Parts, Table::OrderDetails, Table::Attachments, Table::DeviceParts]
        .into_iter()
        .chain(NodeKind::ALL.into_iter().map(Table::Nodes));

    let mut counts = BTreeMap::new();
    for table in tables {
        counts.insert(table.name().to_string(), store.count(table, None).await?);
    }
    Ok(StatisticsResponse { counts })
}

// =============================================================================
// STRUCTURAL TREES
// =============================================================================

/// Navigation tree of a whole kind.
pub async fn tree(
    store: &dyn Storage,
    principal: &Principal,
    kind: NodeKind,
) -> AppResult<Vec<TreeNode>> {
    PermissionManager::require(principal, kind.resource(), Operation::Read)?;
    StructuralElement::root(kind)
        .tree_view(store, &BreadcrumbOptions::for_kind(kind))
        .await
}

pub async fn node_view(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    kind: NodeKind,
    id: i64,
) -> AppResult<NodeView> {
    PermissionManager::require(principal, kind.resource(), Operation::Read)?;
    let element = StructuralElement::load(store, kind, id).await?;
    describe_node(store, config, element).await
}

pub async fn subtree(
    store: &dyn Storage,
    principal: &Principal,
    kind: NodeKind,
    id: i64,
    include_self: bool,
) -> AppResult<Vec<SubtreeEntry>> {
    PermissionManager::require(principal, kind.resource(), Operation::Read)?;
    StructuralElement::load(store, kind, id)
        .await?
        .subtree(store, include_self)
        .await
}

pub async fn create_node(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    kind: NodeKind,
    new: NewNode,
) -> AppResult<NodeView> {
    PermissionManager::require(principal, kind.resource(), Operation::Create)?;
    let element = StructuralElement::create(store, kind, new).await?;
    describe_node(store, config, element).await
}

/// Attribute changes need Edit; a parent change needs Move as well.
pub async fn update_node(
    store: &dyn Storage,
    config: &Config,
    principal: &Principal,
    kind: NodeKind,
    id: i64,
    changes: NodeChanges,
) -> AppResult<NodeView> {
    PermissionManager::require(principal, kind.resource(), Operation::Edit)?;
    let mut element = StructuralElement::load(store, kind, id).await?;
    if changes
        .parent_id
        .is_some_and(|parent| parent != element.parent_id())
    {
        PermissionManager::require(principal, kind.resource(), Operation::Move)?;
    }
    element.set_attributes(store, changes).await?;
    describe_node(store, config, element).await
}

pub async fn delete_node(
    store: &dyn Storage,
    principal: &Principal,
    kind: NodeKind,
    id: i64,
) -> AppResult<()> {
    PermissionManager::require(principal, kind.resource(), Operation::Delete)?;
    if id == ROOT_ID {
        return Err(AppError::invalid("the root element cannot be deleted"));
    }
    StructuralElement::load(store, kind, id).await?.delete(store).await
}

async fn describe_node(
    store: &dyn Storage,
    config: &Config,
    mut element: StructuralElement,
) -> AppResult<NodeView> {
    let options = BreadcrumbOptions::for_kind(element.kind());
    let full_path = element.full_path(store, &config.path_separator).await?;
    let breadcrumb = element.breadcrumb(store, &options).await?;
    let record: NodeRecord = element.into_record();
    Ok(NodeView {
        record,
        full_path,
        breadcrumb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ValidationError};
    use crate::store::MemoryStorage;

    const ADMIN: i64 = 1;
    const GUEST: i64 = 2;
    const RESISTOR: i64 = 1;
    const LED: i64 = 2;
    const CERAMIC: i64 = 3;

    async fn principal(store: &MemoryStorage, user_id: i64) -> Principal {
        Principal::load(store, user_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_part_detail_view() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let view = part_detail(&store, &config, &admin, LED).await.unwrap();
        assert_eq!(view.name, "L-53HD");
        assert_eq!(view.instock_text, "3");
        assert!(view.auto_order);
        assert!(!view.manual_order_exists);
        assert_eq!(
            view.category.as_ref().unwrap().full_path,
            "Electronics → Semiconductors → LEDs"
        );
        assert_eq!(view.category.as_ref().unwrap().breadcrumb.len(), 3);
        assert_eq!(view.storelocation.as_ref().unwrap().name, "Drawer 1");
        assert_eq!(view.orderdetails.len(), 2);
        assert_eq!(view.orderdetails[1].supplier_full_path, "Mouser");
        assert_eq!(view.orderdetails[0].prices[0].single_price, "0.08 €");
        assert_eq!(view.average_price.as_deref(), Some("0.10 €"));
        assert_eq!(view.permissions, PartPermissionsView {
            can_edit: true,
            can_delete: true,
            can_move: true,
            can_instock: true,
            can_order: true,
            can_orderdetails: true,
            can_attachments: true,
            can_devices: true,
        });
        assert!(view.sections.footprint && view.sections.devices && view.sections.actions);
    }

    #[tokio::test]
    async fn test_detail_unknown_stock_and_product_url() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let ceramic = part_detail(&store, &config, &admin, CERAMIC).await.unwrap();
        assert!(ceramic.instock_unknown);
        assert_eq!(ceramic.instock_text, "?");
        assert!(!ceramic.auto_order);
        assert_eq!(ceramic.average_price, None);
        assert!(ceramic.manufacturer.is_none());

        let resistor = part_detail(&store, &config, &admin, RESISTOR).await.unwrap();
        assert_eq!(
            resistor.manufacturer_product_url,
            "https://www.yageo.com/search?q=RC0805FR-0710KL"
        );
    }

    #[tokio::test]
    async fn test_feature_toggles_hide_sections() {
        let store = MemoryStorage::seeded();
        let mut config = Config::default();
        config.features.devices_disabled = true;
        config.features.hide_empty_attachments = true;
        config.features.auto_order = false;
        let admin = principal(&store, ADMIN).await;

        let view = part_detail(&store, &config, &admin, LED).await.unwrap();
        assert!(!view.sections.devices);
        assert!(!view.sections.attachments);
        assert!(view.sections.orderdetails);
        assert!(!view.auto_order);

        let err = apply_action(
            &store,
            &config,
            &admin,
            LED,
            PartAction::AddToDevice {
                device_id: 1,
                quantity: 1,
                mount_names: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_barcode_lookup() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let view = part_by_barcode(&store, &config, &admin, "00000029").await.unwrap();
        assert_eq!(view.id, LED);
        let err = part_by_barcode(&store, &config, &admin, "0000099").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = part_by_barcode(&store, &config, &admin, "abc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_guest_can_read_but_not_change_stock() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let guest = principal(&store, GUEST).await;

        let view = part_detail(&store, &config, &guest, LED).await.unwrap();
        assert!(!view.permissions.can_instock);
        assert!(view.permissions.can_orderdetails);

        let err = adjust_stock(&store, &guest, LED, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(Part::load(&store, LED).await.unwrap().instock(), Stock::Known(3));

        let err = delete_part(&store, &guest, LED).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_stock_actions() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let err = apply_action(&store, &config, &admin, LED, PartAction::Decrease { amount: 0 })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = apply_action(&store, &config, &admin, LED, PartAction::Decrease { amount: 5 })
            .await
            .unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::NegativeStock { .. })));

        let record = apply_action(&store, &config, &admin, LED, PartAction::Increase { amount: 7 })
            .await
            .unwrap();
        assert_eq!(record.instock, Stock::Known(10));

        let record = set_stock(&store, &admin, LED, Stock::Unknown).await.unwrap();
        assert_eq!(record.instock, Stock::Unknown);
        let err = adjust_stock(&store, &admin, LED, -1).await.unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::UnknownStock { .. })));
    }

    #[tokio::test]
    async fn test_order_and_device_actions() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let record = apply_action(&store, &config, &admin, RESISTOR, PartAction::Order { quantity: 50 })
            .await
            .unwrap();
        assert!(record.manual_order);
        assert_eq!(record.order_quantity, 50);
        let view = part_detail(&store, &config, &admin, RESISTOR).await.unwrap();
        assert!(view.manual_order_exists);

        let record = apply_action(&store, &config, &admin, RESISTOR, PartAction::Unorder)
            .await
            .unwrap();
        assert!(!record.manual_order);

        for label in ["R1", "R2"] {
            apply_action(
                &store,
                &config,
                &admin,
                RESISTOR,
                PartAction::AddToDevice {
                    device_id: 1,
                    quantity: 2,
                    mount_names: label.into(),
                },
            )
            .await
            .unwrap();
        }
        let view = part_detail(&store, &config, &admin, RESISTOR).await.unwrap();
        assert_eq!(view.devices.len(), 1);
        assert_eq!(view.devices[0].name, "Amplifier");
        assert_eq!(view.devices[0].mount_quantity, 4);
        assert_eq!(view.devices[0].mount_names, "R1,R2");
    }

    #[tokio::test]
    async fn test_category_change_requires_move() {
        let store = MemoryStorage::seeded();
        let editors = store.add_group("editors");
        store.add_rule(editors, Resource::Parts, Operation::Edit, true);
        store.add_rule(editors, Resource::PartsName, Operation::Edit, true);
        let editor = store.add_user("eve", editors);
        let editor = principal(&store, editor).await;

        let record = update_part(
            &store,
            &editor,
            LED,
            PartChanges {
                name: Some("L-53HD red".into()),
                ..PartChanges::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(record.name, "L-53HD red");

        let err = update_part(
            &store,
            &editor,
            LED,
            PartChanges {
                category_id: Some(Some(1)),
                ..PartChanges::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = update_part(
            &store,
            &editor,
            LED,
            PartChanges {
                description: Some("x".into()),
                ..PartChanges::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_placeholders_for_part() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;

        let text = expand_for_part(
            &store,
            &config,
            &admin,
            LED,
            "%name% %cat% %supplier% %order_nr% %avgprice%",
        )
        .await
        .unwrap();
        assert_eq!(text, "L-53HD LEDs Reichelt LED 5MM RT 0.10");

        let text = expand_for_part(&store, &config, &admin, CERAMIC, "%manufact% - %storeloc%")
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = MemoryStorage::seeded();
        let admin = principal(&store, ADMIN).await;
        let stats = statistics(&store, &admin).await.unwrap();
        assert_eq!(stats.counts["parts"], 3);
        assert_eq!(stats.counts["categories"], 7);
        assert_eq!(stats.counts["orderdetails"], 3);
    }

    #[tokio::test]
    async fn test_tree_operations() {
        let store = MemoryStorage::seeded();
        let config = Config::default();
        let admin = principal(&store, ADMIN).await;
        let guest = principal(&store, GUEST).await;

        let err = create_node(&store, &config, &guest, NodeKind::Category, NewNode::new(2, "Inductors"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let view = create_node(&store, &config, &admin, NodeKind::Category, NewNode::new(2, "Inductors"))
            .await
            .unwrap();
        assert_eq!(view.full_path, "Electronics → Passive → Inductors");

        let names: Vec<String> = subtree(&store, &admin, NodeKind::Category, 2, false)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.node.name)
            .collect();
        assert_eq!(names, ["Capacitors", "Inductors", "Resistors"]);

        let top: Vec<String> = tree(&store, &guest, NodeKind::Category)
            .await
            .unwrap()
            .into_iter()
            .map(|node| node.text)
            .collect();
        assert_eq!(top, ["Electronics", "Mechanical"]);

        let err = delete_node(&store, &admin, NodeKind::Category, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEmpty);
        delete_node(&store, &admin, NodeKind::Category, view.record.id)
            .await
            .unwrap();

        let err = update_node(
            &store,
            &config,
            &admin,
            NodeKind::Category,
            2,
            NodeChanges {
                parent_id: Some(3),
                ..NodeChanges::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::Cycle { .. })));
    }
}

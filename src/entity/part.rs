// =============================================================================
// PART
// =============================================================================
// The central record: one kind of electronic component with its stock level,
// order flags, structural references and owned collections.
//
// STOCK RULES:
// - Stock is either a known count (>= 0) or Unknown
// - Stock changes by signed delta (adjust_stock); absolute values only via
//   the explicit set_instock / set_instock_unknown operations
// - Stock never becomes negative
//
// DERIVED VALUES (cached until the next mutation):
// - average price (per reference quantity)
// - auto order flag
// =============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::attachment::{self, AttachmentRecord};
use super::device_part::DevicePart;
use super::orderdetail::{average_unit_price, OrderDetail};
use super::structural::{ensure_reference_exists, NodeKind, StructuralElement};
use super::{normalize_name, Derived, Entity};
use crate::config::Features;
use crate::error::{AppError, AppResult, ValidationError};
use crate::store::Storage;
use crate::util::format_price;

/// Stored `instock` value meaning "unknown"
pub const INSTOCK_UNKNOWN: i32 = -2;

// =============================================================================
// STOCK
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stock {
    Known(u32),
    /// Serialized as `null`
    Unknown,
}

impl Default for Stock {
    fn default() -> Self {
        Stock::Known(0)
    }
}

impl Stock {
    /// Any negative stored value is treated as unknown.
    pub fn from_db(value: i32) -> Self {
        u32::try_from(value).map(Stock::Known).unwrap_or(Stock::Unknown)
    }

    /// Counts above `i32::MAX` have no stored form.
    pub fn to_db(self) -> Result<i32, ValidationError> {
        match self {
            Stock::Known(count) => i32::try_from(count).map_err(|_| {
                ValidationError::attribute("instock", format!("{count} is out of range"))
            }),
            Stock::Unknown => Ok(INSTOCK_UNKNOWN),
        }
    }

    pub fn known(self) -> Option<u32> {
        match self {
            Stock::Known(count) => Some(count),
            Stock::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Stock::Unknown)
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stock::Known(count) => write!(f, "{count}"),
            Stock::Unknown => f.write_str("?"),
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub instock: Stock,
    pub mininstock: u32,
    pub visible: bool,
    pub manual_order: bool,
    /// Pieces to order when `manual_order` is set
    pub order_quantity: u32,
    pub category_id: Option<i64>,
    pub footprint_id: Option<i64>,
    pub storelocation_id: Option<i64>,
    pub manufacturer_id: Option<i64>,
    pub manufacturer_product_url: String,
    pub datetime_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Insert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPart {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub instock: Stock,
    #[serde(default)]
    pub mininstock: u32,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub footprint_id: Option<i64>,
    #[serde(default)]
    pub storelocation_id: Option<i64>,
    #[serde(default)]
    pub manufacturer_id: Option<i64>,
    #[serde(default)]
    pub manufacturer_product_url: String,
}

fn default_visible() -> bool {
    true
}

impl NewPart {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            comment: String::new(),
            instock: Stock::default(),
            mininstock: 0,
            visible: true,
            category_id: None,
            footprint_id: None,
            storelocation_id: None,
            manufacturer_id: None,
            manufacturer_product_url: String::new(),
        }
    }
}

/// Distinguishes "field absent" (None) from "field set to null" (Some(None)).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Batch of attribute changes accepted from callers. Stock and order flags
/// have their own operations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub mininstock: Option<u32>,
    pub visible: Option<bool>,
    pub manufacturer_product_url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub footprint_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub storelocation_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub manufacturer_id: Option<Option<i64>>,
}

/// Storage-level diff of a part row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartDiff {
    pub name: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub mininstock: Option<u32>,
    pub visible: Option<bool>,
    pub manufacturer_product_url: Option<String>,
    pub category_id: Option<Option<i64>>,
    pub footprint_id: Option<Option<i64>>,
    pub storelocation_id: Option<Option<i64>>,
    pub manufacturer_id: Option<Option<i64>>,
    pub instock: Option<Stock>,
    /// (enabled, quantity), always written together
    pub manual_order: Option<(bool, u32)>,
}

impl PartDiff {
    pub fn is_empty(&self) -> bool {
        *self == PartDiff::default()
    }

    /// Applies the diff to a record (used by the in-memory store).
    pub fn apply(&self, record: &mut PartRecord) {
        if let Some(v) = &self.name {
            record.name = v.clone();
        }
        if let Some(v) = &self.description {
            record.description = v.clone();
        }
        if let Some(v) = &self.comment {
            record.comment = v.clone();
        }
        if let Some(v) = self.mininstock {
            record.mininstock = v;
        }
        if let Some(v) = self.visible {
            record.visible = v;
        }
        if let Some(v) = &self.manufacturer_product_url {
            record.manufacturer_product_url = v.clone();
        }
        if let Some(v) = self.category_id {
            record.category_id = v;
        }
        if let Some(v) = self.footprint_id {
            record.footprint_id = v;
        }
        if let Some(v) = self.storelocation_id {
            record.storelocation_id = v;
        }
        if let Some(v) = self.manufacturer_id {
            record.manufacturer_id = v;
        }
        if let Some(v) = self.instock {
            record.instock = v;
        }
        if let Some((enabled, quantity)) = self.manual_order {
            record.manual_order = enabled;
            record.order_quantity = quantity;
        }
    }
}

// =============================================================================
// PART ENTITY
// =============================================================================
#[derive(Debug, Clone)]
pub struct Part {
    record: PartRecord,
    orderdetails: Option<Vec<OrderDetail>>,
    attachments: Option<Vec<AttachmentRecord>>,
    device_parts: Option<Vec<DevicePart>>,
    /// (reference quantity, average unit price)
    average_price: Derived<(u32, Option<Decimal>)>,
    /// (auto order enabled, result)
    auto_order: Derived<(bool, bool)>,
}

impl Entity for Part {
    fn entity_name(&self) -> &'static str {
        "Part"
    }

    fn id(&self) -> i64 {
        self.record.id
    }

    fn invalidate(&mut self) {
        self.orderdetails = None;
        self.attachments = None;
        self.device_parts = None;
        self.average_price.invalidate();
        self.auto_order.invalidate();
    }
}

impl Part {
    // -------------------------------------------------------------------------
    // LOADING / CREATION
    // -------------------------------------------------------------------------
    pub fn from_record(record: PartRecord) -> Self {
        Self {
            record,
            orderdetails: None,
            attachments: None,
            device_parts: None,
            average_price: Derived::default(),
            auto_order: Derived::default(),
        }
    }

    pub async fn load(store: &dyn Storage, id: i64) -> AppResult<Self> {
        let record = store
            .fetch_part(id)
            .await?
            .ok_or_else(|| AppError::not_found("Part", id))?;
        Ok(Self::from_record(record))
    }

    pub async fn create(store: &dyn Storage, new: NewPart) -> AppResult<Self> {
        let name = normalize_name("name", &new.name)?;
        for (kind, id) in [
            (NodeKind::Category, new.category_id),
            (NodeKind::Footprint, new.footprint_id),
            (NodeKind::StoreLocation, new.storelocation_id),
            (NodeKind::Manufacturer, new.manufacturer_id),
        ] {
            ensure_reference_exists(store, kind, id).await?;
        }
        new.instock.to_db()?;

        let record = store.insert_part(&NewPart { name, ..new }).await?;
        Ok(Self::from_record(record))
    }

    /// Deletes the part with its order details, attachments and device
    /// associations.
    pub async fn delete(self, store: &dyn Storage) -> AppResult<()> {
        store.delete_part(self.record.id).await
    }

    // -------------------------------------------------------------------------
    // ACCESSORS
    // -------------------------------------------------------------------------
    pub fn record(&self) -> &PartRecord {
        &self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn instock(&self) -> Stock {
        self.record.instock
    }

    pub fn mininstock(&self) -> u32 {
        self.record.mininstock
    }

    pub fn manual_order(&self) -> bool {
        self.record.manual_order
    }

    pub fn order_quantity(&self) -> u32 {
        self.record.order_quantity
    }

    /// Manually marked for ordering while the stock is still sufficient
    /// (otherwise the automatic order already covers it).
    pub fn manual_order_exists(&self) -> bool {
        let sufficient = match self.record.instock {
            Stock::Known(count) => count >= self.record.mininstock,
            Stock::Unknown => true,
        };
        self.record.manual_order && sufficient
    }

    /// True when automatic ordering is enabled and stock < minimum stock.
    pub fn get_auto_order(&mut self, features: &Features) -> bool {
        let enabled = features.auto_order;
        if let Some((cached_for, value)) = self.auto_order.get() {
            if *cached_for == enabled {
                return *value;
            }
        }
        let value = enabled
            && match self.record.instock {
                Stock::Known(count) => count < self.record.mininstock,
                Stock::Unknown => false,
            };
        self.auto_order.set((enabled, value));
        value
    }

    // -------------------------------------------------------------------------
    // STRUCTURAL REFERENCES
    // -------------------------------------------------------------------------
    pub fn reference_id(&self, kind: NodeKind) -> Option<i64> {
        match kind {
            NodeKind::Category => self.record.category_id,
            NodeKind::Footprint => self.record.footprint_id,
            NodeKind::StoreLocation => self.record.storelocation_id,
            NodeKind::Manufacturer => self.record.manufacturer_id,
            _ => None,
        }
    }

    /// Loads the referenced category, footprint, store location or
    /// manufacturer (None when unset).
    pub async fn reference(
        &self,
        store: &dyn Storage,
        kind: NodeKind,
    ) -> AppResult<Option<StructuralElement>> {
        StructuralElement::load_optional(store, kind, self.reference_id(kind)).await
    }

    // -------------------------------------------------------------------------
    // LAZY COLLECTIONS
    // -------------------------------------------------------------------------
    pub async fn orderdetails(&mut self, store: &dyn Storage) -> AppResult<&[OrderDetail]> {
        if self.orderdetails.is_none() {
            self.orderdetails = Some(OrderDetail::load_for_part(store, self.record.id).await?);
        }
        Ok(self.orderdetails.as_deref().unwrap_or_default())
    }

    pub async fn attachments(&mut self, store: &dyn Storage) -> AppResult<&[AttachmentRecord]> {
        if self.attachments.is_none() {
            self.attachments = Some(attachment::load_for_part(store, self.record.id).await?);
        }
        Ok(self.attachments.as_deref().unwrap_or_default())
    }

    pub async fn device_parts(&mut self, store: &dyn Storage) -> AppResult<&[DevicePart]> {
        if self.device_parts.is_none() {
            self.device_parts = Some(DevicePart::load_for_part(store, self.record.id).await?);
        }
        Ok(self.device_parts.as_deref().unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // PRICES
    // -------------------------------------------------------------------------
    /// Average single-piece price when ordering `reference_quantity` pieces,
    /// over all order details that have a price. None means "no price".
    pub async fn get_average_price(
        &mut self,
        store: &dyn Storage,
        reference_quantity: u32,
    ) -> AppResult<Option<Decimal>> {
        if let Some((quantity, price)) = self.average_price.get() {
            if *quantity == reference_quantity {
                return Ok(*price);
            }
        }
        let price = average_unit_price(self.orderdetails(store).await?, reference_quantity);
        self.average_price.set((reference_quantity, price));
        Ok(price)
    }

    /// Average price as text, `"-"` when there is none.
    pub async fn average_price_text(
        &mut self,
        store: &dyn Storage,
        with_currency: bool,
        reference_quantity: u32,
        currency_symbol: &str,
    ) -> AppResult<String> {
        let price = self.get_average_price(store, reference_quantity).await?;
        let currency = with_currency.then_some(currency_symbol);
        Ok(format_price(price, currency))
    }

    // -------------------------------------------------------------------------
    // MUTATION
    // -------------------------------------------------------------------------
    /// Validates the whole batch, then commits it with one storage update.
    pub async fn set_attributes(
        &mut self,
        store: &dyn Storage,
        changes: PartChanges,
    ) -> AppResult<()> {
        let mut diff = PartDiff {
            description: changes.description,
            comment: changes.comment,
            mininstock: changes.mininstock,
            visible: changes.visible,
            manufacturer_product_url: changes.manufacturer_product_url,
            category_id: changes.category_id,
            footprint_id: changes.footprint_id,
            storelocation_id: changes.storelocation_id,
            manufacturer_id: changes.manufacturer_id,
            ..PartDiff::default()
        };
        if let Some(name) = &changes.name {
            diff.name = Some(normalize_name("name", name)?);
        }
        for (kind, id) in [
            (NodeKind::Category, diff.category_id),
            (NodeKind::Footprint, diff.footprint_id),
            (NodeKind::StoreLocation, diff.storelocation_id),
            (NodeKind::Manufacturer, diff.manufacturer_id),
        ] {
            if let Some(id) = id {
                ensure_reference_exists(store, kind, id).await?;
            }
        }
        self.commit(store, diff).await
    }

    /// Adds `delta` (may be negative) to a known stock.
    pub async fn adjust_stock(&mut self, store: &dyn Storage, delta: i64) -> AppResult<()> {
        let part_id = self.record.id;
        let current = self
            .record
            .instock
            .known()
            .ok_or(ValidationError::UnknownStock { part_id })?;

        let result = i64::from(current).checked_add(delta).ok_or_else(|| {
            ValidationError::attribute("instock", format!("{current} + {delta} is out of range"))
        })?;
        if result < 0 {
            return Err(ValidationError::NegativeStock {
                part_id,
                current,
                delta,
            }
            .into());
        }
        let result = stock_value(result)?;

        self.commit(
            store,
            PartDiff {
                instock: Some(Stock::Known(result)),
                ..PartDiff::default()
            },
        )
        .await
    }

    /// Explicit absolute stock set (inventory count).
    pub async fn set_instock(&mut self, store: &dyn Storage, value: i64) -> AppResult<()> {
        if value < 0 {
            return Err(ValidationError::attribute("instock", "must not be negative").into());
        }
        let value = stock_value(value)?;
        self.commit(
            store,
            PartDiff {
                instock: Some(Stock::Known(value)),
                ..PartDiff::default()
            },
        )
        .await
    }

    pub async fn set_instock_unknown(&mut self, store: &dyn Storage) -> AppResult<()> {
        self.commit(
            store,
            PartDiff {
                instock: Some(Stock::Unknown),
                ..PartDiff::default()
            },
        )
        .await
    }

    /// Marks the part for manual ordering (`quantity` > 0 required) or
    /// removes the mark. Flag and quantity are written together.
    pub async fn set_manual_order(
        &mut self,
        store: &dyn Storage,
        enabled: bool,
        quantity: i64,
    ) -> AppResult<()> {
        let quantity = if enabled {
            u32::try_from(quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| {
                    ValidationError::attribute(
                        "order_quantity",
                        format!("must be a positive number, got {quantity}"),
                    )
                })?
        } else {
            0
        };
        self.commit(
            store,
            PartDiff {
                manual_order: Some((enabled, quantity)),
                ..PartDiff::default()
            },
        )
        .await
    }

    /// Mounts `quantity` pieces of this part in a device.
    pub async fn attach_to_device(
        &mut self,
        store: &dyn Storage,
        device_id: i64,
        quantity: i64,
        mount_label: &str,
    ) -> AppResult<DevicePart> {
        let device_part =
            DevicePart::upsert(store, device_id, self.record.id, quantity, mount_label).await?;
        self.device_parts = None;
        Ok(device_part)
    }

    async fn commit(&mut self, store: &dyn Storage, diff: PartDiff) -> AppResult<()> {
        if diff.is_empty() {
            return Ok(());
        }
        store.update_part(self.record.id, &diff).await?;
        self.record = store
            .fetch_part(self.record.id)
            .await?
            .ok_or_else(|| AppError::not_found("Part", self.record.id))?;
        self.invalidate();
        Ok(())
    }
}

fn stock_value(value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value)
        .ok()
        .filter(|v| i32::try_from(*v).is_ok())
        .ok_or_else(|| ValidationError::attribute("instock", format!("{value} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::orderdetail::{NewOrderDetail, NewPriceDetail};
    use crate::entity::structural::NewNode;
    use crate::error::ErrorKind;
    use crate::store::MemoryStorage;
    use rust_decimal_macros::dec;

    async fn part_with_stock(store: &MemoryStorage, instock: u32, mininstock: u32) -> Part {
        let mut new = NewPart::named("LED red 5mm");
        new.instock = Stock::Known(instock);
        new.mininstock = mininstock;
        Part::create(store, new).await.unwrap()
    }

    #[test]
    fn test_stock_db_mapping() {
        assert_eq!(Stock::from_db(5), Stock::Known(5));
        assert_eq!(Stock::from_db(INSTOCK_UNKNOWN), Stock::Unknown);
        assert_eq!(Stock::Unknown.to_db(), Ok(INSTOCK_UNKNOWN));
        assert_eq!(Stock::Known(0).to_db(), Ok(0));
        assert!(Stock::Known(u32::MAX).to_db().is_err());
        assert_eq!(Stock::Unknown.to_string(), "?");
    }

    #[tokio::test]
    async fn test_adjust_stock_never_goes_negative() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 5, 0).await;

        let err = part.adjust_stock(&store, -10).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::NegativeStock { current: 5, delta: -10, .. })
        ));
        assert_eq!(part.instock(), Stock::Known(5));
        assert_eq!(Part::load(&store, part.id()).await.unwrap().instock(), Stock::Known(5));

        part.adjust_stock(&store, -5).await.unwrap();
        assert_eq!(part.instock(), Stock::Known(0));
        part.adjust_stock(&store, 12).await.unwrap();
        assert_eq!(Part::load(&store, part.id()).await.unwrap().instock(), Stock::Known(12));
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_overflowing_delta() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 5, 0).await;

        for delta in [i64::MAX, i64::MIN] {
            let err = part.adjust_stock(&store, delta).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = part.adjust_stock(&store, i64::from(i32::MAX)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(Part::load(&store, part.id()).await.unwrap().instock(), Stock::Known(5));
    }

    #[tokio::test]
    async fn test_create_rejects_unstorable_stock() {
        let store = MemoryStorage::new();
        let mut new = NewPart::named("Bulk resistor reel");
        new.instock = Stock::Known(u32::MAX);

        let err = Part::create(&store, new).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.count(crate::store::Table::Parts, None).await.unwrap(), 0);

        let mut new = NewPart::named("Bulk resistor reel");
        new.instock = Stock::Known(i32::MAX as u32);
        let part = Part::create(&store, new).await.unwrap();
        assert_eq!(part.instock(), Stock::Known(i32::MAX as u32));
    }

    #[tokio::test]
    async fn test_unknown_stock_cannot_be_adjusted() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 3, 0).await;
        part.set_instock_unknown(&store).await.unwrap();

        let err = part.adjust_stock(&store, 1).await.unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::UnknownStock { .. })));

        part.set_instock(&store, 8).await.unwrap();
        assert_eq!(part.instock(), Stock::Known(8));
        assert!(part.set_instock(&store, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_auto_order_follows_stock_and_toggle() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 2, 5).await;
        let enabled = Features::default();
        let disabled = Features {
            auto_order: false,
            ..Features::default()
        };

        assert!(part.get_auto_order(&enabled));
        assert!(!part.get_auto_order(&disabled));

        part.adjust_stock(&store, 3).await.unwrap();
        assert!(!part.get_auto_order(&enabled));
    }

    #[tokio::test]
    async fn test_manual_order() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 10, 5).await;

        let err = part.set_manual_order(&store, true, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!part.manual_order());

        part.set_manual_order(&store, true, 25).await.unwrap();
        assert!(part.manual_order());
        assert_eq!(part.order_quantity(), 25);
        assert!(part.manual_order_exists());

        part.set_manual_order(&store, false, 99).await.unwrap();
        assert!(!part.manual_order());
        assert_eq!(part.order_quantity(), 0);
    }

    #[tokio::test]
    async fn test_average_price_from_order_details() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 1, 0).await;
        assert_eq!(part.get_average_price(&store, 1).await.unwrap(), None);
        assert_eq!(
            part.average_price_text(&store, true, 1, "€").await.unwrap(),
            "-"
        );

        let mut part = Part::load(&store, part.id()).await.unwrap();
        for (supplier, breakpoints) in [
            ("Reichelt", vec![(1, dec!(0.10)), (10, dec!(0.08))]),
            ("Mouser", vec![(1, dec!(0.12))]),
        ] {
            let supplier = StructuralElement::create(&store, NodeKind::Supplier, NewNode::new(0, supplier))
                .await
                .unwrap();
            let mut detail = OrderDetail::create(
                &store,
                NewOrderDetail {
                    part_id: part.id(),
                    supplier_id: supplier.id(),
                    supplierpartnr: "X".into(),
                    obsolete: false,
                    supplier_product_url: String::new(),
                },
            )
            .await
            .unwrap();
            for (min_qty, price) in breakpoints {
                detail
                    .add_price(
                        &store,
                        NewPriceDetail {
                            orderdetails_id: 0,
                            price,
                            price_related_quantity: 1,
                            min_discount_quantity: min_qty,
                        },
                    )
                    .await
                    .unwrap();
            }
        }

        assert_eq!(part.get_average_price(&store, 10).await.unwrap(), Some(dec!(0.10)));
        assert_eq!(part.get_average_price(&store, 1).await.unwrap(), Some(dec!(0.11)));
        assert_eq!(
            part.average_price_text(&store, true, 10, "€").await.unwrap(),
            "0.10 €"
        );
    }

    #[tokio::test]
    async fn test_attach_to_device_upserts() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 1, 0).await;
        let device = StructuralElement::create(&store, NodeKind::Device, NewNode::new(0, "Amplifier"))
            .await
            .unwrap();

        let err = part.attach_to_device(&store, 0, 2, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = part.attach_to_device(&store, device.id(), 0, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = part.attach_to_device(&store, 999, 1, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        part.attach_to_device(&store, device.id(), 2, "D1").await.unwrap();
        let merged = part.attach_to_device(&store, device.id(), 3, "D2").await.unwrap();
        assert_eq!(merged.record.quantity, 5);
        assert_eq!(merged.record.mount_names, "D1,D2");

        let device_parts = part.device_parts(&store).await.unwrap();
        assert_eq!(device_parts.len(), 1);
    }

    #[tokio::test]
    async fn test_set_attributes_validates_references_atomically() {
        let store = MemoryStorage::new();
        let mut part = part_with_stock(&store, 1, 0).await;
        let category = StructuralElement::create(&store, NodeKind::Category, NewNode::new(0, "LEDs"))
            .await
            .unwrap();

        let err = part
            .set_attributes(
                &store,
                PartChanges {
                    name: Some("LED green".into()),
                    footprint_id: Some(Some(77)),
                    ..PartChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(Part::load(&store, part.id()).await.unwrap().name(), "LED red 5mm");

        part.set_attributes(
            &store,
            PartChanges {
                name: Some("LED green".into()),
                category_id: Some(Some(category.id())),
                ..PartChanges::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(part.name(), "LED green");
        let category = part.reference(&store, NodeKind::Category).await.unwrap().unwrap();
        assert_eq!(category.name(), "LEDs");

        part.set_attributes(
            &store,
            PartChanges {
                category_id: Some(None),
                ..PartChanges::default()
            },
        )
        .await
        .unwrap();
        assert!(part.reference(&store, NodeKind::Category).await.unwrap().is_none());
    }

    #[test]
    fn test_part_changes_distinguish_null_from_absent() {
        let changes: PartChanges =
            serde_json::from_str(r#"{"category_id": null, "footprint_id": 4}"#).unwrap();
        assert_eq!(changes.category_id, Some(None));
        assert_eq!(changes.footprint_id, Some(Some(4)));
        assert_eq!(changes.manufacturer_id, None);
    }
}

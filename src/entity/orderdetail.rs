// =============================================================================
// ORDER DETAILS AND PRICE BREAKPOINTS
// =============================================================================
// A part can be bought from several suppliers. Each OrderDetail is one
// supplier offer; its PriceDetails are quantity breakpoints.
//
// PRICE RULES:
// - A PriceDetail's `price` is for `price_related_quantity` pieces
// - For an order quantity q, the applicable breakpoint is the one with the
//   largest `min_discount_quantity` <= q; if none qualifies, the smallest
//   breakpoint is used
// - Prices are normalised to one piece before averaging
// =============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entity::structural::{ensure_reference_exists, NodeKind};
use crate::error::{AppError, AppResult, ValidationError};
use crate::store::Storage;

// =============================================================================
// RECORDS
// =============================================================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetailRecord {
    pub id: i64,
    pub part_id: i64,
    pub supplier_id: i64,
    /// Supplier's order number for this part
    pub supplierpartnr: String,
    pub obsolete: bool,
    pub supplier_product_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderDetail {
    pub part_id: i64,
    pub supplier_id: i64,
    pub supplierpartnr: String,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default)]
    pub supplier_product_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDetailRecord {
    pub id: i64,
    pub orderdetails_id: i64,
    /// Price for `price_related_quantity` pieces
    pub price: Decimal,
    pub price_related_quantity: u32,
    pub min_discount_quantity: u32,
}

impl PriceDetailRecord {
    /// Price of a single piece
    pub fn unit_price(&self) -> Decimal {
        self.price / Decimal::from(self.price_related_quantity.max(1))
    }

    /// Price for `quantity` pieces at this breakpoint
    pub fn price_for(&self, quantity: u32) -> Decimal {
        self.unit_price() * Decimal::from(quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPriceDetail {
    pub orderdetails_id: i64,
    pub price: Decimal,
    pub price_related_quantity: u32,
    pub min_discount_quantity: u32,
}

impl NewPriceDetail {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.price.is_sign_negative() {
            return Err(ValidationError::attribute("price", "must not be negative"));
        }
        if self.price_related_quantity == 0 {
            return Err(ValidationError::attribute(
                "price_related_quantity",
                "must be at least 1",
            ));
        }
        if self.min_discount_quantity == 0 {
            return Err(ValidationError::attribute(
                "min_discount_quantity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// ORDER DETAIL
// =============================================================================
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub record: OrderDetailRecord,
    /// Sorted by `min_discount_quantity` ascending
    pub pricedetails: Vec<PriceDetailRecord>,
}

impl OrderDetail {
    pub fn new(record: OrderDetailRecord, mut pricedetails: Vec<PriceDetailRecord>) -> Self {
        pricedetails.sort_by_key(|p| (p.min_discount_quantity, p.id));
        Self {
            record,
            pricedetails,
        }
    }

    /// Loads all order details of a part, each with its price breakpoints.
    pub async fn load_for_part(store: &dyn Storage, part_id: i64) -> AppResult<Vec<Self>> {
        let mut records = store.fetch_orderdetails(part_id).await?;
        records.sort_by_key(|r| r.id);

        let mut details = Vec::with_capacity(records.len());
        for record in records {
            let prices = store.fetch_pricedetails(record.id).await?;
            details.push(Self::new(record, prices));
        }
        Ok(details)
    }

    /// Adds a supplier offer to a part. The supplier must exist.
    pub async fn create(store: &dyn Storage, new: NewOrderDetail) -> AppResult<Self> {
        ensure_reference_exists(store, NodeKind::Supplier, Some(new.supplier_id)).await?;
        if store.fetch_part(new.part_id).await?.is_none() {
            return Err(AppError::not_found("Part", new.part_id));
        }
        let record = store.insert_orderdetail(&new).await?;
        Ok(Self::new(record, Vec::new()))
    }

    /// Adds a price breakpoint.
    pub async fn add_price(&mut self, store: &dyn Storage, new: NewPriceDetail) -> AppResult<()> {
        new.validate()?;
        let new = NewPriceDetail {
            orderdetails_id: self.record.id,
            ..new
        };
        let record = store.insert_pricedetail(&new).await?;
        self.pricedetails.push(record);
        self.pricedetails
            .sort_by_key(|p| (p.min_discount_quantity, p.id));
        Ok(())
    }

    /// Breakpoint that applies when ordering `quantity` pieces.
    pub fn pricedetail_for(&self, quantity: u32) -> Option<&PriceDetailRecord> {
        self.pricedetails
            .iter()
            .filter(|p| p.min_discount_quantity <= quantity)
            .max_by_key(|p| p.min_discount_quantity)
            .or_else(|| self.pricedetails.first())
    }

    /// Single-piece price when ordering `quantity` pieces.
    pub fn unit_price(&self, quantity: u32) -> Option<Decimal> {
        self.pricedetail_for(quantity).map(PriceDetailRecord::unit_price)
    }
}

/// Average single-piece price over all order details that have a price.
/// None when no order detail produced a price.
pub fn average_unit_price(details: &[OrderDetail], reference_quantity: u32) -> Option<Decimal> {
    let prices: Vec<Decimal> = details
        .iter()
        .filter_map(|detail| detail.unit_price(reference_quantity))
        .collect();
    if prices.is_empty() {
        return None;
    }
    let sum: Decimal = prices.iter().copied().sum();
    Some(sum / Decimal::from(prices.len()))
}

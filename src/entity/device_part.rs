// =============================================================================
// DEVICE PARTS
// =============================================================================
// Association between a Device (structural element) and a Part, with the
// number of pieces mounted and optional mount position labels ("R1,R2").
// There is at most one association per (device, part) pair.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::entity::structural::{NodeKind, StructuralElement};
use crate::error::{AppError, AppResult};
use crate::store::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePartRecord {
    pub id: i64,
    pub device_id: i64,
    pub part_id: i64,
    pub quantity: u32,
    /// Comma separated mount positions
    pub mount_names: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevicePart {
    pub device_id: i64,
    pub part_id: i64,
    pub quantity: u32,
    pub mount_names: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePartChanges {
    pub quantity: Option<u32>,
    pub mount_names: Option<String>,
}

/// Appends `label` to a comma separated list unless it is already present.
pub fn merge_mount_names(existing: &str, label: &str) -> String {
    let mut names: Vec<&str> = existing
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    for name in label.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(",")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePart {
    pub record: DevicePartRecord,
}

impl DevicePart {
    pub async fn load_for_part(store: &dyn Storage, part_id: i64) -> AppResult<Vec<Self>> {
        let mut records = store.fetch_device_parts(part_id).await?;
        records.sort_by_key(|r| (r.device_id, r.id));
        Ok(records.into_iter().map(|record| Self { record }).collect())
    }

    /// Creates the association, or adds to an existing one.
    ///
    /// - `device_id` and `quantity` must be positive
    /// - The device and the part must exist
    /// - An existing (device, part) row gets `quantity` added and `mount_label`
    ///   merged into its mount names
    pub async fn upsert(
        store: &dyn Storage,
        device_id: i64,
        part_id: i64,
        quantity: i64,
        mount_label: &str,
    ) -> AppResult<Self> {
        if device_id <= 0 {
            return Err(AppError::invalid(format!("invalid device id: {device_id}")));
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| AppError::invalid(format!("invalid mount quantity: {quantity}")))?;

        StructuralElement::load(store, NodeKind::Device, device_id).await?;

        match store.fetch_device_part(device_id, part_id).await? {
            Some(existing) => {
                let total = existing.quantity.checked_add(quantity).ok_or_else(|| {
                    AppError::invalid(format!("mount quantity overflow: {} + {}", existing.quantity, quantity))
                })?;
                let changes = DevicePartChanges {
                    quantity: Some(total),
                    mount_names: Some(merge_mount_names(&existing.mount_names, mount_label)),
                };
                store.update_device_part(existing.id, &changes).await?;
                let record = store
                    .fetch_device_part(device_id, part_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("DevicePart", existing.id))?;
                Ok(Self { record })
            }
            None => {
                let record = store
                    .insert_device_part(&NewDevicePart {
                        device_id,
                        part_id,
                        quantity,
                        mount_names: merge_mount_names("", mount_label),
                    })
                    .await?;
                Ok(Self { record })
            }
        }
    }
}

// =============================================================================
// ENTITY MODULE
// =============================================================================
// Common persistence contract for records loaded by numeric id.
//
// NOTES:
// - Each entity is an explicit struct of typed fields (the stored record)
//   plus a few memoized derived values
// - Derived values are guarded by an explicit dirty flag (Derived<T>) and are
//   invalidated after every mutation
// - Entities are created per request; nothing is shared across requests
// - Mutations validate a whole batch first and then issue exactly one storage
//   update, so a failed call never leaves partial changes behind
// =============================================================================

pub mod attachment;
pub mod device_part;
pub mod orderdetail;
pub mod part;
pub mod structural;
pub mod user;

/// Id of the virtual root of every structural forest. Never stored.
pub const ROOT_ID: i64 = 0;

// -----------------------------------------------------------------------------
// ENTITY TRAIT
// -----------------------------------------------------------------------------
pub trait Entity {
    /// Human-readable entity name used in error messages ("Part", "Category")
    fn entity_name(&self) -> &'static str;

    /// Stored id (0 only for the virtual root)
    fn id(&self) -> i64;

    /// Drop all cached derived attributes. The next accessor re-derives them
    /// from the stored record.
    fn invalidate(&mut self);
}

// -----------------------------------------------------------------------------
// DERIVED VALUE CACHE
// -----------------------------------------------------------------------------
/// A lazily computed value with an explicit dirty flag.
///
/// # Example
/// ```ignore
/// let mut total = Derived::default();
/// assert_eq!(total.get_or_compute(|| 2 + 2), 4);
/// total.invalidate();
/// assert!(!total.is_fresh());
/// ```
#[derive(Debug, Clone)]
pub struct Derived<T> {
    value: Option<T>,
}

impl<T> Default for Derived<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Clone> Derived<T> {
    /// Returns the cached value, computing it first if dirty.
    pub fn get_or_compute(&mut self, compute: impl FnOnce() -> T) -> T {
        match &self.value {
            Some(value) => value.clone(),
            None => {
                let value = compute();
                self.value = Some(value.clone());
                value
            }
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    pub fn is_fresh(&self) -> bool {
        self.value.is_some()
    }
}

/// Trims a name and rejects it when nothing is left.
pub(crate) fn normalize_name(field: &'static str, name: &str) -> Result<String, crate::error::ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(crate::error::ValidationError::attribute(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

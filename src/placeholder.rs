// =============================================================================
// PLACEHOLDERS
// =============================================================================
// Replaces `%token%` placeholders in label/filename templates with values of
// a part. The values are resolved beforehand (see inventory.rs), so the
// expansion itself is pure.
// =============================================================================

/// Resolved values of one part. Empty strings stand for absent relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderContext {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub mininstock: u32,
    /// Stock as displayed ("?" when unknown)
    pub instock: String,
    pub average_price: String,
    pub category: String,
    pub category_full: String,
    pub footprint: String,
    pub footprint_full: String,
    pub manufacturer: String,
    /// Supplier of the first order detail
    pub supplier: String,
    /// Supplier part number of the first order detail
    pub order_nr: String,
    pub storelocation: String,
    pub storelocation_full: String,
}

/// Known tokens, without the surrounding `%`.
pub const TOKENS: [&str; 16] = [
    "id",
    "name",
    "desc",
    "comment",
    "mininstock",
    "instock",
    "avgprice",
    "cat",
    "cat_full",
    "foot",
    "foot_full",
    "manufact",
    "supplier",
    "order_nr",
    "storeloc",
    "storeloc_full",
];

impl PlaceholderContext {
    fn value(&self, token: &str) -> Option<String> {
        let value = match token {
            "id" => self.id.to_string(),
            "name" => self.name.clone(),
            "desc" => self.description.clone(),
            "comment" => self.comment.clone(),
            "mininstock" => self.mininstock.to_string(),
            "instock" => self.instock.clone(),
            "avgprice" => self.average_price.clone(),
            "cat" => self.category.clone(),
            "cat_full" => self.category_full.clone(),
            "foot" => self.footprint.clone(),
            "foot_full" => self.footprint_full.clone(),
            "manufact" => self.manufacturer.clone(),
            "supplier" => self.supplier.clone(),
            "order_nr" => self.order_nr.clone(),
            "storeloc" => self.storelocation.clone(),
            "storeloc_full" => self.storelocation_full.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// Expands every known `%token%` in one pass. Unknown tokens stay as they
/// are and substituted values are never expanded again. A result that trims
/// to a lone "-" becomes empty.
pub fn expand_placeholders(template: &str, context: &PlaceholderContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        match context.value(&after[..end]) {
            Some(value) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                // keep the '%' and retry from the closing one
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if out.trim() == "-" {
        String::new()
    } else {
        out
    }
}

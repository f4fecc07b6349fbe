// =============================================================================
// SEARCH MODIFIERS
// =============================================================================
// Splits a search query like `inname:"Red LED" incategory:LEDs` into one
// keyword per searchable field.
//
// RULES:
// - Modifiers are case-sensitive prefixes; the first occurrence counts
// - A long form (`indescription:`) wins over its synonym (`indesc:`)
// - A keyword starting with `"` or `'` runs to the matching quote (or to the
//   end of the query when unterminated); otherwise to the next whitespace
// - A query without any modifier puts the whole query into every field
// =============================================================================

use serde::Serialize;

/// One keyword per searchable field; empty means "not restricted".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchFields {
    pub name: String,
    pub description: String,
    pub comment: String,
    pub footprint: String,
    pub category: String,
    pub storelocation: String,
    pub suppliername: String,
    pub partnr: String,
    pub manufacturername: String,
}

impl SearchFields {
    fn all(query: &str) -> Self {
        Self {
            name: query.to_string(),
            description: query.to_string(),
            comment: query.to_string(),
            footprint: query.to_string(),
            category: query.to_string(),
            storelocation: query.to_string(),
            suppliername: query.to_string(),
            partnr: query.to_string(),
            manufacturername: query.to_string(),
        }
    }

    fn is_empty(&self) -> bool {
        *self == SearchFields::default()
    }
}

/// Long form first, then synonyms
const NAME: &[&str] = &["inname:"];
const DESCRIPTION: &[&str] = &["indescription:", "indesc:"];
const COMMENT: &[&str] = &["incomment:"];
const FOOTPRINT: &[&str] = &["infootprint:", "infoot:"];
const CATEGORY: &[&str] = &["incategory:", "incat:"];
const STORELOCATION: &[&str] = &["inlocation:", "inloc:"];
const SUPPLIER: &[&str] = &["insupplier:"];
const PARTNR: &[&str] = &["inpartnr:"];
const MANUFACTURER: &[&str] = &["inmanufacturer:"];

pub fn parse_search_modifiers(query: &str) -> SearchFields {
    let lookup = |modifiers: &[&str]| {
        modifiers
            .iter()
            .find_map(|modifier| keyword_after(query, modifier))
            .unwrap_or_default()
    };

    let fields = SearchFields {
        name: lookup(NAME),
        description: lookup(DESCRIPTION),
        comment: lookup(COMMENT),
        footprint: lookup(FOOTPRINT),
        category: lookup(CATEGORY),
        storelocation: lookup(STORELOCATION),
        suppliername: lookup(SUPPLIER),
        partnr: lookup(PARTNR),
        manufacturername: lookup(MANUFACTURER),
    };

    if fields.is_empty() {
        SearchFields::all(query)
    } else {
        fields
    }
}

/// Keyword following the first occurrence of `modifier`, None when absent.
fn keyword_after(query: &str, modifier: &str) -> Option<String> {
    let start = query.find(modifier)? + modifier.len();
    let rest = &query[start..];

    let keyword = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let literal = &rest[quote.len_utf8()..];
            literal.find(quote).map_or(literal, |end| &literal[..end])
        }
        _ => rest.find(char::is_whitespace).map_or(rest, |end| &rest[..end]),
    };
    Some(keyword.to_string())
}

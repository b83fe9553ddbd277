//! Deterministic alias derivation.

/// Type-name suffixes stripped from the main alias, in precedence order.
const TYPE_SUFFIXES: [&str; 6] = ["Entity", "EntityPart", "XBE", "BE", "BEP", "DTO"];

/// Main alias of an entity type.
///
/// Lower-cases the first character, then strips at most one known suffix.
/// `BE` is not stripped when preceded by `X` so that `XBE` is never
/// half-stripped.
pub fn main_alias(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let lowered: String = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    };

    for suffix in TYPE_SUFFIXES {
        if let Some(stripped) = lowered.strip_suffix(suffix) {
            if suffix == "BE" && stripped.ends_with('X') {
                continue;
            }
            return stripped.to_string();
        }
    }
    lowered
}

/// Join alias for a dotted relation path.
pub fn join_alias(path: &str) -> String {
    path.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(main_alias("OrderBE"), "order");
        assert_eq!(main_alias("CustomerEntity"), "customer");
        assert_eq!(main_alias("LineEntityPart"), "line");
        assert_eq!(main_alias("ProductXBE"), "product");
        assert_eq!(main_alias("PriceBEP"), "price");
        assert_eq!(main_alias("AddressDTO"), "address");
    }

    #[test]
    fn strips_only_one_suffix() {
        assert_eq!(main_alias("OrderDTOBE"), "orderDTO");
        assert_eq!(main_alias("Invoice"), "invoice");
    }

    #[test]
    fn suffix_check_runs_after_lowercasing() {
        // "BE" lower-cases to "bE" and no longer matches.
        assert_eq!(main_alias("BE"), "bE");
        assert_eq!(main_alias(""), "");
    }

    #[test]
    fn join_alias_replaces_dots() {
        assert_eq!(join_alias("orderLines"), "orderLines");
        assert_eq!(join_alias("orderLines.product"), "orderLines_product");
    }
}

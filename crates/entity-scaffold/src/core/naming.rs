//! Identifier shaping for emitted source code.
//!
//! Centralizes the conversions from catalog names (snake_case, kebab-case,
//! or already-Pascal table names) to entity class names, property names,
//! and collection navigation names. English inflection here is heuristic:
//! it covers the regular cases and leaves irregular nouns alone.

/// Convert a catalog name to PascalCase.
///
/// Separator characters (`_`, `-`, space) start a new capitalized word.
/// Names without separators keep their internal casing, so `StudentCourse`
/// survives round trips.
pub fn pascal_case(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a catalog name to camelCase.
pub fn camel_case(name: &str) -> String {
    let pascal = pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => pascal,
    }
}

/// Pluralize an identifier for collection navigation names.
pub fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let lower = name.to_lowercase();
    if let Some(stem) = name.strip_suffix('y') {
        if !ends_with_vowel_before(&lower, 'y') {
            return format!("{}ies", stem);
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{}es", name);
    }
    format!("{}s", name)
}

/// Singularize an identifier for entity class names.
pub fn singularize(name: &str) -> String {
    let lower = name.to_lowercase();

    if let Some(stem) = name.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return name[..name.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

fn ends_with_vowel_before(lower: &str, last: char) -> bool {
    let stem = &lower[..lower.len() - last.len_utf8()];
    matches!(stem.chars().last(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("student_course"), "StudentCourse");
        assert_eq!(pascal_case("order-detail"), "OrderDetail");
        assert_eq!(pascal_case("StudentCourse"), "StudentCourse");
        assert_eq!(pascal_case("users"), "Users");
        assert_eq!(pascal_case(""), "");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("order_detail"), "orderDetail");
        assert_eq!(camel_case("Id"), "id");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("Order"), "Orders");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Key"), "Keys");
        assert_eq!(pluralize("Address"), "Addresses");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Branch"), "Branches");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("Orders"), "Order");
        assert_eq!(singularize("Categories"), "Category");
        assert_eq!(singularize("Addresses"), "Address");
        assert_eq!(singularize("Branches"), "Branch");
        assert_eq!(singularize("Status"), "Status");
        assert_eq!(singularize("Address"), "Address");
    }

    #[test]
    fn test_pluralize_singularize_round_trip() {
        for name in ["Order", "Category", "Student", "Branch"] {
            assert_eq!(singularize(&pluralize(name)), name);
        }
    }
}

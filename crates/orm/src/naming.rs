//! Naming conventions used when a schema leaves table, model or key names out
//!
//! Model names are singular (`teacher`), table and registry aliases are
//! plural (`teachers`), and foreign key columns are `<name>Id` in camelCase
//! (`teacherId`).

/// Simple pluralization (English-centric)
pub fn pluralize(name: &str) -> String {
    let vowel_y = ["ay", "ey", "iy", "oy", "uy"];
    if name.ends_with('y') && !vowel_y.iter().any(|suffix| name.ends_with(suffix)) {
        format!("{}ies", &name[..name.len() - 1])
    } else if name.ends_with('s')
        || name.ends_with("sh")
        || name.ends_with("ch")
        || name.ends_with('x')
        || name.ends_with('z')
    {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}

/// Convert snake_case to camelCase; already camelCased input is kept
pub fn to_camel_case(s: &str) -> String {
    let mut parts = s.split('_').filter(|part| !part.is_empty());
    let Some(first) = parts.next() else {
        return s.to_string();
    };

    let mut result = first.to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(head) = chars.next() {
            result.extend(head.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

/// Conventional foreign key column for a model or relationship name
pub fn foreign_key(name: &str) -> String {
    format!("{}Id", to_camel_case(name))
}

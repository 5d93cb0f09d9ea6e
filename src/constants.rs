/// Catalog constants shared across resources.
///
/// EPSA records carry two-letter department codes while SARH records carry
/// the department's full upper-case name; both cover the same nine
/// departments.
use once_cell::sync::Lazy;

pub const DEPARTMENTS: &[(&str, &str)] = &[
    ("LP", "La Paz"),
    ("CO", "Cochabamba"),
    ("PO", "Potosí"),
    ("SC", "Santa Cruz"),
    ("CH", "Chuquisaca"),
    ("OR", "Oruro"),
    ("TA", "Tarija"),
    ("BE", "Beni"),
    ("PA", "Pando"),
];

static DEPARTMENT_CODES: Lazy<Vec<&'static str>> =
    Lazy::new(|| DEPARTMENTS.iter().map(|(code, _)| *code).collect());

/// The two-letter codes accepted on EPSA records.
pub fn department_codes() -> &'static [&'static str] {
    &DEPARTMENT_CODES
}

/// Full department name for a two-letter code, if the code is known.
pub fn department_name(code: &str) -> Option<&'static str> {
    DEPARTMENTS.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

pub const EPSA_CATEGORIES: &[&str] = &["A", "B", "C", "D"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_codes_to_names() {
        assert_eq!(department_name("LP"), Some("La Paz"));
        assert_eq!(department_name("SC"), Some("Santa Cruz"));
        assert_eq!(department_name("XX"), None);
    }

    #[test]
    fn code_list_covers_all_departments() {
        assert_eq!(department_codes().len(), DEPARTMENTS.len());
        assert!(department_codes().contains(&"PO"));
    }
}

use crate::constants::{department_codes, EPSA_CATEGORIES};
use crate::domain::check_choice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A regulated water/sanitation utility. `code` (the utility's sigla) is the
/// natural primary key; the remaining registry fields are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epsa {
    pub code: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub category: Option<String>,
    pub modified: Option<DateTime<Utc>>,
}

impl Epsa {
    pub const UNIQUE_KEY: &'static [&'static str] = &["code"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.code.trim().is_empty() {
            errors.push("code: must not be blank".to_string());
        }
        check_choice(&mut errors, "state", self.state.as_deref(), department_codes());
        check_choice(&mut errors, "category", self.category.as_deref(), EPSA_CATEGORIES);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_state_and_category() {
        let epsa: Epsa = serde_json::from_value(serde_json::json!({
            "code": "AAPOS",
            "name": "Administración Autónoma para Obras Sanitarias Potosí",
            "state": "PO",
            "category": "A"
        }))
        .unwrap();
        assert!(epsa.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_department() {
        let epsa: Epsa = serde_json::from_value(serde_json::json!({
            "code": "EPSAS",
            "state": "ZZ"
        }))
        .unwrap();
        let errors = epsa.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("state:")));
    }
}

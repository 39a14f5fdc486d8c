//! Per-field filter authorization.
//!
//! A [`FilterAuthorization`] is an ordered list of (operator, validator)
//! rules. A filter is authorized when some rule's operator matches (exactly,
//! or via the `AUTO` wildcard on the filter side) and the rule's validator
//! accepts the filter's raw value.

use std::sync::Arc;

use serde_json::Value;

use datagrid_core::types::filter::{Filter, FilterOperator};
use datagrid_core::types::value;

/// A predicate over a filter's raw value.
pub type ValueValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

struct Rule {
    operator: FilterOperator,
    validator: Option<ValueValidator>,
}

/// Rules restricting how a field may be filtered.
pub struct FilterAuthorization {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for FilterAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operators: Vec<&str> = self.rules.iter().map(|r| r.operator.as_str()).collect();
        f.debug_struct("FilterAuthorization")
            .field("operators", &operators)
            .finish()
    }
}

impl Default for FilterAuthorization {
    /// The default policy is the common string preset.
    fn default() -> Self {
        Self::common_string()
    }
}

impl FilterAuthorization {
    /// An empty policy: nothing is authorized.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Allow an operator, optionally guarded by a value validator.
    pub fn allow(mut self, operator: FilterOperator, validator: Option<ValueValidator>) -> Self {
        self.rules.push(Rule {
            operator,
            validator,
        });
        self
    }

    /// Drop all rules.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Whether the filter's operator/value pair is accepted by any rule.
    pub fn is_authorized(&self, filter: &Filter) -> bool {
        for rule in &self.rules {
            if filter.operator() != FilterOperator::Auto && filter.operator() != rule.operator {
                continue;
            }
            match &rule.validator {
                None => return true,
                Some(validator) if validator(filter.value()) => return true,
                Some(_) => {}
            }
        }
        false
    }

    /// Preset for string-valued fields: equality, null tests, LIKE and list
    /// membership.
    pub fn common_string() -> Self {
        Self::new()
            .allow(FilterOperator::Eq, Some(validators::is_scalar()))
            .allow(FilterOperator::Ne, Some(validators::is_scalar()))
            .allow(FilterOperator::IsNull, Some(validators::is_scalar()))
            .allow(FilterOperator::IsNotNull, Some(validators::is_scalar()))
            .allow(FilterOperator::Like, Some(validators::is_string()))
            .allow(FilterOperator::NotLike, Some(validators::is_string()))
            .allow(FilterOperator::In, Some(validators::is_array_of_scalar()))
            .allow(FilterOperator::NotIn, Some(validators::is_array_of_scalar()))
    }

    /// Preset for numeric fields: full comparison set, list membership and
    /// ranges, all guarded by numeric validators.
    pub fn common_numeric() -> Self {
        Self::new()
            .allow(FilterOperator::Eq, Some(validators::is_numeric()))
            .allow(FilterOperator::Ne, Some(validators::is_numeric()))
            .allow(FilterOperator::Gt, Some(validators::is_numeric()))
            .allow(FilterOperator::Gte, Some(validators::is_numeric()))
            .allow(FilterOperator::Lt, Some(validators::is_numeric()))
            .allow(FilterOperator::Lte, Some(validators::is_numeric()))
            .allow(FilterOperator::IsNull, Some(validators::is_numeric()))
            .allow(FilterOperator::IsNotNull, Some(validators::is_numeric()))
            .allow(FilterOperator::In, Some(validators::is_array_of_numeric()))
            .allow(FilterOperator::NotIn, Some(validators::is_array_of_numeric()))
            .allow(FilterOperator::Between, Some(validators::is_array_of_numeric()))
            .allow(FilterOperator::NotBetween, Some(validators::is_array_of_numeric()))
    }

    /// Preset for date fields: like the numeric preset but over date strings.
    pub fn common_date() -> Self {
        Self::new()
            .allow(FilterOperator::Eq, Some(validators::is_string()))
            .allow(FilterOperator::Ne, Some(validators::is_string()))
            .allow(FilterOperator::Gt, Some(validators::is_string()))
            .allow(FilterOperator::Gte, Some(validators::is_string()))
            .allow(FilterOperator::Lt, Some(validators::is_string()))
            .allow(FilterOperator::Lte, Some(validators::is_string()))
            .allow(FilterOperator::IsNull, Some(validators::is_string()))
            .allow(FilterOperator::IsNotNull, Some(validators::is_string()))
            .allow(FilterOperator::In, Some(validators::is_array_of_string()))
            .allow(FilterOperator::NotIn, Some(validators::is_array_of_string()))
            .allow(FilterOperator::Between, Some(validators::is_array_of_string()))
            .allow(FilterOperator::NotBetween, Some(validators::is_array_of_string()))
    }
}

/// Canonical value validators for authorization rules.
pub mod validators {
    use super::*;

    /// Accept strings, numbers and booleans.
    pub fn is_scalar() -> ValueValidator {
        Arc::new(value::is_scalar)
    }

    /// Accept strings only.
    pub fn is_string() -> ValueValidator {
        Arc::new(|v: &Value| v.is_string())
    }

    /// Accept numbers and numeric strings.
    pub fn is_numeric() -> ValueValidator {
        Arc::new(value::is_numeric)
    }

    /// Accept non-empty checks are the operator's job; this only checks the
    /// element shape: every element must be a string.
    pub fn is_array_of_string() -> ValueValidator {
        Arc::new(|v: &Value| {
            v.as_array()
                .is_some_and(|items| items.iter().all(Value::is_string))
        })
    }

    /// Every element must be numeric.
    pub fn is_array_of_numeric() -> ValueValidator {
        Arc::new(|v: &Value| {
            v.as_array()
                .is_some_and(|items| items.iter().all(value::is_numeric))
        })
    }

    /// Every element must be a scalar.
    pub fn is_array_of_scalar() -> ValueValidator {
        Arc::new(|v: &Value| {
            v.as_array()
                .is_some_and(|items| items.iter().all(value::is_scalar))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_preset_rejects_comparison_operators() {
        let auth = FilterAuthorization::common_string();
        let like = Filter::global(FilterOperator::Like, json!("abc")).unwrap();
        let gt = Filter::global(FilterOperator::Gt, json!("abc")).unwrap();
        assert!(auth.is_authorized(&like));
        assert!(!auth.is_authorized(&gt));
    }

    #[test]
    fn test_numeric_preset_checks_value_shape() {
        let auth = FilterAuthorization::common_numeric();
        let ok = Filter::global(FilterOperator::Gt, json!(5)).unwrap();
        let numeric_string = Filter::global(FilterOperator::Gt, json!("5")).unwrap();
        let bad = Filter::global(FilterOperator::Gt, json!("five")).unwrap();
        assert!(auth.is_authorized(&ok));
        assert!(auth.is_authorized(&numeric_string));
        assert!(!auth.is_authorized(&bad));
    }

    #[test]
    fn test_auto_operator_matches_any_rule() {
        let auth = FilterAuthorization::common_numeric();
        let auto = Filter::global(FilterOperator::Auto, json!(5)).unwrap();
        assert!(auth.is_authorized(&auto));
    }

    #[test]
    fn test_empty_policy_authorizes_nothing() {
        let auth = FilterAuthorization::new();
        let eq = Filter::global(FilterOperator::Eq, json!("x")).unwrap();
        assert!(!auth.is_authorized(&eq));
    }
}

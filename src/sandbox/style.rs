//! Stylesheet scoping.
//!
//! Rewrites a widget stylesheet so every selector only matches inside the
//! owning item's subtree, by prefixing it with the item's attribute
//! selector. At-rules pass through unprefixed; their inner rules surface
//! as later chunks and stay unprefixed too.

/// Prefix every selector in `css` with `scope`.
///
/// Flat rule lists are handled fully; the tokenizer is deliberately
/// brace-naive, matching the contract that only selector *naming* is
/// scoped, not arbitrary CSS structure.
pub fn scope_stylesheet(css: &str, scope: &str) -> String {
    if css.trim().is_empty() {
        return String::new();
    }

    css.split('}')
        .filter(|rule| !rule.trim().is_empty())
        .map(|rule| scope_rule(rule, scope))
        .collect::<Vec<_>>()
        .join(" ")
}

fn scope_rule(rule: &str, scope: &str) -> String {
    let Some((selectors, body)) = rule.split_once('{') else {
        return rule.trim().to_string();
    };

    if selectors.trim_start().starts_with('@') {
        return format!("{} {{ {} }}", selectors.trim(), body.trim());
    }

    let scoped = selectors
        .split(',')
        .map(|selector| format!("{scope} {}", selector.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{scoped} {{ {} }}", body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "[data-grid-item=\"3\"]";

    #[test]
    fn prefixes_simple_selectors() {
        let scoped = scope_stylesheet(".title { color: red }", SCOPE);
        assert_eq!(scoped, "[data-grid-item=\"3\"] .title { color: red }");
    }

    #[test]
    fn prefixes_each_comma_separated_selector() {
        let scoped = scope_stylesheet("h1, .sub { margin: 0 }", SCOPE);
        assert_eq!(
            scoped,
            "[data-grid-item=\"3\"] h1, [data-grid-item=\"3\"] .sub { margin: 0 }"
        );
    }

    #[test]
    fn at_rules_pass_through_unprefixed() {
        let scoped = scope_stylesheet("@media (max-width: 600px) { .a { color: red }", SCOPE);
        assert!(scoped.starts_with("@media (max-width: 600px)"));
        assert!(!scoped.contains(&format!("{SCOPE} @media")));
    }

    #[test]
    fn multiple_rules_are_all_scoped() {
        let scoped = scope_stylesheet(".a { x: 1 } .b { y: 2 }", SCOPE);
        assert!(scoped.contains("[data-grid-item=\"3\"] .a { x: 1 }"));
        assert!(scoped.contains("[data-grid-item=\"3\"] .b { y: 2 }"));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(scope_stylesheet("   ", SCOPE), "");
    }
}

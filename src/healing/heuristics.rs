use crate::types::logical_key;

/// Structural selectors tried first when the key mentions one of `tokens`.
#[derive(Debug, Clone)]
pub struct TokenRule {
    pub tokens: Vec<String>,
    pub selectors: Vec<String>,
}

impl TokenRule {
    pub fn new<T, S>(tokens: T, selectors: S) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(|t| t.into().to_lowercase()).collect(),
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    fn applies_to(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.tokens.iter().any(|token| key.contains(token.as_str()))
    }
}

/// Naming-convention selector guesses for a logical name.
#[derive(Debug, Clone)]
pub struct HeuristicGenerator {
    rules: Vec<TokenRule>,
}

impl Default for HeuristicGenerator {
    fn default() -> Self {
        Self {
            rules: vec![TokenRule::new(
                ["product", "item"],
                [
                    ".inventory_item",
                    "[class*=\"inventory_item\"]",
                    ".inventory_item_description",
                ],
            )],
        }
    }
}

impl HeuristicGenerator {
    /// A generator with only the generic attribute patterns.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: TokenRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Ordered, de-duplicated candidates for `logical_name`.
    pub fn candidates(&self, logical_name: &str) -> Vec<String> {
        let key = logical_key(logical_name);
        if key.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(key))
            .flat_map(|rule| rule.selectors.iter().cloned())
            .collect();

        let quoted = escape_attr(key);
        candidates.extend([
            format!(".{key}"),
            format!("[class*=\"{quoted}\"]"),
            format!("[data-test*=\"{quoted}\"]"),
            format!("[name*=\"{quoted}\"]"),
            format!("[id*=\"{quoted}\"]"),
        ]);

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));
        candidates
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

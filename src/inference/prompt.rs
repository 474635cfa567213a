use crate::types::HealingRequest;
use regex::Regex;
use std::sync::OnceLock;

pub const SYSTEM_INSTRUCTION: &str = "You are a senior browser test automation engineer. \
Return ONLY a single stable locator string (CSS selector or text-based locator). \
Do not include any explanation or additional text, just the locator.";

pub fn user_prompt(request: &HealingRequest) -> String {
    format!(
        "Element intent: {name}\nCurrent URL: {url}\n\n\
         Find a stable locator for an element that matches the intent \"{name}\".\n\n\
         DOM:\n{dom}",
        name = request.logical_name,
        url = request.url,
        dom = request.dom,
    )
}

/// Instruction and request in one text block, for APIs without a system role.
pub fn single_prompt(request: &HealingRequest) -> String {
    format!("{SYSTEM_INSTRUCTION}\n\n{}", user_prompt(request))
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```$").expect("valid fence regex")
    })
}

/// Reduce a model answer to the bare selector, or `None` when nothing is left.
pub fn clean_selector(raw: &str) -> Option<String> {
    let mut answer = raw.trim();
    if let Some(captures) = fence_pattern().captures(answer) {
        answer = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    }
    let answer = strip_matching_quotes(answer).trim();
    if answer.is_empty() {
        None
    } else {
        Some(answer.to_string())
    }
}

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['`', '"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_request_fields() {
        let request = HealingRequest::new("cartPage.checkoutButton", "https://shop/cart", "<button/>");
        let prompt = user_prompt(&request);
        assert!(prompt.contains("Element intent: cartPage.checkoutButton"));
        assert!(prompt.contains("Current URL: https://shop/cart"));
        assert!(prompt.ends_with("DOM:\n<button/>"));
        assert!(single_prompt(&request).starts_with(SYSTEM_INSTRUCTION));
    }

    #[test]
    fn test_clean_selector() {
        assert_eq!(clean_selector("  #checkout \n").as_deref(), Some("#checkout"));
        assert_eq!(clean_selector("```css\nbutton[data-test='checkout']\n```").as_deref(), Some("button[data-test='checkout']"));
        assert_eq!(clean_selector("`.inventory_item`").as_deref(), Some(".inventory_item"));
        assert_eq!(clean_selector("\"#login-button\"").as_deref(), Some("#login-button"));
        assert_eq!(clean_selector("[name='q']").as_deref(), Some("[name='q']"));
        assert_eq!(clean_selector("   "), None);
        assert_eq!(clean_selector("``````"), None);
    }
}

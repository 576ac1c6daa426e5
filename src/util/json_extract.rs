//! Shared LLM response parsing (spec §6, §9): "a shared routine that scans
//! for the first balanced JSON object". Ported from the teacher's
//! `services/seed_selector.rs` markdown-fence stripping + balanced-brace
//! scanner, generalized for use by every pipeline stage that expects
//! structured LLM output.

/// Extract the first syntactically balanced `{...}` object from `text`,
/// stripping a surrounding ```json or ``` fence if present.
pub fn extract_first_json_object(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(stripped) = strip_markdown_fence(trimmed) {
        if let Some(obj) = find_json_object(&stripped) {
            return Some(obj);
        }
    }

    find_json_object(trimmed)
}

fn strip_markdown_fence(text: &str) -> Option<String> {
    let text = text.trim();
    if !text.starts_with("```") {
        return None;
    }
    let without_open = text.strip_prefix("```")?;
    let without_lang = without_open
        .strip_prefix("json")
        .unwrap_or(without_open)
        .trim_start_matches('\n');
    let end = without_lang.rfind("```")?;
    Some(without_lang[..end].to_string())
}

/// Balanced-brace scan, tracking string/escape state so braces inside JSON
/// string values don't throw off the depth count.
fn find_json_object(text: &str) -> Option<String> {
    let bytes: Vec<char> = text.chars().collect();
    let start = bytes.iter().position(|&c| c == '{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, &ch) in bytes[start..].iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(bytes[start..end].iter().collect());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the first balanced JSON object in `text` into `T`, returning `None`
/// on any parse or extraction failure. Callers treat `None` as a
/// `SchemaViolation` and fall back to the stage's rule-based path.
pub fn parse_first_json<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let candidate = extract_first_json_object(text)?;
    serde_json::from_str(&candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_object() {
        let text = r#"here you go: {"a": 1, "b": [1,2,3]} thanks"#;
        let obj = extract_first_json_object(text).unwrap();
        assert_eq!(obj, r#"{"a": 1, "b": [1,2,3]}"#);
    }

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        let obj = extract_first_json_object(text).unwrap();
        assert_eq!(obj, "{\"a\": 1}");
    }

    #[test]
    fn strips_plain_fence() {
        let text = "```\n{\"a\": 1}\n```";
        let obj = extract_first_json_object(text).unwrap();
        assert_eq!(obj, "{\"a\": 1}");
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = r#"{"msg": "not a {nested} brace", "n": 2}"#;
        let obj = extract_first_json_object(text).unwrap();
        assert_eq!(obj, text);
    }

    #[test]
    fn returns_none_for_unbalanced_input() {
        assert!(extract_first_json_object("no json here at all").is_none());
        assert!(extract_first_json_object("{\"a\": 1").is_none());
    }

    #[test]
    fn parses_into_typed_struct() {
        #[derive(serde::Deserialize)]
        struct Foo {
            a: i32,
        }
        let parsed: Foo = parse_first_json("blah blah {\"a\": 5} blah").unwrap();
        assert_eq!(parsed.a, 5);
    }
}

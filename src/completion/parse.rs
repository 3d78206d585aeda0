use super::StructuredOutput;

/// Decode a service reply into `T`, tolerating prose or a code fence around the JSON
pub fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T, String> {
    let json = extract_json(raw).ok_or_else(|| format!("no JSON in response: {}", preview(raw)))?;

    let value: T = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

fn preview(raw: &str) -> String {
    let flat: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 120 {
        format!("{}…", flat.chars().take(120).collect::<String>())
    } else {
        flat
    }
}

/// Extract a JSON object from a string that might contain markdown code blocks
pub fn extract_json(s: &str) -> Option<String> {
    // First try: the whole string is valid JSON
    let trimmed = s.trim();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Some(trimmed.to_string());
    }

    // Second try: extract from markdown code block
    let re = regex::Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let potential_json = cap.get(1)?.as_str().trim();
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    // Third try: first balanced object, skipping braces inside strings
    let brace_start = s.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = brace_start;

    for (i, c) in s[brace_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = brace_start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > brace_start {
        let potential_json = &s[brace_start..end];
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Dish {
        name: String,
        servings: u32,
    }

    impl StructuredOutput for Dish {
        fn validate(&self) -> Result<(), String> {
            if self.servings == 0 {
                return Err("servings must be positive".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn test_parse_direct_json() {
        let dish: Dish = parse_structured(r#"{"name": "Soup", "servings": 4}"#).unwrap();
        assert_eq!(dish.name, "Soup");
    }

    #[test]
    fn test_parse_markdown_wrapped() {
        let md = r#"
Here is the recipe:

```json
{"name": "Stew", "servings": 2}
```
"#;
        let dish: Dish = parse_structured(md).unwrap();
        assert_eq!(dish.servings, 2);
    }

    #[test]
    fn test_extract_skips_braces_in_strings() {
        let raw = r#"Sure! {"name": "Odd {brace", "servings": 1} trailing"#;
        assert_eq!(
            extract_json(raw).unwrap(),
            r#"{"name": "Odd {brace", "servings": 1}"#
        );
    }

    #[test]
    fn test_schema_mismatch_and_validation_fail() {
        assert!(parse_structured::<Dish>(r#"{"name": "Soup"}"#).is_err());
        assert!(parse_structured::<Dish>(r#"{"name": "Soup", "servings": 0}"#).is_err());
        assert!(parse_structured::<Dish>("I cannot help with that.").is_err());
    }
}

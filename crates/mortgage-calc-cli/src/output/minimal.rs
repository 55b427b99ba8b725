use serde_json::Value;

/// Headline figures, most important first.
const HEADLINE_KEYS: [&str; 3] = ["apr", "monthly_payment", "monthly_payment_with_fees"];

/// Print just the headline figure of a result envelope.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result = value.get("result").unwrap_or(value);

    if let Value::Object(map) = result {
        if let Some(val) = HEADLINE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|val| !val.is_null())
        {
            return format_minimal(val);
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apr_wins_over_payment() {
        let v = json!({ "result": { "monthly_payment": "599.55", "apr": "6.2272" } });
        assert_eq!(headline(&v), "6.2272");
    }

    #[test]
    fn test_payment_output_headline() {
        let v = json!({ "result": { "monthly_interest_rate": "0.005", "monthly_payment": "599.55" } });
        assert_eq!(headline(&v), "599.55");
    }

    #[test]
    fn test_falls_back_to_first_field() {
        let v = json!({ "result": { "other": 3 } });
        assert_eq!(headline(&v), "other: 3");
    }
}

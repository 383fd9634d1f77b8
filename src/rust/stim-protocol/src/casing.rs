// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde_json::{Map, Value};

/// Rename the keys of every object in a JSON graph with `conversion`.
///
/// Values are converted recursively; array order and scalars are untouched.
pub fn convert_protocol_casing<F>(input: Value, conversion: &F) -> Value
where
    F: Fn(&str) -> String,
{
    match input {
        Value::Object(map) => {
            let converted: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (conversion(&key), convert_protocol_casing(value, conversion)))
                .collect();
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert_protocol_casing(item, conversion))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// `phaseOneDuration` -> `phase_one_duration`.
///
/// Keys starting with an uppercase letter are not camelCase (e.g. well names
/// such as `A1`) and are returned unchanged.
pub fn camel_to_snake(key: &str) -> String {
    if !key.starts_with(|c: char| c.is_ascii_lowercase()) {
        return key.to_string();
    }
    let mut snake = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            snake.push('_');
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

/// `phase_one_duration` -> `phaseOneDuration`.
pub fn snake_to_camel(key: &str) -> String {
    let mut camel = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !camel.is_empty();
        } else if upper_next {
            camel.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            camel.push(c);
        }
    }
    camel
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_conversion() {
        assert_eq!(camel_to_snake("phaseOneDuration"), "phase_one_duration");
        assert_eq!(camel_to_snake("type"), "type");
        assert_eq!(camel_to_snake("A1"), "A1");
        assert_eq!(snake_to_camel("phase_one_duration"), "phaseOneDuration");
        assert_eq!(snake_to_camel("protocol_id"), "protocolId");
        assert_eq!(snake_to_camel("_private"), "private");
        assert_eq!(snake_to_camel("A1"), "A1");
    }

    #[test]
    fn test_convert_nested_graph() {
        let camel = json!({
            "protocolAssignments": {"A1": "A", "B1": null},
            "protocols": [{
                "protocol": {
                    "runUntilStopped": true,
                    "subprotocols": [
                        {"type": "Monophasic", "phaseOneDuration": 10, "numCycles": ""},
                        {"type": "Delay", "duration": 5}
                    ]
                }
            }]
        });
        let snake = convert_protocol_casing(camel.clone(), &camel_to_snake);
        assert_eq!(snake["protocol_assignments"]["A1"], "A");
        let first = &snake["protocols"][0]["protocol"]["subprotocols"][0];
        assert_eq!(first["phase_one_duration"], 10);
        assert_eq!(first["type"], "Monophasic");
        assert_eq!(
            snake["protocols"][0]["protocol"]["subprotocols"][1]["type"],
            "Delay"
        );

        let back = convert_protocol_casing(snake, &snake_to_camel);
        assert_eq!(back, camel);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(convert_protocol_casing(json!(3), &camel_to_snake), json!(3));
        assert_eq!(
            convert_protocol_casing(json!(["someValue"]), &camel_to_snake),
            json!(["someValue"])
        );
    }
}

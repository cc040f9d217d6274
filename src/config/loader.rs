//! Configuration loading.
//!
//! One JSON document is folded together from several sources and then
//! deserialized into [`Config`]. From weakest to strongest: compiled
//! defaults, `config.json` next to the executable, `config.json` in the
//! working directory, the file named by `ARCADIA_CONFIG_PATH`, JSON read
//! from stdin when `ARCADIA_CONFIG_STDIN` is truthy, inline JSON in
//! `ARCADIA_CONFIG_JSON`, and finally `ARCADIA__SECTION__FIELD`
//! environment overrides (`__` separates nesting, e.g.
//! `ARCADIA__LOBBY__PORT=8080`). A source that cannot be read or parsed is
//! reported on stderr and skipped.

use serde_json::{Map, Value};
use std::env;
use std::io::Read;
use std::path::PathBuf;

use super::Config;

const ENV_PREFIX: &str = "ARCADIA__";

#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut doc = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => Map::new(),
    };

    for (label, raw) in document_sources() {
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(overlay)) => merge_into(&mut doc, overlay),
            Ok(_) => eprintln!("config from {label} is not a JSON object, skipping"),
            Err(e) => eprintln!("config from {label} does not parse, skipping: {e}"),
        }
    }

    let mut doc = Value::Object(doc);
    for (segments, value) in env_overrides() {
        override_path(&mut doc, &segments, value);
    }

    serde_json::from_value(doc).unwrap_or_else(|e| {
        eprintln!("config did not deserialize, using defaults: {e}");
        defaults
    })
}

/// Raw JSON documents in merge order, weakest first.
fn document_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    let mut files: Vec<PathBuf> = Vec::new();
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            files.push(dir.join("config.json"));
        }
    }
    files.push(PathBuf::from("config.json"));
    if let Ok(path) = env::var("ARCADIA_CONFIG_PATH") {
        files.push(PathBuf::from(path));
    }
    for path in files {
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(raw) => sources.push((path.display().to_string(), raw)),
            Err(e) => eprintln!("cannot read config file {}: {e}", path.display()),
        }
    }

    if env::var("ARCADIA_CONFIG_STDIN").is_ok_and(|v| truthy(&v)) {
        let mut raw = String::new();
        match std::io::stdin().read_to_string(&mut raw) {
            Ok(_) if !raw.trim().is_empty() => sources.push(("stdin".to_string(), raw)),
            Ok(_) => {}
            Err(e) => eprintln!("cannot read config from stdin: {e}"),
        }
    }

    if let Ok(raw) = env::var("ARCADIA_CONFIG_JSON") {
        if !raw.trim().is_empty() {
            sources.push(("ARCADIA_CONFIG_JSON".to_string(), raw));
        }
    }

    sources
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Fold `overlay` into `base`: objects merge key by key, anything else
/// replaces what was there.
fn merge_into(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, incoming) in overlay {
        match base.get_mut(&key) {
            Some(Value::Object(existing)) if incoming.is_object() => {
                if let Value::Object(incoming) = incoming {
                    merge_into(existing, incoming);
                }
            }
            _ => {
                base.insert(key, incoming);
            }
        }
    }
}

/// Collect `ARCADIA__A__B=value` variables as (path, parsed value) pairs.
fn env_overrides() -> Vec<(Vec<String>, Value)> {
    let mut overrides = Vec::new();
    for (key, raw) in env::vars() {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = rest
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if !segments.is_empty() {
            overrides.push((segments, env_value(&raw)));
        }
    }
    overrides
}

/// Walk the object path, creating (or replacing) intermediate nodes, and
/// set the leaf.
fn override_path(doc: &mut Value, segments: &[String], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut cursor = doc;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        match cursor {
            Value::Object(map) => {
                cursor = map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            _ => return,
        }
    }

    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(leaf.clone(), value);
    }
}

/// Env values: comma lists become arrays; scalars become bool, number, or
/// string.
fn env_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.contains(',') {
        return Value::Array(raw.split(',').map(|part| scalar(part.trim())).collect());
    }
    scalar(raw)
}

fn scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = raw.parse::<i64>() {
                Value::from(int)
            } else if let Ok(float) = raw.parse::<f64>() {
                Value::from(float)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn overlay_objects_merge_and_scalars_replace() {
        let mut base = as_map(json!({"lobby": {"port": 7777, "host": "127.0.0.1"}}));
        merge_into(&mut base, as_map(json!({"lobby": {"port": 9000}, "extra": 1})));
        assert_eq!(base["lobby"]["port"], 9000);
        assert_eq!(base["lobby"]["host"], "127.0.0.1");
        assert_eq!(base["extra"], 1);
    }

    #[test]
    fn overlay_scalars_replace_whole_objects() {
        let mut base = as_map(json!({"lobby": {"port": 7777}}));
        merge_into(&mut base, as_map(json!({"lobby": "disabled"})));
        assert_eq!(base["lobby"], "disabled");
    }

    #[test]
    fn override_path_creates_missing_objects() {
        let mut doc = json!({});
        override_path(
            &mut doc,
            &["logging".to_string(), "level".to_string()],
            json!("debug"),
        );
        assert_eq!(doc["logging"]["level"], "debug");
    }

    #[test]
    fn override_path_replaces_scalars_mid_path() {
        let mut doc = json!({"logging": 5});
        override_path(
            &mut doc,
            &["logging".to_string(), "level".to_string()],
            json!("warn"),
        );
        assert_eq!(doc["logging"]["level"], "warn");
    }

    #[test]
    fn env_values_parse_scalars_and_lists() {
        assert_eq!(env_value("8080"), json!(8080));
        assert_eq!(env_value("true"), json!(true));
        assert_eq!(env_value("text"), json!("text"));
        assert_eq!(env_value("-3"), json!(-3));
        assert_eq!(env_value("tetris,--quiet"), json!(["tetris", "--quiet"]));
    }

    #[test]
    fn truthy_accepts_the_usual_spellings() {
        assert!(truthy("1"));
        assert!(truthy("Yes"));
        assert!(truthy(" true "));
        assert!(!truthy("0"));
        assert!(!truthy("off"));
    }
}

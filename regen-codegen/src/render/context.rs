//! Variables a template is rendered against

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CodegenError, Result};

/// Longest rendering of a single variable in an error snapshot
const SNAPSHOT_VALUE_LIMIT: usize = 120;
/// Longest error snapshot overall
const SNAPSHOT_LIMIT: usize = 2048;

/// Insertion-ordered template variables, built fresh for every template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    vars: IndexMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plain value, replacing any previous value under `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Insert any serializable value
    pub fn insert_serialize<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            CodegenError::ConfigError(format!("cannot expose `{}` to templates: {}", key, e))
        })?;
        self.vars.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add a `<key>_dir` variable for every dotted string value.
    ///
    /// `packageName = "com.example.app"` also yields
    /// `packageName_dir = "com/example/app"` for use in path segments.
    pub fn add_dir_values(&mut self) {
        let dirs: Vec<(String, Value)> = self
            .vars
            .iter()
            .filter_map(|(k, v)| {
                let s = v.as_str()?;
                s.contains('.')
                    .then(|| (format!("{}_dir", k), Value::String(s.replace('.', "/"))))
            })
            .collect();
        for (k, v) in dirs {
            self.vars.entry(k).or_insert(v);
        }
    }

    /// Bounded `key=value` listing for error reports
    pub fn snapshot(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, value)) in self.vars.iter().enumerate() {
            let mut rendered = value.to_string();
            if rendered.len() > SNAPSHOT_VALUE_LIMIT {
                let cut = (0..=SNAPSHOT_VALUE_LIMIT)
                    .rev()
                    .find(|&i| rendered.is_char_boundary(i))
                    .unwrap_or(0);
                rendered.truncate(cut);
                rendered.push_str("...");
            }
            let entry = format!("{}{}={}", if i > 0 { ", " } else { "" }, key, rendered);
            if out.len() + entry.len() > SNAPSHOT_LIMIT {
                out.push_str(", ...");
                break;
            }
            out.push_str(&entry);
        }
        out.push('}');
        out
    }

    /// Convert into a Tera context
    pub fn to_tera(&self) -> tera::Context {
        let mut context = tera::Context::new();
        for (key, value) in &self.vars {
            context.insert(key.as_str(), value);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut ctx = RenderContext::new();
        ctx.insert("b", 1);
        ctx.insert("a", "x");
        ctx.insert("b", 2);
        let keys: Vec<_> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(ctx.get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn test_dir_values() {
        let mut ctx = RenderContext::new();
        ctx.insert("packageName", "com.example.app");
        ctx.insert("systemName", "demo");
        ctx.add_dir_values();
        assert_eq!(
            ctx.get("packageName_dir").and_then(Value::as_str),
            Some("com/example/app")
        );
        assert!(ctx.get("systemName_dir").is_none());
    }

    #[test]
    fn test_snapshot_is_bounded() {
        let mut ctx = RenderContext::new();
        ctx.insert("long", "x".repeat(1000));
        ctx.insert("short", true);
        let snapshot = ctx.snapshot();
        assert!(snapshot.len() < 300);
        assert!(snapshot.contains("short=true"));
        assert!(snapshot.contains("..."));
    }

    #[test]
    fn test_insert_serialize() {
        #[derive(Serialize)]
        struct Entity {
            name: &'static str,
        }
        let mut ctx = RenderContext::new();
        ctx.insert_serialize("entity", &Entity { name: "user" }).unwrap();
        assert_eq!(ctx.get("entity").and_then(|v| v["name"].as_str()), Some("user"));
    }
}

use std::collections::BTreeMap;

use modkit_schema::ModuleManifest;

/// Replaces `${key}` placeholders in staged text files.
///
/// Unknown placeholders are left as written so that files carrying their own
/// `${...}` syntax (Terraform interpolation, shell snippets) survive staging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenReplacer {
    tokens: BTreeMap<String, String>,
}

impl TokenReplacer {
    /// Create an empty replacer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tokens for `manifest`, overlaid with `extra`.
    pub fn for_manifest(manifest: &ModuleManifest, extra: &BTreeMap<String, String>) -> Self {
        let mut replacer = Self::new();
        replacer.insert("namespace", manifest.namespace());
        replacer.insert("name", manifest.name());
        replacer.insert("version", manifest.version().to_string());
        replacer.insert("provider", manifest.provider().as_str());
        replacer.insert(
            "displayName",
            manifest.display_name().unwrap_or(manifest.name()),
        );
        replacer.insert("description", manifest.description().unwrap_or_default());
        for (key, value) in extra {
            replacer.insert(key, value);
        }
        replacer
    }

    /// Add or overwrite a token.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tokens.insert(key.into(), value.into());
    }

    /// Substitute every known `${key}` in `content`.
    pub fn replace(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let key = &after[..end];
            // An unclosed `${` before a complete placeholder stays literal.
            if let Some(inner) = key.find("${") {
                out.push_str(&rest[start..start + 2 + inner]);
                rest = &after[inner..];
                continue;
            }
            match self.tokens.get(key) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("${");
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

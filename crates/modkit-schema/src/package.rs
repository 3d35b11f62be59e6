//! Package descriptor (`module-package.json`) parsing.
//!
//! The descriptor lists the functions to build and the additional files to
//! stage for one provider variant of a module.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while resolving an entry of the `files` list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileSpecError {
    /// An object entry has no usable `src`.
    #[error("Invalid entry in 'files': object must specify a value for 'src'")]
    MissingSrc,

    /// The entry is neither a string nor an object.
    #[error("Invalid entry in 'files': value must be an object or a string, got {0}")]
    InvalidShape(&'static str),

    /// A known field has the wrong JSON type.
    #[error("Invalid entry in 'files': '{field}' must be {expected}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },

    /// `dest` escapes the staging folder.
    #[error("Invalid entry in 'files': dest '{0}' must be a relative path without '..'")]
    UnsafeDest(String),

    /// `src` reaches outside the provider folder.
    #[error("Invalid entry in 'files': src '{0}' must be a relative pattern without '..'")]
    UnsafeSrc(String),
}

/// One deployable function of a module package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Function name, unique within the package.
    pub name: String,
    /// Function kind (e.g. `api-handler`, `worker`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Provider-specific build parameters: every other key of the entry.
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl FunctionDescriptor {
    /// Look up a string build parameter.
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Package descriptor for one provider variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePackage {
    /// Functions to build, in declaration order.
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    /// Additional file entries, kept raw until packaging resolves them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Value>>,
    /// Extra substitution tokens for text files.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: BTreeMap<String, String>,
}

impl ModulePackage {
    /// Parse a package descriptor from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a function entry lacks
    /// `name` or `type`.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// A resolved entry of the `files` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalFileSpec {
    /// Bare glob: copied to the staging root, directories preserved.
    Pattern(String),
    /// Object form with an optional destination and flattening.
    Mapping {
        /// Source glob, relative to the provider folder.
        src: String,
        /// Destination subfolder of the staging root.
        dest: Option<String>,
        /// Drop directory components of matched paths.
        flatten: bool,
    },
}

impl AdditionalFileSpec {
    /// Resolve a raw `files` entry.
    ///
    /// # Errors
    ///
    /// Returns a [`FileSpecError`] for any shape other than a string or an
    /// object with a string `src`, for wrongly typed optional fields, and for
    /// a `src` or `dest` that is absolute or contains `..`.
    pub fn from_value(value: &Value) -> Result<Self, FileSpecError> {
        match value {
            Value::String(src) => {
                check_src(src)?;
                Ok(Self::Pattern(src.clone()))
            }
            Value::Object(entry) => {
                let src = match entry.get("src") {
                    Some(Value::String(src)) if !src.is_empty() => src.clone(),
                    None | Some(Value::Null) => return Err(FileSpecError::MissingSrc),
                    Some(Value::String(_)) => return Err(FileSpecError::MissingSrc),
                    Some(_) => {
                        return Err(FileSpecError::InvalidField {
                            field: "src",
                            expected: "a string",
                        });
                    }
                };
                check_src(&src)?;

                let dest = match entry.get("dest") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(dest)) => {
                        check_dest(dest)?;
                        Some(dest.clone())
                    }
                    Some(_) => {
                        return Err(FileSpecError::InvalidField {
                            field: "dest",
                            expected: "a string",
                        });
                    }
                };

                let flatten = match entry.get("flatten") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(flatten)) => *flatten,
                    Some(_) => {
                        return Err(FileSpecError::InvalidField {
                            field: "flatten",
                            expected: "a boolean",
                        });
                    }
                };

                Ok(Self::Mapping { src, dest, flatten })
            }
            Value::Null => Err(FileSpecError::InvalidShape("null")),
            Value::Bool(_) => Err(FileSpecError::InvalidShape("a boolean")),
            Value::Number(_) => Err(FileSpecError::InvalidShape("a number")),
            Value::Array(_) => Err(FileSpecError::InvalidShape("an array")),
        }
    }

    /// Source glob.
    pub fn src(&self) -> &str {
        match self {
            Self::Pattern(src) | Self::Mapping { src, .. } => src,
        }
    }

    /// Destination subfolder; empty for the staging root.
    pub fn dest(&self) -> &str {
        match self {
            Self::Pattern(_) => "",
            Self::Mapping { dest, .. } => dest.as_deref().unwrap_or(""),
        }
    }

    /// Whether matched paths are flattened to their file name.
    pub fn flatten(&self) -> bool {
        match self {
            Self::Pattern(_) => false,
            Self::Mapping { flatten, .. } => *flatten,
        }
    }
}

fn check_src(src: &str) -> Result<(), FileSpecError> {
    let escapes = Path::new(src)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(FileSpecError::UnsafeSrc(src.to_string()));
    }
    Ok(())
}

fn check_dest(dest: &str) -> Result<(), FileSpecError> {
    let path = Path::new(dest);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(FileSpecError::UnsafeDest(dest.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_entry() {
        let spec = AdditionalFileSpec::from_value(&json!("docs/*.md")).unwrap();
        assert_eq!(spec.src(), "docs/*.md");
        assert_eq!(spec.dest(), "");
        assert!(!spec.flatten());
    }

    #[test]
    fn test_object_entry_defaults() {
        let spec = AdditionalFileSpec::from_value(&json!({"src": "assets/**/*"})).unwrap();
        assert_eq!(
            spec,
            AdditionalFileSpec::Mapping {
                src: "assets/**/*".to_string(),
                dest: None,
                flatten: false,
            }
        );
        assert_eq!(spec.dest(), "");
    }

    #[test]
    fn test_object_entry_full() {
        let spec = AdditionalFileSpec::from_value(
            &json!({"src": "assets/**/*.json", "dest": "config", "flatten": true}),
        )
        .unwrap();
        assert_eq!(spec.src(), "assets/**/*.json");
        assert_eq!(spec.dest(), "config");
        assert!(spec.flatten());
    }

    #[test]
    fn test_object_without_src() {
        let err = AdditionalFileSpec::from_value(&json!({"dest": "config"})).unwrap_err();
        assert_eq!(err, FileSpecError::MissingSrc);

        let err = AdditionalFileSpec::from_value(&json!({"src": null})).unwrap_err();
        assert_eq!(err, FileSpecError::MissingSrc);
    }

    #[test]
    fn test_invalid_shapes() {
        for value in [json!(42), json!(true), json!(null), json!(["a"])] {
            let err = AdditionalFileSpec::from_value(&value).unwrap_err();
            assert!(matches!(err, FileSpecError::InvalidShape(_)), "{value}");
        }
    }

    #[test]
    fn test_wrongly_typed_fields() {
        let err = AdditionalFileSpec::from_value(&json!({"src": "a", "flatten": "yes"}))
            .unwrap_err();
        assert_eq!(
            err,
            FileSpecError::InvalidField {
                field: "flatten",
                expected: "a boolean"
            }
        );

        let err = AdditionalFileSpec::from_value(&json!({"src": 1})).unwrap_err();
        assert!(matches!(err, FileSpecError::InvalidField { field: "src", .. }));
    }

    #[test]
    fn test_dest_cannot_escape() {
        let err =
            AdditionalFileSpec::from_value(&json!({"src": "a", "dest": "../out"})).unwrap_err();
        assert_eq!(err, FileSpecError::UnsafeDest("../out".to_string()));

        let err = AdditionalFileSpec::from_value(&json!({"src": "a", "dest": "/etc"})).unwrap_err();
        assert!(matches!(err, FileSpecError::UnsafeDest(_)));
    }

    #[test]
    fn test_src_cannot_escape() {
        let err = AdditionalFileSpec::from_value(&json!("../shared/*.json")).unwrap_err();
        assert_eq!(err, FileSpecError::UnsafeSrc("../shared/*.json".to_string()));

        let err = AdditionalFileSpec::from_value(&json!({"src": "assets/../../x"})).unwrap_err();
        assert!(matches!(err, FileSpecError::UnsafeSrc(_)));

        let err = AdditionalFileSpec::from_value(&json!({"src": "/etc/*.conf"})).unwrap_err();
        assert!(matches!(err, FileSpecError::UnsafeSrc(_)));

        let spec = AdditionalFileSpec::from_value(&json!("./docs/*.md")).unwrap();
        assert_eq!(spec.src(), "./docs/*.md");
    }

    #[test]
    fn test_package_parse_keeps_build_parameters() {
        let package = ModulePackage::parse(
            r#"{
                "functions": [
                    {"name": "api", "type": "api-handler", "command": "make api", "output": "dist/api.zip"}
                ],
                "files": ["README.md", {"src": "assets/*"}],
                "tokens": {"stage": "prod"}
            }"#,
        )
        .unwrap();

        let function = &package.functions[0];
        assert_eq!(function.name, "api");
        assert_eq!(function.kind, "api-handler");
        assert_eq!(function.parameter_str("command"), Some("make api"));
        assert_eq!(function.parameter_str("output"), Some("dist/api.zip"));
        assert!(!function.parameters.contains_key("name"));
        assert_eq!(package.files.as_ref().map(Vec::len), Some(2));
        assert_eq!(package.tokens["stage"], "prod");
    }

    #[test]
    fn test_package_without_files() {
        let package = ModulePackage::parse(r#"{"functions": []}"#).unwrap();
        assert!(package.files.is_none());
        assert!(package.tokens.is_empty());
    }
}

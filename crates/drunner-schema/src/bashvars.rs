//! Line-oriented shell-variable record codec.
//!
//! Backup manifests and service variables files must stay readable both by
//! this tool and by shell scripts running inside a service's own container,
//! so the encoding is deliberately plain: one `KEY="value"` assignment per
//! line for scalars and `KEY=("a" "b")` for ordered lists, nothing nested.
//! One codec handles every file kind; the set of recognized keys and their
//! scalar/list shape is supplied as a schema rather than baked into
//! per-file subtypes.

use crate::SchemaError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    List,
}

/// One recognized key of a record kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
}

/// A keyed record with a fixed schema, serialized as shell assignments.
///
/// Keys not named by the schema are rejected on both read and write, so a
/// corrupted or foreign file fails loudly instead of round-tripping junk.
#[derive(Debug, Clone)]
pub struct BashRecord {
    schema: &'static [FieldSpec],
    scalars: HashMap<&'static str, String>,
    lists: HashMap<&'static str, Vec<String>>,
}

impl BashRecord {
    pub fn new(schema: &'static [FieldSpec]) -> Self {
        let mut scalars = HashMap::new();
        let mut lists = HashMap::new();
        for field in schema {
            match field.kind {
                FieldKind::Scalar => {
                    scalars.insert(field.key, String::new());
                }
                FieldKind::List => {
                    lists.insert(field.key, Vec::new());
                }
            }
        }
        Self {
            schema,
            scalars,
            lists,
        }
    }

    fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.schema.iter().find(|f| f.key == key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), SchemaError> {
        match self.field(key) {
            Some(f) if f.kind == FieldKind::Scalar => {
                self.scalars.insert(f.key, value.into());
                Ok(())
            }
            _ => Err(SchemaError::UnknownKey(key.to_owned())),
        }
    }

    pub fn set_list(&mut self, key: &str, values: Vec<String>) -> Result<(), SchemaError> {
        match self.field(key) {
            Some(f) if f.kind == FieldKind::List => {
                self.lists.insert(f.key, values);
                Ok(())
            }
            _ => Err(SchemaError::UnknownKey(key.to_owned())),
        }
    }

    pub fn get(&self, key: &str) -> &str {
        self.scalars.get(key).map_or("", String::as_str)
    }

    pub fn get_list(&self, key: &str) -> &[String] {
        self.lists.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn parse(schema: &'static [FieldSpec], text: &str) -> Result<Self, SchemaError> {
        let mut record = Self::new(schema);
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SchemaError::MalformedLine {
                    line: idx + 1,
                    reason: "expected KEY=value assignment".to_owned(),
                });
            };
            let key = key.trim();
            let Some(field) = record.field(key) else {
                // Tolerate keys from newer versions of the format; scripts
                // inside containers may append their own.
                continue;
            };
            match field.kind {
                FieldKind::Scalar => {
                    let v = unquote(value).ok_or_else(|| SchemaError::MalformedLine {
                        line: idx + 1,
                        reason: format!("unterminated quoted value for {key}"),
                    })?;
                    record.scalars.insert(field.key, v);
                }
                FieldKind::List => {
                    let inner = value
                        .trim()
                        .strip_prefix('(')
                        .and_then(|s| s.strip_suffix(')'))
                        .ok_or_else(|| SchemaError::MalformedLine {
                            line: idx + 1,
                            reason: format!("expected {key}=(...) list"),
                        })?;
                    record
                        .lists
                        .insert(field.key, parse_list_items(inner, idx + 1)?);
                }
            }
        }
        Ok(record)
    }

    pub fn read_file(
        schema: &'static [FieldSpec],
        path: impl AsRef<Path>,
    ) -> Result<Self, SchemaError> {
        let text = fs::read_to_string(path)?;
        Self::parse(schema, &text)
    }

    /// Render in schema order so the output is stable across runs.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for field in self.schema {
            match field.kind {
                FieldKind::Scalar => {
                    out.push_str(field.key);
                    out.push('=');
                    out.push_str(&quote(self.get(field.key)));
                    out.push('\n');
                }
                FieldKind::List => {
                    out.push_str(field.key);
                    out.push_str("=(");
                    let items: Vec<String> =
                        self.get_list(field.key).iter().map(|v| quote(v)).collect();
                    out.push_str(&items.join(" "));
                    out.push_str(")\n");
                }
            }
        }
        out
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn unquote(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn parse_list_items(inner: &str, line: usize) -> Result<Vec<String>, SchemaError> {
    let mut items = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        if !rest.starts_with('"') {
            return Err(SchemaError::MalformedLine {
                line,
                reason: "list items must be double-quoted".to_owned(),
            });
        }
        // Find the closing quote, honoring backslash escapes.
        let bytes = rest.as_bytes();
        let mut end = None;
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        let Some(end) = end else {
            return Err(SchemaError::MalformedLine {
                line,
                reason: "unterminated list item".to_owned(),
            });
        };
        let item =
            unquote(&rest[..=end]).ok_or_else(|| SchemaError::MalformedLine {
                line,
                reason: "unterminated list item".to_owned(),
            })?;
        items.push(item);
        rest = rest[end + 1..].trim_start();
    }
    Ok(items)
}

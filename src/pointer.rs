//! RFC 6901 JSON pointer resolution and mutation.
//!
//! Resolves `/`-rooted paths like "/payload/ecosystem_anon_id" against
//! in-memory JSON trees, with the write and delete operations the JWE
//! rewriter needs on top of plain lookup.

use serde_json::Value;

use crate::error::InvalidPointer;

/// A parsed JSON pointer.
///
/// Segments are stored unescaped (`~1` -> `/`, `~0` -> `~`). The empty
/// pointer addresses the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    raw: String,
    segments: Vec<String>,
}

impl JsonPointer {
    /// Parse a pointer string.
    ///
    /// # Examples
    /// ```
    /// use ingest_core::pointer::JsonPointer;
    /// let ptr = JsonPointer::parse("/ecosystem_anon_id").unwrap();
    /// assert_eq!(ptr.segments(), ["ecosystem_anon_id"]);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, InvalidPointer> {
        if raw.is_empty() {
            return Ok(Self {
                raw: String::new(),
                segments: Vec::new(),
            });
        }

        if !raw.starts_with('/') {
            return Err(InvalidPointer::new(raw, "pointer must start with '/'"));
        }

        let mut segments = Vec::new();
        for token in raw[1..].split('/') {
            segments.push(unescape(raw, token)?);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve the pointer to a node, if present.
    ///
    /// Returns `None` both for absent paths and for paths that continue
    /// past a leaf; absence is never an error on reads.
    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut current = doc;
        for segment in &self.segments {
            match current {
                Value::Object(obj) => current = obj.get(segment)?,
                Value::Array(arr) => {
                    let index = parse_index(segment)?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    /// Write `value` at the pointer path, creating missing intermediate
    /// object segments along the way.
    ///
    /// Fails with [`InvalidPointer`] when the path traverses into a
    /// scalar node or an array index is out of bounds (one past the end
    /// appends).
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<(), InvalidPointer> {
        if self.is_root() {
            *doc = value;
            return Ok(());
        }

        let (last, parents) = self.segments.split_last().expect("non-root pointer");
        let parent = self.descend_mut(doc, parents)?;

        match parent {
            Value::Object(obj) => {
                obj.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(arr) => {
                let index = parse_index(last)
                    .ok_or_else(|| InvalidPointer::new(&self.raw, "expected array index"))?;
                if index < arr.len() {
                    arr[index] = value;
                    Ok(())
                } else if index == arr.len() {
                    arr.push(value);
                    Ok(())
                } else {
                    Err(InvalidPointer::new(&self.raw, "array index out of bounds"))
                }
            }
            _ => Err(InvalidPointer::new(
                &self.raw,
                "path traverses into a scalar node",
            )),
        }
    }

    /// Delete the node at the pointer path, returning the removed value.
    ///
    /// An absent final segment is not an error (`Ok(None)`); traversal
    /// into a scalar still is.
    pub fn delete(&self, doc: &mut Value) -> Result<Option<Value>, InvalidPointer> {
        if self.is_root() {
            return Err(InvalidPointer::new(&self.raw, "cannot delete document root"));
        }

        let (last, parents) = self.segments.split_last().expect("non-root pointer");

        // Walk without creating anything; an absent parent means the
        // target is absent too.
        let mut current = &mut *doc;
        for segment in parents {
            match current {
                Value::Object(obj) => match obj.get_mut(segment) {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
                Value::Array(arr) => {
                    let Some(index) = parse_index(segment) else {
                        return Ok(None);
                    };
                    match arr.get_mut(index) {
                        Some(next) => current = next,
                        None => return Ok(None),
                    }
                }
                _ => {
                    return Err(InvalidPointer::new(
                        &self.raw,
                        "path traverses into a scalar node",
                    ))
                }
            }
        }

        match current {
            Value::Object(obj) => Ok(obj.remove(last)),
            Value::Array(arr) => match parse_index(last) {
                Some(index) if index < arr.len() => Ok(Some(arr.remove(index))),
                _ => Ok(None),
            },
            _ => Err(InvalidPointer::new(
                &self.raw,
                "path traverses into a scalar node",
            )),
        }
    }

    /// Walk to the parent of the final segment for writes, creating
    /// empty objects for missing object keys on the way down.
    fn descend_mut<'a>(
        &self,
        doc: &'a mut Value,
        parents: &[String],
    ) -> Result<&'a mut Value, InvalidPointer> {
        let mut current = doc;
        for segment in parents {
            match current {
                Value::Object(obj) => {
                    current = obj
                        .entry(segment.clone())
                        .or_insert_with(|| Value::Object(Default::default()));
                }
                Value::Array(arr) => {
                    let index = parse_index(segment)
                        .ok_or_else(|| InvalidPointer::new(&self.raw, "expected array index"))?;
                    current = arr.get_mut(index).ok_or_else(|| {
                        InvalidPointer::new(&self.raw, "array index out of bounds")
                    })?;
                }
                _ => {
                    return Err(InvalidPointer::new(
                        &self.raw,
                        "path traverses into a scalar node",
                    ))
                }
            }
        }
        Ok(current)
    }
}

impl std::fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Unescape a single reference token (`~1` -> `/`, then `~0` -> `~`).
fn unescape(pointer: &str, token: &str) -> Result<String, InvalidPointer> {
    if !token.contains('~') {
        return Ok(token.to_string());
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(InvalidPointer::new(
                    pointer,
                    "'~' must be followed by '0' or '1'",
                ))
            }
        }
    }
    Ok(out)
}

/// Array indices are non-negative integers without leading zeros.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_segments() {
        let ptr = JsonPointer::parse("/a/b/0").unwrap();
        assert_eq!(ptr.segments(), ["a", "b", "0"]);
        assert_eq!(ptr.as_str(), "/a/b/0");
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(JsonPointer::parse("a/b").is_err());
    }

    #[test]
    fn test_parse_unescapes() {
        let ptr = JsonPointer::parse("/a~1b/c~0d").unwrap();
        assert_eq!(ptr.segments(), ["a/b", "c~d"]);

        assert!(JsonPointer::parse("/bad~2escape").is_err());
    }

    #[test]
    fn test_get() {
        let doc = json!({"a": {"b": [1, 2, 3]}});
        let ptr = JsonPointer::parse("/a/b/1").unwrap();
        assert_eq!(ptr.get(&doc), Some(&json!(2)));

        let missing = JsonPointer::parse("/a/missing").unwrap();
        assert_eq!(missing.get(&doc), None);

        // Continuing past a leaf is absence on reads.
        let past_leaf = JsonPointer::parse("/a/b/0/deep").unwrap();
        assert_eq!(past_leaf.get(&doc), None);
    }

    #[test]
    fn test_get_root() {
        let doc = json!({"a": 1});
        let root = JsonPointer::parse("").unwrap();
        assert_eq!(root.get(&doc), Some(&doc));
    }

    #[test]
    fn test_set_top_level() {
        let mut doc = json!({"a": 1});
        let ptr = JsonPointer::parse("/b").unwrap();
        ptr.set(&mut doc, json!("x")).unwrap();
        assert_eq!(doc, json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut doc = json!({});
        let ptr = JsonPointer::parse("/a/b/c").unwrap();
        ptr.set(&mut doc, json!(7)).unwrap();
        assert_eq!(doc, json!({"a": {"b": {"c": 7}}}));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut doc = json!({"a": "leaf"});
        let ptr = JsonPointer::parse("/a/b").unwrap();
        assert!(ptr.set(&mut doc, json!(1)).is_err());
        assert_eq!(doc, json!({"a": "leaf"}));
    }

    #[test]
    fn test_set_array_element_and_append() {
        let mut doc = json!({"xs": [1, 2]});
        JsonPointer::parse("/xs/1")
            .unwrap()
            .set(&mut doc, json!(9))
            .unwrap();
        JsonPointer::parse("/xs/2")
            .unwrap()
            .set(&mut doc, json!(3))
            .unwrap();
        assert_eq!(doc, json!({"xs": [1, 9, 3]}));

        assert!(JsonPointer::parse("/xs/5")
            .unwrap()
            .set(&mut doc, json!(0))
            .is_err());
    }

    #[test]
    fn test_delete() {
        let mut doc = json!({"a": {"b": 1}, "keep": true});
        let removed = JsonPointer::parse("/a/b").unwrap().delete(&mut doc).unwrap();
        assert_eq!(removed, Some(json!(1)));
        assert_eq!(doc, json!({"a": {}, "keep": true}));
    }

    #[test]
    fn test_delete_absent_is_none() {
        let mut doc = json!({"a": 1});
        let removed = JsonPointer::parse("/missing/deep")
            .unwrap()
            .delete(&mut doc)
            .unwrap();
        assert_eq!(removed, None);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_delete_through_scalar_fails() {
        let mut doc = json!({"a": "leaf"});
        assert!(JsonPointer::parse("/a/b").unwrap().delete(&mut doc).is_err());
    }

    #[test]
    fn test_index_leading_zero_rejected() {
        let doc = json!({"xs": [1, 2, 3]});
        assert_eq!(JsonPointer::parse("/xs/01").unwrap().get(&doc), None);
        assert_eq!(JsonPointer::parse("/xs/0").unwrap().get(&doc), Some(&json!(1)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // set followed by get at the same path returns the value.
            #[test]
            fn set_then_get(key in "[a-z]{1,8}", nested in "[a-z]{1,8}", n in any::<i64>()) {
                let mut doc = json!({});
                let ptr = JsonPointer::parse(&format!("/{}/{}", key, nested)).unwrap();
                ptr.set(&mut doc, json!(n)).unwrap();
                prop_assert_eq!(ptr.get(&doc), Some(&json!(n)));
            }

            // delete after set removes exactly the written path.
            #[test]
            fn set_then_delete(key in "[a-z]{1,8}", n in any::<i64>()) {
                let mut doc = json!({"other": 1});
                let ptr = JsonPointer::parse(&format!("/{}", key)).unwrap();
                ptr.set(&mut doc, json!(n)).unwrap();
                let removed = ptr.delete(&mut doc).unwrap();
                prop_assert_eq!(removed, Some(json!(n)));
                prop_assert_eq!(ptr.get(&doc), None);
            }

            // escaping round-trips through parse.
            #[test]
            fn escaped_segments_round_trip(raw in "[a-z~/]{0,12}") {
                let escaped = raw.replace('~', "~0").replace('/', "~1");
                let ptr = JsonPointer::parse(&format!("/{}", escaped)).unwrap();
                prop_assert_eq!(ptr.segments().len(), 1);
                prop_assert_eq!(&ptr.segments()[0], &raw);
            }
        }
    }
}

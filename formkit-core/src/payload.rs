//! Key-path transport payload.
//!
//! [`serialize`] flattens nested values into an ordered list of
//! `(path, value)` entries, the layout used by multipart and urlencoded form
//! submissions:
//!
//! ```text
//! { "user": { "tags": ["a", "b"] }, "avatar": <blob>, "note": null }
//!
//! user[tags][0] = "a"
//! user[tags][1] = "b"
//! avatar        = <blob>
//! note          = ""
//! ```
//!
//! [`FormPayload::to_values`] is the receiving side's inverse.

use indexmap::IndexMap;

use crate::value::{Blob, FieldValue, Values};

/// Deepest key path rebuilt by [`FormPayload::to_values`]. Keys nested
/// deeper stay whole, as a single top-level name.
pub const MAX_KEY_DEPTH: usize = 32;

/// One payload entry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    /// Text entry.
    Text(String),
    /// Binary entry, sent as a file part.
    Blob(Blob),
}

impl PayloadValue {
    /// Text content, or `None` for blobs.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Blob(_) => None,
        }
    }
}

/// Flat, ordered, key-path encoded form data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    entries: Vec<(String, PayloadValue)>,
}

/// Flatten `values` into a transport payload.
#[must_use]
pub fn serialize(values: &Values) -> FormPayload {
    let mut payload = FormPayload::new();
    for (key, value) in values {
        append_value(&mut payload, key.clone(), value);
    }
    payload
}

fn append_value(payload: &mut FormPayload, key: String, value: &FieldValue) {
    match value {
        FieldValue::Null => payload.append_text(key, ""),
        FieldValue::Blob(blob) => payload.append_blob(key, blob.clone()),
        FieldValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                append_value(payload, format!("{key}[{index}]"), item);
            }
        }
        FieldValue::Object(entries) => {
            for (sub_key, item) in entries {
                append_value(payload, format!("{key}[{sub_key}]"), item);
            }
        }
        scalar => payload.append_text(key, scalar.to_form_string()),
    }
}

impl FormPayload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text entry.
    pub fn append_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries
            .push((key.into(), PayloadValue::Text(text.into())));
    }

    /// Append a binary entry.
    pub fn append_blob(&mut self, key: impl Into<String>, blob: Blob) {
        self.entries.push((key.into(), PayloadValue::Blob(blob)));
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Every value stored under `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&PayloadValue> {
        self.entries
            .iter()
            .filter_map(|(k, v)| (k == key).then_some(v))
            .collect()
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as `application/x-www-form-urlencoded`.
    ///
    /// Blob entries are encoded by file name.
    #[must_use]
    pub fn to_urlencoded(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.entries {
            match value {
                PayloadValue::Text(text) => serializer.append_pair(key, text),
                PayloadValue::Blob(blob) => serializer.append_pair(key, &blob.file_name),
            };
        }
        serializer.finish()
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut payload = Self::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            payload.append_text(key.into_owned(), value.into_owned());
        }
        payload
    }

    /// Rebuild nested values from key paths.
    ///
    /// `a[b][0]` becomes `{a: {b: [..]}}`; objects whose keys are exactly
    /// `0..n` become sequences. A key repeated at the same path collects its
    /// values into a sequence. Text leaves stay strings. Keys with more than
    /// [`MAX_KEY_DEPTH`] segments are not split.
    #[must_use]
    pub fn to_values(&self) -> Values {
        let mut root: IndexMap<String, Node> = IndexMap::new();
        for (key, value) in &self.entries {
            let leaf = match value {
                PayloadValue::Text(text) => FieldValue::String(text.clone()),
                PayloadValue::Blob(blob) => FieldValue::Blob(blob.clone()),
            };
            insert_path(&mut root, &parse_key_path(key), leaf);
        }
        root.into_iter()
            .map(|(key, node)| (key, node.into_value()))
            .collect()
    }

    /// Convert into a multipart form for `reqwest`.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn into_multipart(self) -> reqwest::multipart::Form {
        use reqwest::multipart::{Form, Part};

        self.entries
            .into_iter()
            .fold(Form::new(), |form, (key, value)| match value {
                PayloadValue::Text(text) => form.text(key, text),
                PayloadValue::Blob(blob) => {
                    let Blob {
                        file_name,
                        content_type,
                        bytes,
                    } = blob;
                    let part = Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(&content_type)
                        .unwrap_or_else(|e| {
                            tracing::warn!(error = %e, %content_type, "Invalid blob content type, sending without one");
                            Part::bytes(bytes).file_name(file_name)
                        });
                    form.part(key, part)
                }
            })
    }
}

impl<'a> IntoIterator for &'a FormPayload {
    type Item = &'a (String, PayloadValue);
    type IntoIter = std::slice::Iter<'a, (String, PayloadValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Split `a[b][0]` into `["a", "b", "0"]`. Malformed or overly deep keys
/// stay whole.
fn parse_key_path(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return vec![key.to_string()];
        };
        let Some(close) = inner.find(']') else {
            return vec![key.to_string()];
        };
        if segments.len() == MAX_KEY_DEPTH {
            tracing::debug!(depth = MAX_KEY_DEPTH, "Key path too deep, kept whole");
            return vec![key.to_string()];
        }
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }
    segments
}

#[derive(Debug)]
enum Node {
    Leaf(FieldValue),
    Branch(IndexMap<String, Node>),
}

impl Node {
    fn into_value(self) -> FieldValue {
        match self {
            Self::Leaf(value) => value,
            Self::Branch(children) => {
                let is_sequence = (0..children.len())
                    .all(|index| children.contains_key(index.to_string().as_str()));
                if is_sequence && !children.is_empty() {
                    let mut indexed: Vec<(usize, FieldValue)> = children
                        .into_iter()
                        .filter_map(|(k, node)| k.parse().ok().map(|i| (i, node.into_value())))
                        .collect();
                    indexed.sort_by_key(|(index, _)| *index);
                    FieldValue::Array(indexed.into_iter().map(|(_, v)| v).collect())
                } else {
                    FieldValue::Object(
                        children
                            .into_iter()
                            .map(|(k, node)| (k, node.into_value()))
                            .collect(),
                    )
                }
            }
        }
    }
}

fn insert_path(level: &mut IndexMap<String, Node>, path: &[String], leaf: FieldValue) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        match level.get_mut(head) {
            Some(Node::Leaf(FieldValue::Array(items))) => items.push(leaf),
            Some(Node::Leaf(existing)) => {
                let first = std::mem::take(existing);
                *existing = FieldValue::Array(vec![first, leaf]);
            }
            Some(Node::Branch(_)) | None => {
                level.insert(head.clone(), Node::Leaf(leaf));
            }
        }
        return;
    }

    let node = level
        .entry(head.clone())
        .or_insert_with(|| Node::Branch(IndexMap::new()));
    if matches!(node, Node::Leaf(_)) {
        *node = Node::Branch(IndexMap::new());
    }
    if let Node::Branch(children) = node {
        insert_path(children, rest, leaf);
    }
}

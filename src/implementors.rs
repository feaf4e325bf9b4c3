//! Interface-implementor records and their single-consumer delivery.
//!
//! Registrations are buffered until a consumer attaches. Attaching delivers the
//! buffered state once and switches the registry to push mode for good: every later
//! registration hands the consumer the full merged snapshot.
//!
//! Records live in per-package slots under each interface. Registering the same
//! package again for an interface overwrites its slot in place; a new package is
//! appended, so snapshots list implementors in first-registration order.

use crate::error::{AlreadyAttachedError, RecordError};
use crate::markup::to_plain_text;
use crate::shape::parse_shape;
use crate::types::TypeShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-package implementor payload: interface path → raw records.
///
/// Records stay untyped until decoding so one malformed record cannot reject its
/// neighbours.
pub type ImplementorPayload = BTreeMap<String, Vec<serde_json::Value>>;

/// Full registry state as delivered to the consumer: interface path → implementors.
pub type ImplementorSnapshot = BTreeMap<String, Vec<ImplementorEntry>>;

/// Callback receiving full snapshots.
pub type ImplementorConsumer = Box<dyn FnMut(&ImplementorSnapshot) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImplementorEntry {
    pub interface_path: String,
    pub implementing_type: TypeShape,
    /// The implementing type as written, e.g. `Chain<'a>`.
    pub implementing_type_text: String,
    /// `where` bounds, one expression each, e.g. `R: Reader + 'ctx`.
    pub generic_constraints: Vec<String>,
    pub source_package: String,
}

/// The accepted record encodings.
///
/// Variant order matters: a struct also deserializes from a JSON array, so the
/// tuple form has to be tried before the structured one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawImplementor {
    /// A rendered impl header such as `impl&lt;'a&gt; <a>Iterator</a> for <a>Chain</a>`.
    Rendered(String),
    /// rustdoc's `[header, ...]` tuple; only the header is used.
    Tuple(Vec<serde_json::Value>),
    /// `{"type": "Chain<'a>", "where": "R: Reader", "package": "anyhow"}`
    Record(ImplementorRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementorRecord {
    #[serde(rename = "type", alias = "implementing_type")]
    pub implementing_type: String,
    #[serde(default, rename = "where", alias = "generic_constraints")]
    pub constraints: Option<WhereClause>,
    #[serde(default, alias = "source_package")]
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereClause {
    Text(String),
    Bounds(Vec<String>),
}

impl WhereClause {
    fn into_bounds(self) -> Vec<String> {
        match self {
            Self::Text(text) => {
                let text = to_plain_text(&text);
                let text = strip_where_keyword(&text);
                split_top_level(text, ',')
            }
            Self::Bounds(bounds) => bounds
                .into_iter()
                .map(|bound| bound.trim().to_string())
                .filter(|bound| !bound.is_empty())
                .collect(),
        }
    }
}

impl RawImplementor {
    /// Decode into an entry for `interface`, defaulting the source to `package`.
    pub fn decode(self, interface: &str, package: &str) -> Result<ImplementorEntry, RecordError> {
        let (type_text, constraints, source) = match self {
            Self::Rendered(html) => {
                let (type_text, constraints) = parse_impl_header(&html)?;
                (type_text, constraints, None)
            }
            Self::Tuple(items) => match items.into_iter().next() {
                Some(serde_json::Value::String(html)) => {
                    let (type_text, constraints) = parse_impl_header(&html)?;
                    (type_text, constraints, None)
                }
                other => {
                    return Err(RecordError::Unrecognized(format!("{other:?}")));
                }
            },
            Self::Record(record) => (
                record.implementing_type.trim().to_string(),
                record.constraints.map(WhereClause::into_bounds).unwrap_or_default(),
                record.package,
            ),
        };

        Ok(ImplementorEntry {
            interface_path: interface.to_string(),
            implementing_type: parse_shape(&type_text)?,
            implementing_type_text: type_text,
            generic_constraints: constraints,
            source_package: source.unwrap_or_else(|| package.to_string()),
        })
    }
}

/// Split a rendered impl header into the implementing type and its `where` bounds.
fn parse_impl_header(html: &str) -> Result<(String, Vec<String>), RecordError> {
    let text = to_plain_text(html);
    let rest = text.strip_prefix("unsafe ").unwrap_or(&text);
    let rest = rest
        .strip_prefix("impl")
        .ok_or_else(|| RecordError::Unrecognized(text.clone()))?
        .trim_start();
    let rest = skip_generics(rest).ok_or_else(|| RecordError::Unbalanced(text.clone()))?;

    let for_at = top_level_indices(rest)
        .into_iter()
        .find(|&i| rest[i..].starts_with(" for "))
        .ok_or_else(|| RecordError::MissingFor(text.clone()))?;
    let after = &rest[for_at + " for ".len()..];

    let (type_text, clause) = match find_where(after) {
        Some(at) => (&after[..at], strip_where_keyword(&after[at..])),
        None => (after, ""),
    };

    Ok((type_text.trim().to_string(), split_top_level(clause, ',')))
}

/// Skip a leading `<...>` parameter list.
fn skip_generics(text: &str) -> Option<&str> {
    if !text.starts_with('<') {
        return Some(text);
    }
    let mut depth = 0usize;
    let mut prev = None;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' if prev == Some('-') => {}
            '>' | ')' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(text[i + 1..].trim_start());
                }
            }
            _ => {}
        }
        prev = Some(c);
    }
    None
}

/// Byte offsets of characters outside any `<>`, `()` or `[]` nesting.
fn top_level_indices(text: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut depth = 0usize;
    let mut prev = None;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' if prev == Some('-') => {}
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => indices.push(i),
            _ => {}
        }
        prev = Some(c);
    }
    indices
}

/// Offset of a top-level `where` keyword.
fn find_where(text: &str) -> Option<usize> {
    top_level_indices(text).into_iter().find(|&i| {
        let before_ok = text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && c != '_');
        let after = &text[i..];
        before_ok
            && after.starts_with("where")
            && after["where".len()..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace)
    })
}

fn strip_where_keyword(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("where").unwrap_or(text).trim()
}

fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    for i in top_level_indices(text) {
        if text[i..].starts_with(separator) {
            parts.push(&text[start..i]);
            start = i + separator.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

enum ConsumerState {
    Buffering,
    Attached(ImplementorConsumer),
}

/// Registry of implementor records with a single, one-shot consumer.
pub struct ImplementorRegistry {
    /// interface → (registering package, its entries), in first-registration order
    slots: BTreeMap<String, Vec<(String, Vec<ImplementorEntry>)>>,
    state: ConsumerState,
    deliveries: usize,
}

impl std::fmt::Debug for ImplementorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplementorRegistry")
            .field("interfaces", &self.slots.len())
            .field("entries", &self.len())
            .field("attached", &self.is_attached())
            .field("deliveries", &self.deliveries)
            .finish()
    }
}

impl Default for ImplementorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImplementorRegistry {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            state: ConsumerState::Buffering,
            deliveries: 0,
        }
    }

    /// Merge `package`'s records. Malformed records are dropped with a warning.
    ///
    /// Returns the number of accepted records. Once attached, the consumer receives
    /// the full snapshot before this returns.
    pub fn register(&mut self, package: &str, payload: &ImplementorPayload) -> usize {
        let mut accepted = 0;

        for (interface, records) in payload {
            let mut entries = Vec::with_capacity(records.len());
            for (position, value) in records.iter().enumerate() {
                let decoded = serde_json::from_value::<RawImplementor>(value.clone())
                    .map_err(|e| RecordError::Unrecognized(e.to_string()))
                    .and_then(|raw| raw.decode(interface, package));
                match decoded {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::warn!(
                        "Dropped implementor record {} of '{}' from '{}': {}",
                        position,
                        interface,
                        package,
                        e
                    ),
                }
            }
            accepted += entries.len();
            self.store(interface, package, entries);
        }

        tracing::debug!(
            "Registered {} implementor records from '{}' across {} interfaces",
            accepted,
            package,
            payload.len()
        );

        if matches!(self.state, ConsumerState::Attached(_)) {
            self.deliver();
        }
        accepted
    }

    fn store(&mut self, interface: &str, package: &str, entries: Vec<ImplementorEntry>) {
        let slots = self.slots.entry(interface.to_string()).or_default();
        if entries.is_empty() {
            slots.retain(|(owner, _)| owner != package);
        } else if let Some((_, existing)) = slots.iter_mut().find(|(owner, _)| owner == package) {
            *existing = entries;
        } else {
            slots.push((package.to_string(), entries));
        }
        if slots.is_empty() {
            self.slots.remove(interface);
        }
    }

    /// Attach the single consumer, delivering the buffered snapshot if there is one.
    pub fn attach(&mut self, consumer: ImplementorConsumer) -> Result<(), AlreadyAttachedError> {
        if self.is_attached() {
            tracing::warn!("Ignoring second implementor consumer attach");
            return Err(AlreadyAttachedError);
        }

        self.state = ConsumerState::Attached(consumer);
        if !self.slots.is_empty() {
            self.deliver();
        }
        tracing::info!("Implementor consumer attached ({} entries buffered)", self.len());
        Ok(())
    }

    fn deliver(&mut self) {
        let snapshot = self.snapshot();
        if let ConsumerState::Attached(consumer) = &mut self.state {
            consumer(&snapshot);
            self.deliveries += 1;
        }
    }

    /// Full merged state, as a consumer would receive it.
    pub fn snapshot(&self) -> ImplementorSnapshot {
        self.slots
            .iter()
            .map(|(interface, slots)| {
                let entries = slots
                    .iter()
                    .flat_map(|(_, entries)| entries.iter().cloned())
                    .collect();
                (interface.clone(), entries)
            })
            .collect()
    }

    /// Implementors of one interface, in snapshot order.
    pub fn implementors_of(&self, interface: &str) -> Vec<&ImplementorEntry> {
        self.slots
            .get(interface)
            .into_iter()
            .flatten()
            .flat_map(|(_, entries)| entries.iter())
            .collect()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, ConsumerState::Attached(_))
    }

    /// Number of snapshots handed to the consumer so far.
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    pub fn len(&self) -> usize {
        self.slots
            .values()
            .flatten()
            .map(|(_, entries)| entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const ADDR2LINE: &str = "impl&lt;'ctx, R&gt; <a class=\"trait\" href=\"trait.Iterator.html\">Iterator</a> for <a class=\"struct\" href=\"struct.LocationRangeIter.html\">LocationRangeIter</a>&lt;'ctx, R&gt;<span class=\"where fmt-newline\">where\n    R: <a class=\"trait\" href=\"trait.Reader.html\">Reader</a> + 'ctx,</span>";

    #[test]
    fn test_parse_rendered_header_with_where() {
        let_assert!(Ok((ty, bounds)) = parse_impl_header(ADDR2LINE));
        check!(ty == "LocationRangeIter<'ctx, R>");
        check!(bounds == vec!["R: Reader + 'ctx"]);
    }

    #[rstest]
    #[case("impl&lt;'a&gt; <a>Iterator</a> for <a>Chain</a>&lt;'a&gt;", "Chain<'a>", 0)]
    #[case("impl <a>Iterator</a> for <a>Bytes</a>", "Bytes", 0)]
    #[case("unsafe impl&lt;T: Send&gt; Send for Queue&lt;T&gt;", "Queue<T>", 0)]
    #[case("impl&lt;F: Fn() -&gt; T, T&gt; Iterator for FromFn&lt;F&gt; where F: Clone, T: Copy", "FromFn<F>", 2)]
    fn test_parse_rendered_headers(
        #[case] html: &str,
        #[case] expected_type: &str,
        #[case] bound_count: usize,
    ) {
        let_assert!(Ok((ty, bounds)) = parse_impl_header(html));
        check!(ty == expected_type);
        check!(bounds.len() == bound_count);
    }

    #[rstest]
    #[case("struct Foo")]
    #[case("impl&lt;T Iterator for Foo")]
    #[case("impl Iterator")]
    fn test_parse_rendered_header_errors(#[case] html: &str) {
        check!(parse_impl_header(html).is_err());
    }

    #[test]
    fn test_decode_structured_record() {
        let raw: RawImplementor = serde_json::from_value(json!({
            "type": "std::vec::IntoIter<T>",
            "where": "where T: Clone, A: Allocator",
        }))
        .unwrap();
        let_assert!(Ok(entry) = raw.decode("Iterator", "alloc"));
        check!(entry.implementing_type.to_string() == "IntoIter<T>");
        check!(entry.generic_constraints == vec!["T: Clone", "A: Allocator"]);
        check!(entry.source_package == "alloc");
    }

    #[test]
    fn test_decode_tuple_record() {
        let raw: RawImplementor =
            serde_json::from_value(json!([ "impl Iterator for Lines", false, [] ])).unwrap();
        let_assert!(Ok(entry) = raw.decode("Iterator", "std"));
        check!(entry.implementing_type_text == "Lines");
    }

    fn payload(interface: &str, records: &[serde_json::Value]) -> ImplementorPayload {
        BTreeMap::from([(interface.to_string(), records.to_vec())])
    }

    fn names(snapshot: &ImplementorSnapshot, interface: &str) -> Vec<String> {
        snapshot[interface]
            .iter()
            .map(|entry| entry.implementing_type_text.clone())
            .collect()
    }

    #[test]
    fn test_malformed_records_are_dropped_individually() {
        let mut registry = ImplementorRegistry::new();
        let accepted = registry.register(
            "pkg",
            &payload(
                "Iterator",
                &[json!("impl Iterator for Good"), json!(42), json!({"type": "Vec<"})],
            ),
        );
        check!(accepted == 1);
        check!(registry.len() == 1);
    }

    #[test]
    fn test_same_package_overwrites_its_slot() {
        let mut registry = ImplementorRegistry::new();
        registry.register("a", &payload("Iterator", &[json!({"type": "A1"})]));
        registry.register("b", &payload("Iterator", &[json!({"type": "B"})]));
        registry.register("a", &payload("Iterator", &[json!({"type": "A2"})]));
        check!(names(&registry.snapshot(), "Iterator") == vec!["A2", "B"]);
    }

    #[test]
    fn test_empty_reregistration_removes_the_slot() {
        let mut registry = ImplementorRegistry::new();
        registry.register("a", &payload("Iterator", &[json!({"type": "A"})]));
        registry.register("b", &payload("Clone", &[json!({"type": "B"})]));
        registry.register("a", &payload("Iterator", &[]));

        let snapshot = registry.snapshot();
        check!(!snapshot.contains_key("Iterator"));
        check!(names(&snapshot, "Clone") == vec!["B"]);

        registry.register("b", &payload("Clone", &[]));
        check!(registry.snapshot().is_empty());
        check!(registry.is_empty());
        check!(registry.len() == 0);

        let received: Arc<Mutex<Vec<ImplementorSnapshot>>> = Arc::default();
        let sink = Arc::clone(&received);
        let_assert!(
            Ok(()) = registry.attach(Box::new(move |snapshot: &ImplementorSnapshot| {
                sink.lock().unwrap().push(snapshot.clone());
            }))
        );
        check!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attach_delivers_buffer_then_every_update() {
        let received: Arc<Mutex<Vec<ImplementorSnapshot>>> = Arc::default();
        let sink = Arc::clone(&received);

        let mut registry = ImplementorRegistry::new();
        registry.register("smallvec", &payload("Iterator", &[json!({"type": "X"})]));
        registry.register("syn", &payload("Iterator", &[json!({"type": "Y"})]));
        check!(!registry.is_attached());

        let_assert!(
            Ok(()) = registry.attach(Box::new(move |snapshot: &ImplementorSnapshot| {
                sink.lock().unwrap().push(snapshot.clone());
            }))
        );
        check!(received.lock().unwrap().len() == 1);
        check!(names(&received.lock().unwrap()[0], "Iterator") == vec!["X", "Y"]);

        registry.register("anyhow", &payload("Iterator", &[json!({"type": "Z"})]));
        let deliveries = received.lock().unwrap();
        check!(deliveries.len() == 2);
        check!(names(&deliveries[1], "Iterator") == vec!["X", "Y", "Z"]);
        check!(registry.deliveries() == 2);
    }

    #[test]
    fn test_second_attach_is_rejected() {
        let count = Arc::new(Mutex::new(0));
        let first = Arc::clone(&count);

        let mut registry = ImplementorRegistry::new();
        check!(registry.attach(Box::new(move |_: &ImplementorSnapshot| {
            *first.lock().unwrap() += 1;
        })).is_ok());
        check!(*count.lock().unwrap() == 0);

        let_assert!(Err(AlreadyAttachedError) = registry.attach(Box::new(|_: &ImplementorSnapshot| {})));
        registry.register("pkg", &payload("Debug", &[json!({"type": "Foo"})]));
        check!(*count.lock().unwrap() == 1);
    }
}

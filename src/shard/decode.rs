//! Shard decoding: string-table expansion, validation, and record decoding.
//!
//! The stages are separate so a caller can validate a whole shard up front and then
//! decode its records in bounded chunks.

use super::payload::{RawString, ShardPayload};
use crate::error::SchemaError;
use crate::shape::parse_signature;
use crate::types::{ItemKind, Signature, SymbolEntry};
use std::ops::Range;

/// Expand backreferences into a flat list of strings.
pub fn decode_string_table(raw: &[RawString]) -> Result<Vec<String>, SchemaError> {
    let mut table: Vec<String> = Vec::with_capacity(raw.len());

    for (slot, cell) in raw.iter().enumerate() {
        let resolve = |back: u32| {
            (back as usize)
                .checked_sub(1)
                .and_then(|b| slot.checked_sub(b + 1))
                .map(|index| table[index].as_str())
                .ok_or(SchemaError::BadBackReference { slot, back })
        };

        let decoded = match cell {
            RawString::Literal(text) => text.clone(),
            RawString::Repeat(back) => resolve(*back)?.to_string(),
            RawString::Extend(back, suffix) => format!("{}{}", resolve(*back)?, suffix),
        };
        table.push(decoded);
    }

    Ok(table)
}

/// A validated shard, ready to decode into [`SymbolEntry`] values.
///
/// Construction performs every check, so [`decode_range`](Self::decode_range) cannot fail.
#[derive(Debug)]
pub struct ShardDecoder<'a> {
    package: &'a str,
    shard_index: u32,
    payload: &'a ShardPayload,
    strings: Vec<String>,
    kinds: Vec<ItemKind>,
    signatures: Vec<Option<Signature>>,
}

impl<'a> ShardDecoder<'a> {
    pub fn new(
        package: &'a str,
        shard_index: u32,
        payload: &'a ShardPayload,
    ) -> Result<Self, SchemaError> {
        let records = payload.len();
        check_column("kinds", records, payload.kinds.len())?;
        check_column("paths", records, payload.paths.len())?;
        check_column("descs", records, payload.descs.len())?;
        check_column("parents", records, payload.parents.len())?;
        if !payload.signatures.is_empty() {
            check_column("signatures", records, payload.signatures.len())?;
        }

        let strings = decode_string_table(&payload.strings)?;

        let in_table = |record: usize, column: &'static str, index: u32| {
            if (index as usize) < strings.len() {
                Ok(())
            } else {
                Err(SchemaError::StringIndexOutOfRange {
                    record,
                    column,
                    index,
                    len: strings.len(),
                })
            }
        };

        let mut kinds = Vec::with_capacity(records);
        for record in 0..records {
            in_table(record, "names", payload.names[record])?;
            in_table(record, "paths", payload.paths[record])?;
            in_table(record, "descs", payload.descs[record])?;

            let code = payload.kinds[record];
            kinds.push(ItemKind::from_code(code).ok_or(SchemaError::UnknownKind { record, code })?);

            if let Some(parent) = payload.parents[record]
                && (parent as usize >= records || parent as usize == record)
            {
                return Err(SchemaError::ParentOutOfRange { record, parent });
            }
        }

        let mut signatures = Vec::with_capacity(records);
        for (record, signature) in payload.signatures.iter().enumerate() {
            let decoded = match signature {
                Some(index) => {
                    in_table(record, "signatures", *index)?;
                    let text = &strings[*index as usize];
                    Some(parse_signature(text).map_err(|source| {
                        SchemaError::MalformedSignature { record, source }
                    })?)
                }
                None => None,
            };
            signatures.push(decoded);
        }

        Ok(Self {
            package,
            shard_index,
            payload,
            strings,
            kinds,
            signatures,
        })
    }

    /// Number of records in the shard.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// The decoded string table.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Decode records in `range`, clamped to the shard length.
    pub fn decode_range(&self, range: Range<usize>) -> Vec<SymbolEntry> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        (start..end).map(|record| self.decode(record)).collect()
    }

    fn decode(&self, record: usize) -> SymbolEntry {
        let payload = self.payload;
        let name = self.string(payload.names[record]).to_string();

        let path = match payload.parents[record] {
            Some(parent) => {
                let parent = parent as usize;
                let mut path = self.module_path(parent);
                path.push(self.string(payload.names[parent]).to_string());
                path
            }
            None => self.module_path(record),
        };

        SymbolEntry {
            id: record as u32,
            package: self.package.to_string(),
            shard_index: self.shard_index,
            path,
            name,
            kind: self.kinds[record],
            signature: self.signatures.get(record).cloned().flatten(),
            doc_summary: self.string(payload.descs[record]).to_string(),
            parent_id: payload.parents[record],
        }
    }

    fn string(&self, index: u32) -> &str {
        &self.strings[index as usize]
    }

    /// Module path segments of `record`; the crate root when the path is empty.
    fn module_path(&self, record: usize) -> Vec<String> {
        let text = self.string(self.payload.paths[record]);
        if text.is_empty() {
            return vec![self.package.to_string()];
        }
        text.split("::")
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect()
    }
}

const fn check_column(column: &'static str, expected: usize, found: usize) -> Result<(), SchemaError> {
    if expected == found {
        Ok(())
    } else {
        Err(SchemaError::LengthMismatch {
            column,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::payload::{RecordSpec, ShardBuilder};
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn lit(s: &str) -> RawString {
        RawString::Literal(s.to_string())
    }

    #[test]
    fn test_decode_string_table_backreferences() {
        let raw = vec![
            lit("rustc_utils::mir"),
            RawString::Extend(1, "::body".into()),
            lit("Extension trait for <code>Body</code>."),
            RawString::Repeat(1),
            RawString::Repeat(4),
        ];
        let_assert!(Ok(table) = decode_string_table(&raw));
        check!(
            table
                == vec![
                    "rustc_utils::mir",
                    "rustc_utils::mir::body",
                    "Extension trait for <code>Body</code>.",
                    "Extension trait for <code>Body</code>.",
                    "rustc_utils::mir",
                ]
        );
    }

    #[rstest]
    #[case(vec![RawString::Repeat(1)], 0, 1)]
    #[case(vec![lit("a"), RawString::Repeat(2)], 1, 2)]
    #[case(vec![lit("a"), RawString::Extend(0, "b".into())], 1, 0)]
    fn test_decode_string_table_rejects_bad_backref(
        #[case] raw: Vec<RawString>,
        #[case] slot: usize,
        #[case] back: u32,
    ) {
        let_assert!(Err(err) = decode_string_table(&raw));
        check!(err == SchemaError::BadBackReference { slot, back });
    }

    fn sample() -> ShardPayload {
        let mut builder = ShardBuilder::new();
        let body_ext = builder.push(
            RecordSpec::new("BodyExt", ItemKind::Interface, "rustc_utils::mir::body")
                .doc("Extension trait for <code>Body</code>."),
        );
        builder.push(
            RecordSpec::new("all_locations", ItemKind::Function, "rustc_utils::mir::body")
                .parent(body_ext)
                .signature("&Body -> Iterator<Location>")
                .doc("Returns an iterator over all the locations in a body."),
        );
        builder.push(RecordSpec::new("rustc_utils", ItemKind::Module, ""));
        builder.build()
    }

    #[test]
    fn test_decode_records() {
        let payload = sample();
        let_assert!(Ok(decoder) = ShardDecoder::new("rustc_utils", 2, &payload));
        let entries = decoder.decode_range(0..decoder.len());
        check!(entries.len() == 3);

        check!(entries[0].full_path() == "rustc_utils::mir::body::BodyExt");
        check!(entries[0].signature.is_none());

        let method = &entries[1];
        check!(method.id == 1);
        check!(method.shard_index == 2);
        check!(method.parent_id == Some(0));
        check!(method.full_path() == "rustc_utils::mir::body::BodyExt::all_locations");
        let_assert!(Some(signature) = &method.signature);
        check!(signature.params[0].name == "Body");
        check!(signature.ret.as_ref().map(|r| r.name.as_str()) == Some("Iterator"));

        check!(entries[2].path == vec!["rustc_utils".to_string()]);
    }

    #[test]
    fn test_decode_range_is_chunkable() {
        let payload = sample();
        let_assert!(Ok(decoder) = ShardDecoder::new("rustc_utils", 0, &payload));
        let mut chunked = decoder.decode_range(0..2);
        chunked.extend(decoder.decode_range(2..10));
        check!(chunked == decoder.decode_range(0..3));
        check!(decoder.decode_range(5..9).is_empty());
    }

    #[test]
    fn test_rejects_mismatched_columns() {
        let mut payload = sample();
        payload.descs.pop();
        let_assert!(Err(err) = ShardDecoder::new("rustc_utils", 0, &payload));
        check!(
            err == SchemaError::LengthMismatch {
                column: "descs",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut payload = sample();
        payload.kinds[2] = 9;
        let_assert!(Err(err) = ShardDecoder::new("rustc_utils", 0, &payload));
        check!(err == SchemaError::UnknownKind { record: 2, code: 9 });
    }

    #[rstest]
    #[case(Some(0))]
    #[case(Some(7))]
    fn test_rejects_bad_parent(#[case] parent: Option<u32>) {
        let mut payload = sample();
        payload.parents[0] = parent;
        let_assert!(Err(SchemaError::ParentOutOfRange { record: 0, .. }) =
            ShardDecoder::new("rustc_utils", 0, &payload));
    }

    #[test]
    fn test_rejects_out_of_range_string() {
        let mut payload = sample();
        payload.names[1] = 999;
        let_assert!(Err(SchemaError::StringIndexOutOfRange { record: 1, column: "names", .. }) =
            ShardDecoder::new("rustc_utils", 0, &payload));
    }

    #[test]
    fn test_rejects_malformed_signature() {
        let mut payload = sample();
        payload.strings.push(RawString::Literal("Vec<T ->".into()));
        payload.signatures[1] = Some(payload.strings.len() as u32 - 1);
        let_assert!(Err(SchemaError::MalformedSignature { record: 1, source }) =
            ShardDecoder::new("rustc_utils", 0, &payload));
        check!(source.position == 6);
    }
}

//! Binary parameter encoders (spec §4.4): every bound parameter is
//! transmitted as `paramFormat=1` (binary), so a `TEXT`/`BYTEA` column's
//! "binary format" on the wire is simply its UTF-8/raw bytes — the same
//! bytes the scratch buffer already holds, with no separate text-mode
//! escaping path needed (see DESIGN.md for why this departs from the
//! per-type text/binary split spec.md's table states).

use crate::util::MString;
use crate::value::OmlValue;
use bytes::BytesMut;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// Encodes `value` into `scratch`, growing it on demand (spec §9
/// "Scratch buffers per column"). Integers and doubles are fixed-width
/// big-endian; strings and blobs are copied verbatim; vectors are a
/// JSON array.
pub(crate) fn encode_into(value: &OmlValue, scratch: &mut MString) {
    scratch.clear();
    match value {
        OmlValue::Int32(v) => scratch.extend(&v.to_be_bytes()),
        OmlValue::Int64(v) => scratch.extend(&v.to_be_bytes()),
        // Widened to INT8 on the wire; the upper 32 bits are always
        // zero, matching the `UInt32 -> INT8` DDL widening.
        OmlValue::UInt32(v) => scratch.extend(&(*v as i64).to_be_bytes()),
        // BIGINT is a signed 64-bit column; the bit pattern round-trips
        // even though values above i64::MAX alias negative (spec §9
        // Open Question (a)).
        OmlValue::UInt64(v) => scratch.extend(&v.to_be_bytes()),
        OmlValue::Double(v) => scratch.extend(&v.to_bits().to_be_bytes()),
        OmlValue::Bool(v) => scratch.extend(&[*v as u8]),
        OmlValue::String(v) => scratch.extend(v.as_bytes()),
        OmlValue::Blob(v) => scratch.extend(v),
        OmlValue::Guid(v) => scratch.extend(&v.to_be_bytes()),
        OmlValue::VectorInt32(v) => scratch.extend(&json_bytes(v)),
        OmlValue::VectorUInt32(v) => scratch.extend(&json_bytes(v)),
        OmlValue::VectorInt64(v) => scratch.extend(&json_bytes(v)),
        OmlValue::VectorUInt64(v) => scratch.extend(&json_bytes(v)),
        OmlValue::VectorDouble(v) => scratch.extend(&json_bytes(v)),
        OmlValue::VectorBool(v) => scratch.extend(&json_bytes(v)),
    }
}

fn json_bytes<T: serde::Serialize>(v: &T) -> Vec<u8> {
    serde_json::to_vec(v).expect("vector value serialises to JSON")
}

/// A bound parameter whose bytes are already fully encoded. Wraps the
/// scratch-buffer contents so `tokio_postgres` can bind it without
/// re-deriving the wire encoding from a typed Rust value — the encoder
/// above already did that work (spec §4.3 "Execute the prepared
/// statement binding the N+4 parameter byte-spans").
pub(crate) struct RawParam(Vec<u8>);

impl RawParam {
    pub(crate) fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl ToSql for RawParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(&self.0);
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

//! Value encoding for cache keys and artifacts
//!
//! Values cross the codec boundary as `serde_json::Value`. Objects in that
//! model are key-sorted, so two maps with the same entries encode to the
//! same bytes regardless of the order they were built in.
//!
//! JSON has no spelling for NaN or the infinities and `serde_json` would
//! quietly store them as `null`, so capture refuses non-finite floats.

use crate::error::{StepCacheError, StepCacheResult};
use serde::de::DeserializeOwned;
use serde::ser::{self, Serialize};
use serde_json::Value;
use std::fmt;

/// Byte encoding strategy for artifacts and key material
pub trait Codec: Send + Sync {
    /// Encode a value to bytes
    fn encode(&self, value: &Value) -> StepCacheResult<Vec<u8>>;

    /// Decode bytes produced by [`Codec::encode`]
    fn decode(&self, bytes: &[u8]) -> StepCacheResult<Value>;

    /// File extension used for artifact keys (without the dot)
    fn extension(&self) -> &'static str;
}

/// Compact JSON codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> StepCacheResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> StepCacheResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Capture a value into the canonical model
pub(crate) fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Value, String> {
    value.serialize(FiniteFloats).map_err(|e| e.to_string())?;
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Rebuild a typed value from the canonical model
pub(crate) fn from_canonical<T: DeserializeOwned>(key: &str, value: Value) -> StepCacheResult<T> {
    serde_json::from_value(value).map_err(|e| StepCacheError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug)]
struct Rejected(String);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Rejected {}

impl ser::Error for Rejected {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        Self(msg.to_string())
    }
}

fn check_finite(v: f64) -> Result<(), Rejected> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(Rejected(format!("non-finite float {v} cannot be cached")))
    }
}

/// Serializer that walks a value and fails on NaN or an infinity
///
/// Produces nothing; everything that is not a float is accepted as is and
/// left for `serde_json` to judge.
struct FiniteFloats;

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _: $ty) -> Result<(), Rejected> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FiniteFloats {
    type Ok = ();
    type Error = Rejected;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_f32(self, v: f32) -> Result<(), Rejected> {
        check_finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Rejected> {
        check_finite(v)
    }

    fn serialize_none(self) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Rejected> {
        Ok(self)
    }
}

macro_rules! walk_elements {
    ($($trait:ident::$method:ident),* $(,)?) => {
        $(
            impl ser::$trait for FiniteFloats {
                type Ok = ();
                type Error = Rejected;

                fn $method<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Rejected> {
                    value.serialize(FiniteFloats)
                }

                fn end(self) -> Result<(), Rejected> {
                    Ok(())
                }
            }
        )*
    };
}

walk_elements!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

macro_rules! walk_fields {
    ($($trait:ident),* $(,)?) => {
        $(
            impl ser::$trait for FiniteFloats {
                type Ok = ();
                type Error = Rejected;

                fn serialize_field<T: Serialize + ?Sized>(
                    &mut self,
                    _key: &'static str,
                    value: &T,
                ) -> Result<(), Rejected> {
                    value.serialize(FiniteFloats)
                }

                fn end(self) -> Result<(), Rejected> {
                    Ok(())
                }
            }
        )*
    };
}

walk_fields!(SerializeStruct, SerializeStructVariant);

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = Rejected;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Rejected> {
        key.serialize(FiniteFloats)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(FiniteFloats)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

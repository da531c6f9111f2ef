//! ONNX attribute values and the keyword-parameter schemas implementations declare.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Attributes declared on a graph node, keyed by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Call-ready static arguments for one implementation. `None` marks a parameter the
/// node left unset and the schema gave no default for.
pub type AttrsDict = BTreeMap<String, Option<AttrValue>>;

/// A single attribute value. Floats compare and hash by bit pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Tensor(Tensor),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view; integer attributes widen.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttrValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            AttrValue::Floats(v) => Some(v),
            _ => None,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            AttrValue::Int(_) => 0,
            AttrValue::Float(_) => 1,
            AttrValue::String(_) => 2,
            AttrValue::Ints(_) => 3,
            AttrValue::Floats(_) => 4,
            AttrValue::Strings(_) => 5,
            AttrValue::Tensor(_) => 6,
        }
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Float(a), AttrValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttrValue::String(a), AttrValue::String(b)) => a == b,
            (AttrValue::Ints(a), AttrValue::Ints(b)) => a == b,
            (AttrValue::Floats(a), AttrValue::Floats(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (AttrValue::Strings(a), AttrValue::Strings(b)) => a == b,
            (AttrValue::Tensor(a), AttrValue::Tensor(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            AttrValue::Int(v) => v.hash(state),
            AttrValue::Float(v) => v.to_bits().hash(state),
            AttrValue::String(v) => v.hash(state),
            AttrValue::Ints(v) => v.hash(state),
            AttrValue::Floats(v) => {
                v.len().hash(state);
                for value in v {
                    value.to_bits().hash(state);
                }
            }
            AttrValue::Strings(v) => v.hash(state),
            AttrValue::Tensor(v) => v.hash(state),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v:?}"),
            AttrValue::String(v) => write!(f, "\"{v}\""),
            AttrValue::Ints(v) => write!(f, "{v:?}"),
            AttrValue::Floats(v) => write!(f, "{v:?}"),
            AttrValue::Strings(v) => write!(f, "{v:?}"),
            AttrValue::Tensor(t) => write!(f, "tensor<{:?} x {:?}>", t.dtype(), t.shape().dims()),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(value: Vec<i64>) -> Self {
        AttrValue::Ints(value)
    }
}

impl From<Vec<f32>> for AttrValue {
    fn from(value: Vec<f32>) -> Self {
        AttrValue::Floats(value)
    }
}

impl From<Tensor> for AttrValue {
    fn from(value: Tensor) -> Self {
        AttrValue::Tensor(value)
    }
}

/// Compile-time default for a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    None,
    Int(i64),
    Float(f32),
    Str(&'static str),
    Ints(&'static [i64]),
    Floats(&'static [f32]),
}

impl ParamDefault {
    pub fn to_value(self) -> Option<AttrValue> {
        match self {
            ParamDefault::None => None,
            ParamDefault::Int(v) => Some(AttrValue::Int(v)),
            ParamDefault::Float(v) => Some(AttrValue::Float(v)),
            ParamDefault::Str(v) => Some(AttrValue::String(v.to_string())),
            ParamDefault::Ints(v) => Some(AttrValue::Ints(v.to_vec())),
            ParamDefault::Floats(v) => Some(AttrValue::Floats(v.to_vec())),
        }
    }
}

/// One keyword parameter accepted by an implementation function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub default: ParamDefault,
}

impl Param {
    pub const fn new(name: &'static str, default: ParamDefault) -> Self {
        Param { name, default }
    }

    /// Parameter without a default.
    pub const fn required(name: &'static str) -> Self {
        Param {
            name,
            default: ParamDefault::None,
        }
    }
}

/// Ordered keyword parameters of an implementation.
pub type ParamSchema = &'static [Param];

/// Typed lookups into an [`AttrsDict`]. A present-but-`None` entry reads as missing.
pub trait AttrsDictExt {
    fn value(&self, name: &str) -> Option<&AttrValue>;

    fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(AttrValue::as_int)
    }

    fn float(&self, name: &str) -> Option<f32> {
        self.value(name).and_then(AttrValue::as_float)
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(AttrValue::as_str)
    }

    fn ints(&self, name: &str) -> Option<&[i64]> {
        self.value(name).and_then(AttrValue::as_ints)
    }

    fn floats(&self, name: &str) -> Option<&[f32]> {
        self.value(name).and_then(AttrValue::as_floats)
    }
}

impl AttrsDictExt for AttrsDict {
    fn value(&self, name: &str) -> Option<&AttrValue> {
        self.get(name).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::hashing::hash_value;

    #[test]
    fn float_attributes_hash_by_bits() {
        let a = AttrValue::Floats(vec![1.0, 2.5]);
        let b = AttrValue::Floats(vec![1.0, 2.5]);
        assert_eq!(a, b);
        assert_eq!(hash_value(&a), hash_value(&b));
        assert_ne!(AttrValue::Float(0.0), AttrValue::Float(-0.0));
    }

    #[test]
    fn int_and_float_variants_differ() {
        assert_ne!(AttrValue::Int(1), AttrValue::Float(1.0));
    }

    #[test]
    fn dict_lookup_skips_unset_entries() {
        let mut dict = AttrsDict::new();
        dict.insert("mode".into(), Some(AttrValue::from("linear")));
        dict.insert("axes".into(), None);
        assert_eq!(dict.string("mode"), Some("linear"));
        assert!(dict.ints("axes").is_none());
        assert!(dict.int("missing").is_none());
    }

    #[test]
    fn defaults_materialize() {
        assert_eq!(ParamDefault::None.to_value(), None);
        assert_eq!(
            ParamDefault::Str("half_pixel").to_value(),
            Some(AttrValue::String("half_pixel".into()))
        );
        assert_eq!(ParamDefault::Float(-0.75).to_value(), Some(AttrValue::Float(-0.75)));
    }
}

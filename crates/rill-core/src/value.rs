//! Tagged runtime value.
//!
//! A `Value` is 8 bytes of `Copy` data: a primitive payload or a typed
//! handle into the [`Heap`](crate::heap::Heap) arenas. Ownership is not
//! encoded in the type; retain/release bookkeeping happens at the points
//! where a value is stored into a register, global, array slot, or
//! upvalue cell.

use crate::heap::{Array, Closure, GcIdx, IterState};
use crate::string::StrId;

/// Identifier of a host-registered native function.
///
/// Natives live in the interpreter's registry for its whole lifetime, so
/// the handle carries no reference count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeId(pub u32);

/// A runtime value.
///
/// Equality is derived: values of different tags are never equal, and
/// heap kinds compare by handle identity. Handle identity is a sound
/// equality for strings because every string passes through the intern
/// table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    None,
    Array(GcIdx<Array>),
    Str(StrId),
    Closure(GcIdx<Closure>),
    Native(NativeId),
    /// Loop-internal iterator handle. The grammar cannot name one; it
    /// exists only between `ITER_NEW` and the loop exit.
    Iter(GcIdx<IterState>),
}

impl Value {
    /// `false`, `None`, and numeric zero are falsy; everything else
    /// (empty arrays and empty strings included) is truthy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::None => false,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            _ => true,
        }
    }

    #[inline]
    pub fn is_falsy(&self) -> bool {
        !self.is_truthy()
    }

    /// Returns true if this value is an `Int` or a `Float`.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns true if this value lives on the heap (participates in
    /// reference counting).
    #[inline]
    pub fn is_heap(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Str(_) | Value::Closure(_) | Value::Iter(_)
        )
    }

    #[inline]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric coercion: integers widen to `f32`, floats pass through.
    #[inline]
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Int(i) => Some(*i as f32),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The user-visible type name, as reported by `type_of`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "i32",
            Value::Float(_) => "f32",
            Value::Bool(_) => "bool",
            Value::None => "none",
            Value::Array(_) => "array",
            Value::Str(_) => "string",
            Value::Closure(_) | Value::Native(_) => "function",
            Value::Iter(_) => "iterator",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

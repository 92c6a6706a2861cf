//! The datatype system
//!
//! Only plain values travel between ranks. A Rust type takes part in communication if it
//! implements `Equivalence`; buffers are either a single value or a slice of such values.
//!
//! Arithmetic types additionally implement `Arithmetic`, which gives the built-in reduction
//! operations their meaning. All arithmetic wraps on overflow, so a reduction never panics.

/// Datatype traits
pub mod traits {
    pub use super::{Accumulate, Arithmetic, Buffer, BufferMut, Equivalence};
}

/// A Rust type that can be sent between ranks.
///
/// Values are moved by copy, so the type must be `Copy`; since ranks run on separate threads it
/// must also be `Send` and own all of its data.
pub trait Equivalence: Copy + Send + 'static {
    /// Name of the type, reported when a message does not carry the expected elements
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! equivalent_system_datatype {
    ($($rstype:ty),*) => (
        $(impl Equivalence for $rstype {})*
    )
}

equivalent_system_datatype!(bool, f32, f64);
equivalent_system_datatype!(i8, i16, i32, i64, isize);
equivalent_system_datatype!(u8, u16, u32, u64, usize);

/// Types the built-in reduction operations are defined on
pub trait Arithmetic: Equivalence + PartialOrd {
    /// Sum, wrapping on overflow
    fn sum(self, other: Self) -> Self;
    /// Product, wrapping on overflow
    fn product(self, other: Self) -> Self;
}

macro_rules! arithmetic_integer {
    ($($rstype:ty),*) => (
        $(impl Arithmetic for $rstype {
            fn sum(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
            fn product(self, other: Self) -> Self {
                self.wrapping_mul(other)
            }
        })*
    )
}

arithmetic_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Arithmetic for f32 {
    fn sum(self, other: Self) -> Self {
        self + other
    }
    fn product(self, other: Self) -> Self {
        self * other
    }
}

impl Arithmetic for f64 {
    fn sum(self, other: Self) -> Self {
        self + other
    }
    fn product(self, other: Self) -> Self {
        self * other
    }
}

/// An accumulator for summing `i32` array elements.
///
/// `i32` reproduces the narrow accumulator of a C `int`, `i64` widens it. Both wrap silently.
pub trait Accumulate: Arithmetic + Default + std::fmt::Display {
    /// Add one array element to the accumulator
    fn accumulate(self, element: i32) -> Self;
}

impl Accumulate for i32 {
    fn accumulate(self, element: i32) -> Self {
        self.wrapping_add(element)
    }
}

impl Accumulate for i64 {
    fn accumulate(self, element: i32) -> Self {
        self.wrapping_add(i64::from(element))
    }
}

/// A buffer is a region in memory that contains `count()` values of type `Item`.
pub trait Buffer {
    /// Element type of the buffer
    type Item: Equivalence;
    /// The contents of the buffer
    fn as_slice(&self) -> &[Self::Item];
    /// How many elements are in this buffer.
    fn count(&self) -> usize {
        self.as_slice().len()
    }
}

impl<T> Buffer for T
where
    T: Equivalence,
{
    type Item = T;
    fn as_slice(&self) -> &[T] {
        std::slice::from_ref(self)
    }
}

impl<T> Buffer for [T]
where
    T: Equivalence,
{
    type Item = T;
    fn as_slice(&self) -> &[T] {
        self
    }
}

/// A mutable buffer can be overwritten by an incoming message of exactly `count()` elements.
pub trait BufferMut: Buffer {
    /// The contents of the buffer, for writing
    fn as_mut_slice(&mut self) -> &mut [Self::Item];
}

impl<T> BufferMut for T
where
    T: Equivalence,
{
    fn as_mut_slice(&mut self) -> &mut [T] {
        std::slice::from_mut(self)
    }
}

impl<T> BufferMut for [T]
where
    T: Equivalence,
{
    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

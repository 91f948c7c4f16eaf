//! Modifier strategies: pure, content-identified value transforms.
//!
//! A modifier carries no owning reference and no mutable state. Its
//! identity for removal and lookup is a content hash: SHA-256 over the
//! stat tag name and a stable encoding of the operation, truncated to 64
//! bits. Two structurally equal operations always collide, so a caller
//! holding only "the `+5` speed modifier" can remove it without holding
//! the instance it applied.

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;

use sha2::{Digest, Sha256};

use crate::value::StatValue;

/// Compile-time marker tying a stat to its value type.
///
/// The tag is what distinguishes otherwise-identical stats (Speed vs.
/// Health, both `i32`): the router keys dispatch on the concrete
/// [`Modifier<K>`] type, and the tag name domain-separates content hashes.
///
/// ```
/// # use stat_engine::StatTag;
/// struct Speed;
/// impl StatTag for Speed {
///     type Value = i32;
///     const NAME: &'static str = "speed";
/// }
/// ```
pub trait StatTag: 'static {
    /// The numeric type this stat holds.
    type Value: StatValue;

    /// Stable name used for hash domain separation and diagnostics.
    const NAME: &'static str;
}

/// The pure transform a modifier applies to a value.
///
/// `Custom` transforms hash their explicit `id` rather than the function
/// pointer, so the hash stays stable across builds and never depends on a
/// closure environment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModifierOp<T> {
    /// Add the operand to the accumulator.
    Add(T),

    /// Multiply the accumulator by the operand.
    Mul(T),

    /// Replace the accumulator with the operand.
    Override(T),

    /// Arbitrary pure transform identified by a stable id.
    Custom {
        /// Stable identity; the only part of a custom transform that
        /// feeds the content hash.
        id: &'static str,
        /// The transform itself.
        apply: fn(T) -> T,
    },
}

impl<T: StatValue> ModifierOp<T> {
    /// Apply this operation to `value`.
    pub fn apply(&self, value: T) -> T {
        match self {
            Self::Add(operand) => value.add(*operand),
            Self::Mul(operand) => value.mul(*operand),
            Self::Override(operand) => *operand,
            Self::Custom { apply, .. } => apply(value),
        }
    }

    /// Append the stable encoding this operation hashes under.
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Add(operand) => {
                out.push(0x01);
                operand.encode(out);
            }
            Self::Mul(operand) => {
                out.push(0x02);
                operand.encode(out);
            }
            Self::Override(operand) => {
                out.push(0x03);
                operand.encode(out);
            }
            Self::Custom { id, .. } => {
                out.push(0x04);
                out.extend_from_slice(id.as_bytes());
            }
        }
    }
}

/// 64-bit content hash identifying a logical modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifierHash(pub u64);

impl fmt::Display for ModifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An immutable, content-identified modifier for the stat tagged `K`.
///
/// Modifiers are pure data passed by value; the hash is computed once at
/// construction.
pub struct Modifier<K: StatTag> {
    op: ModifierOp<K::Value>,
    hash: ModifierHash,
    _tag: PhantomData<fn() -> K>,
}

// Manual impls: deriving would demand `K: Clone`/`K: Copy`, but the tag is
// a phantom marker and never stored.
impl<K: StatTag> Clone for Modifier<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: StatTag> Copy for Modifier<K> {}

impl<K: StatTag> fmt::Debug for Modifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("tag", &K::NAME)
            .field("op", &self.op)
            .field("hash", &self.hash)
            .finish()
    }
}

impl<K: StatTag> Modifier<K> {
    /// Build a modifier from an operation, computing its content hash.
    pub fn new(op: ModifierOp<K::Value>) -> Self {
        let mut encoding = Vec::with_capacity(K::NAME.len() + 16);
        encoding.extend_from_slice(K::NAME.as_bytes());
        encoding.push(0x00);
        op.encode(&mut encoding);

        let digest = Sha256::digest(&encoding);
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);

        Self {
            op,
            hash: ModifierHash(u64::from_le_bytes(word)),
            _tag: PhantomData,
        }
    }

    /// `value + operand` modifier.
    pub fn add(operand: K::Value) -> Self {
        Self::new(ModifierOp::Add(operand))
    }

    /// `value × operand` modifier.
    pub fn mul(operand: K::Value) -> Self {
        Self::new(ModifierOp::Mul(operand))
    }

    /// Modifier that replaces the accumulator with a fixed value.
    pub fn override_with(operand: K::Value) -> Self {
        Self::new(ModifierOp::Override(operand))
    }

    /// Custom pure transform under a stable id.
    pub fn custom(id: &'static str, apply: fn(K::Value) -> K::Value) -> Self {
        Self::new(ModifierOp::Custom { id, apply })
    }

    /// Apply the transform to `value`.
    pub fn apply(&self, value: K::Value) -> K::Value {
        self.op.apply(value)
    }

    /// The content hash identifying this logical modifier.
    pub fn hash(&self) -> ModifierHash {
        self.hash
    }

    /// The underlying operation.
    pub fn op(&self) -> &ModifierOp<K::Value> {
        &self.op
    }
}

/// Type-erased modifier, the currency of the dispatch router.
///
/// A caller holding a `&dyn AnyModifier` can route it to an owner without
/// knowing which stat field (or whether any) accepts it.
pub trait AnyModifier: 'static {
    /// The modifier as `Any`, for concrete-type dispatch.
    fn as_any(&self) -> &dyn Any;

    /// The modifier's content hash.
    fn content_hash(&self) -> ModifierHash;

    /// The stat tag name this modifier targets, for diagnostics.
    fn tag_name(&self) -> &'static str;
}

impl<K: StatTag> AnyModifier for Modifier<K> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn content_hash(&self) -> ModifierHash {
        self.hash
    }

    fn tag_name(&self) -> &'static str {
        K::NAME
    }
}

//! Deterministic cache keys for repository calls.
//!
//! A fingerprint is the SHA-256 digest of the repository method name followed by every
//! argument in call order. Each part is written with a type tag and either a fixed width or a
//! length prefix, so the byte stream is unambiguous: `("ab", "c")` and `("a", "bc")`, the
//! integer `1` and the string `"1"`, or swapped arguments all produce different digests.

use std::fmt;

use sha2::{Digest, Sha256};
use uuid::Uuid;

const TAG_METHOD: u8 = b'm';
const TAG_SCOPE: u8 = b'g';
const TAG_SIGNED: u8 = b'i';
const TAG_UNSIGNED: u8 = b'u';
const TAG_STRING: u8 = b's';
const TAG_BOOL: u8 = b'b';
const TAG_UUID: u8 = b'x';
const TAG_NONE: u8 = b'n';
const TAG_SOME: u8 = b'o';

/// Hex encoded cache key of a repository call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Starts a fingerprint for the given method, e.g. `"OrderRepository::get"`
    pub fn new(method: &str) -> FingerprintBuilder {
        let mut builder = FingerprintBuilder {
            hasher: Sha256::new(),
        };
        builder.write_str(TAG_METHOD, method);
        builder
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulates the arguments of a fingerprint.
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    /// Appends the next argument
    pub fn arg<A: FingerprintArg + ?Sized>(mut self, arg: &A) -> Self {
        arg.write_to(&mut self);
        self
    }

    /// Folds a scope generation into the key, see [`CacheAside::scoped`](super::CacheAside::scoped)
    pub fn scope(mut self, generation: &str) -> Self {
        self.write_str(TAG_SCOPE, generation);
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.hasher.finalize()))
    }

    fn write_tag(&mut self, tag: u8) {
        self.hasher.update([tag]);
    }

    fn write_str(&mut self, tag: u8, value: &str) {
        self.write_tag(tag);
        self.hasher.update((value.len() as u64).to_be_bytes());
        self.hasher.update(value.as_bytes());
    }
}

/// Value usable as a fingerprint argument.
pub trait FingerprintArg {
    fn write_to(&self, builder: &mut FingerprintBuilder);
}

macro_rules! signed_arg {
    ($($ty:ty),*) => {
        $(impl FingerprintArg for $ty {
            fn write_to(&self, builder: &mut FingerprintBuilder) {
                builder.write_tag(TAG_SIGNED);
                builder.hasher.update((*self as i64).to_be_bytes());
            }
        })*
    };
}

macro_rules! unsigned_arg {
    ($($ty:ty),*) => {
        $(impl FingerprintArg for $ty {
            fn write_to(&self, builder: &mut FingerprintBuilder) {
                builder.write_tag(TAG_UNSIGNED);
                builder.hasher.update((*self as u64).to_be_bytes());
            }
        })*
    };
}

signed_arg!(i16, i32, i64);
unsigned_arg!(u16, u32, u64, usize);

impl FingerprintArg for str {
    fn write_to(&self, builder: &mut FingerprintBuilder) {
        builder.write_str(TAG_STRING, self);
    }
}

impl FingerprintArg for String {
    fn write_to(&self, builder: &mut FingerprintBuilder) {
        builder.write_str(TAG_STRING, self);
    }
}

impl FingerprintArg for bool {
    fn write_to(&self, builder: &mut FingerprintBuilder) {
        builder.write_tag(TAG_BOOL);
        builder.hasher.update([*self as u8]);
    }
}

impl FingerprintArg for Uuid {
    fn write_to(&self, builder: &mut FingerprintBuilder) {
        builder.write_tag(TAG_UUID);
        builder.hasher.update(self.as_bytes());
    }
}

impl<T: FingerprintArg> FingerprintArg for Option<T> {
    fn write_to(&self, builder: &mut FingerprintBuilder) {
        match self {
            Some(value) => {
                builder.write_tag(TAG_SOME);
                value.write_to(builder);
            }
            None => builder.write_tag(TAG_NONE),
        }
    }
}

//! Deterministic identity for linkable symbols.
//!
//! Compiled code refers to functions and fields through constant-pool
//! entries. The interpreter resolves those entries once, at load time, by
//! hashing them into a [`SymbolHash`] and looking the hash up in a table
//! built from the module's own entries and the runtime intrinsics.
//!
//! Functions hash owner, name and descriptor, so two entries that differ only
//! in signature never alias. Fields hash owner and name.
//!
//! ```
//! use choco_core::SymbolHash;
//!
//! let a = SymbolHash::function("demo/Main", "id", "(Lchoco/lang/Integer;)Lchoco/lang/Integer;");
//! let b = SymbolHash::function("demo/Main", "id", "(Lchoco/lang/Boolean;)Lchoco/lang/Boolean;");
//! assert_ne!(a, b);
//! assert_eq!(SymbolHash::field("demo/Main", "x"), SymbolHash::field("demo/Main", "x"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
///
/// Keep functions and fields with the same spelling from colliding.
pub mod hash_constants {
    /// Separator between owner, name and descriptor.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for function hashes
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for field hashes
    pub const FIELD: u64 = 0x1a095090689d4647;
}

/// A 64-bit hash identifying a function or field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolHash(pub u64);

impl SymbolHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: SymbolHash = SymbolHash(0);

    /// Hash of a callable entry.
    #[inline]
    pub fn function(owner: &str, name: &str, descriptor: &str) -> Self {
        let mut hash = hash_constants::FUNCTION ^ xxh64(owner.as_bytes(), 0);
        for part in [name, descriptor] {
            // wrapping_mul keeps the parts order-sensitive
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(xxh64(part.as_bytes(), 0));
        }
        SymbolHash(hash)
    }

    /// Hash of a storage field.
    #[inline]
    pub fn field(owner: &str, name: &str) -> Self {
        let hash = hash_constants::FIELD ^ xxh64(owner.as_bytes(), 0);
        SymbolHash(
            hash.wrapping_mul(hash_constants::SEP)
                .wrapping_add(xxh64(name.as_bytes(), 0)),
        )
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SymbolHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolHash({:#018x})", self.0)
    }
}

impl fmt::Display for SymbolHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

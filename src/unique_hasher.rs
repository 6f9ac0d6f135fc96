//! Pass-through hasher for items that carry a precomputed digest (`Name`, `Expr`, `Ptr`).
//!
//! Each of those types implements `Hash` with a single `write_u64` of its stored
//! digest, so the dag's index sets never rehash structure.

#[derive(Debug, Default)]
pub struct UniqueHasher {
    digest: Option<u64>,
}

impl UniqueHasher {
    pub const fn new() -> Self { Self { digest: None } }

    #[inline]
    pub fn set_digest(&mut self, val: u64) {
        debug_assert!(self.digest.is_none(), "UniqueHasher written twice");
        self.digest = Some(val);
    }
}

impl core::hash::Hasher for UniqueHasher {
    #[inline]
    fn finish(&self) -> u64 { self.digest.unwrap_or_default() }

    #[inline]
    fn write(&mut self, _: &[u8]) {
        panic!("UniqueHasher only accepts a precomputed u64 digest");
    }

    #[inline]
    fn write_u64(&mut self, i: u64) { self.set_digest(i); }
}

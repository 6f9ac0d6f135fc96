use crate::util::{Ctx, NamePtr, StringPtr};

pub(crate) const ANON_HASH: u64 = 1153;
pub(crate) const STR_HASH: u64 = 1163;
pub(crate) const NUM_HASH: u64 = 1171;

/// Hierarchical names (`List.cons`, `x.0`), hash-consed in the term dag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name {
    Anon,
    Str(NamePtr, StringPtr, u64),
    Num(NamePtr, u64, u64),
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

impl Name {
    pub fn get_hash(&self) -> u64 {
        match self {
            Name::Anon => ANON_HASH,
            Name::Str(_, _, hash) | Name::Num(_, _, hash) => *hash,
        }
    }
}

impl Ctx {
    /// The dot-separated rendering of a name, used in error messages and logs.
    pub fn name_to_string(&self, n: NamePtr) -> String { format!("{:?}", self.debug_print(n)) }

    /// The last string component of `n`, if it has one.
    pub fn name_last(&self, n: NamePtr) -> Option<&str> {
        match self.read_name(n) {
            Name::Str(_, sfx, _) => Some(self.read_string(sfx)),
            _ => None,
        }
    }
}

use crate::expr::{BinderStyle, Expr};
use crate::lift::config::LiftOptions;
use crate::name::Name;
use crate::ornament::DiscoveryOptions;
use crate::unique_hasher::UniqueHasher;
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigUint;
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fs::OpenOptions;
use std::hash::BuildHasherDefault;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

pub(crate) const fn default_true() -> bool { true }

pub(crate) type UniqueIndexSet<A> = IndexSet<A, BuildHasherDefault<UniqueHasher>>;
pub(crate) type FxIndexSet<A> = IndexSet<A, BuildHasherDefault<FxHasher>>;
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashSet<K> = HashSet<K, BuildHasherDefault<FxHasher>>;
pub(crate) type UniqueHashMap<K, V> = HashMap<K, V, BuildHasherDefault<UniqueHasher>>;

/// An integer pointer into the term dag owned by a [`Ctx`]. Items are hash-consed,
/// so two pointers of the same kind are equal iff the items they point to are
/// structurally identical.
pub struct Ptr<A> {
    /// The index in the appropriate dag at which this element sits.
    pub(crate) idx: u32,
    pub(crate) ph: PhantomData<fn() -> A>,
}

impl<A> Ptr<A> {
    pub(crate) fn from(idx: usize) -> Self {
        match u32::try_from(idx) {
            Ok(idx) => Self { idx, ph: PhantomData },
            Err(_) => panic!("term dag exceeded 2^32 elements"),
        }
    }

    pub(crate) fn idx(&self) -> usize { self.idx as usize }

    pub(crate) fn get_hash(&self) -> u64 { self.idx as u64 }
}

impl<A> Clone for Ptr<A> {
    fn clone(&self) -> Self { *self }
}

impl<A> Copy for Ptr<A> {}

impl<A> PartialEq for Ptr<A> {
    fn eq(&self, other: &Self) -> bool { self.idx == other.idx }
}

impl<A> Eq for Ptr<A> {}

impl<A> std::fmt::Debug for Ptr<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Ptr({})", self.idx) }
}

impl<A> std::hash::Hash for Ptr<A> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

pub type StringPtr = Ptr<String>;
pub type NamePtr = Ptr<Name>;
pub type ExprPtr = Ptr<Expr>;
pub type ExprsPtr = Ptr<Arc<[ExprPtr]>>;
pub type BigUintPtr = Ptr<BigUint>;

pub(crate) fn new_fx_index_map<K, V>() -> FxIndexMap<K, V> { FxIndexMap::with_hasher(Default::default()) }

pub(crate) fn new_fx_hash_map<K, V>() -> FxHashMap<K, V> { FxHashMap::with_hasher(Default::default()) }

pub(crate) fn new_fx_hash_set<K>() -> FxHashSet<K> { FxHashSet::with_hasher(Default::default()) }

pub(crate) fn new_fx_index_set<K>() -> FxIndexSet<K> { FxIndexSet::with_hasher(Default::default()) }

pub(crate) fn new_unique_index_set<K>() -> UniqueIndexSet<K> { UniqueIndexSet::with_hasher(Default::default()) }

pub(crate) fn new_unique_hash_map<K, V>() -> UniqueHashMap<K, V> { UniqueHashMap::with_hasher(Default::default()) }

/// Convenience macro for creating a 64 bit hash.
#[macro_export]
macro_rules! hash64 {
    ( $( $x:expr ),* ) => {
        {
            use std::hash::{ Hash, Hasher };
            let mut hasher = rustc_hash::FxHasher::default();
            $(
                ($x).hash(&mut hasher);
            )*
            hasher.finish()
        }
    };
}

/// From `in ctx; a, b, c, .., n`, create `app(app(app(a, b), c).. n)`
#[macro_export]
macro_rules! app {
    ( in $ctx:expr; $fun:expr, $arg:expr ) => {
        {
            $ctx.mk_app($fun, $arg)
        }
    };
    ( in $ctx:expr; $fun:expr, $arg:expr, $($tl:expr),*) => {
        {
            let mut base = $ctx.mk_app($fun, $arg);
            $(
                base = $ctx.mk_app(base, $tl);
            )*
            base
        }
    }
}

/// Create a non-dependent pi telescope `a -> b -> .. -> z` with anonymous binders.
/// No abstraction is performed.
#[macro_export]
macro_rules! arrow {
    ( in $ctx:expr; $dom:expr, $body:expr ) => {
        {
            let anon = $ctx.anonymous();
            let body = $ctx.lift_loose_bvars($body, 1);
            $ctx.mk_pi(anon, $crate::expr::BinderStyle::Default, $dom, body)
        }
    };
    ( in $ctx:expr; $dom:expr, $($tl:expr),* ) => {
        {
            let anon = $ctx.anonymous();
            let inner = $crate::arrow!(in $ctx; $($tl),*);
            let inner = $ctx.lift_loose_bvars(inner, 1);
            $ctx.mk_pi(anon, $crate::expr::BinderStyle::Default, $dom, inner)
        }
    }
}

pub struct ExprCache {
    /// Caches (e, offset) |-> output for instantiation. This cache is reset
    /// before every new call to `inst`, so there's no need to cache the sequence
    /// of substitutions.
    pub(crate) inst_cache: FxHashMap<(ExprPtr, u16), ExprPtr>,
    /// Caches (e, offset) |-> output for abstraction (re-binding free variables).
    /// Reset before every call to `abstr`.
    pub(crate) abstr_cache: FxHashMap<(ExprPtr, u16), ExprPtr>,
    /// Caches (e, offset) |-> output for shifting loose bound variables.
    pub(crate) shift_cache: FxHashMap<(ExprPtr, u16), ExprPtr>,
    /// Caches local substitution; reset before every call to `replace_locals`.
    pub(crate) replace_cache: UniqueHashMap<ExprPtr, ExprPtr>,
}

impl ExprCache {
    fn new() -> Self {
        Self {
            inst_cache: new_fx_hash_map(),
            abstr_cache: new_fx_hash_map(),
            shift_cache: new_fx_hash_map(),
            replace_cache: new_unique_hash_map(),
        }
    }
}

/// Storage for every `Name`, `Expr`, and auxiliary item created in a [`Ctx`].
#[derive(Debug)]
pub struct TermDag {
    pub names: UniqueIndexSet<Name>,
    pub exprs: UniqueIndexSet<Expr>,
    pub strings: FxIndexSet<String>,
    pub expr_lists: FxIndexSet<Arc<[ExprPtr]>>,
    pub bignums: FxIndexSet<BigUint>,
}

impl TermDag {
    /// The anonymous name always sits at position 0.
    pub fn new() -> Self {
        let mut out = Self {
            names: new_unique_index_set(),
            exprs: new_unique_index_set(),
            strings: new_fx_index_set(),
            expr_lists: new_fx_index_set(),
            bignums: new_fx_index_set(),
        };
        let _ = out.names.insert(Name::Anon);
        out
    }
}

impl Default for TermDag {
    fn default() -> Self { Self::new() }
}

/// Names the kernel and the ornament machinery look up frequently.
#[derive(Debug, Clone, Copy)]
pub struct NameCache {
    pub(crate) sigma: NamePtr,
    pub(crate) sigma_mk: NamePtr,
    pub(crate) sigma_rec: NamePtr,
    pub(crate) nat: NamePtr,
    pub(crate) nat_zero: NamePtr,
    pub(crate) nat_succ: NamePtr,
}

/// The memory context shared by every operation in this crate. All terms handed to
/// or returned from the public API live in the dag of one `Ctx`.
pub struct Ctx {
    pub(crate) dag: TermDag,
    /// Monotonically increasing counter for unique free variables. Any two free variables
    /// created with `mk_unique` are distinct within one `Ctx`.
    pub(crate) unique_counter: u32,
    /// A cache for instantiation, abstraction, and shifting.
    pub(crate) expr_cache: ExprCache,
    pub(crate) name_cache: NameCache,
}

impl Default for Ctx {
    fn default() -> Self { Self::new() }
}

impl Ctx {
    pub fn new() -> Self {
        let placeholder = Ptr::from(0);
        let mut ctx = Self {
            dag: TermDag::new(),
            unique_counter: 0u32,
            expr_cache: ExprCache::new(),
            name_cache: NameCache {
                sigma: placeholder,
                sigma_mk: placeholder,
                sigma_rec: placeholder,
                nat: placeholder,
                nat_zero: placeholder,
                nat_succ: placeholder,
            },
        };
        ctx.name_cache = NameCache {
            sigma: ctx.str1("Sigma"),
            sigma_mk: ctx.str2("Sigma", "mk"),
            sigma_rec: ctx.str2("Sigma", "rec"),
            nat: ctx.str1("Nat"),
            nat_zero: ctx.str2("Nat", "zero"),
            nat_succ: ctx.str2("Nat", "succ"),
        };
        ctx
    }

    pub fn read_name(&self, p: NamePtr) -> Name {
        match self.dag.names.get_index(p.idx()) {
            Some(n) => *n,
            None => panic!("dangling name pointer {:?}", p),
        }
    }

    pub fn read_expr(&self, p: ExprPtr) -> Expr {
        match self.dag.exprs.get_index(p.idx()) {
            Some(e) => *e,
            None => panic!("dangling expr pointer {:?}", p),
        }
    }

    /// Convenience function for reading two items as a tuple.
    pub fn read_expr_pair(&self, a: ExprPtr, x: ExprPtr) -> (Expr, Expr) { (self.read_expr(a), self.read_expr(x)) }

    pub fn read_string(&self, p: StringPtr) -> &str {
        match self.dag.strings.get_index(p.idx()) {
            Some(s) => s.as_str(),
            None => panic!("dangling string pointer {:?}", p),
        }
    }

    pub fn read_bignum(&self, p: BigUintPtr) -> &BigUint {
        match self.dag.bignums.get_index(p.idx()) {
            Some(n) => n,
            None => panic!("dangling bignum pointer {:?}", p),
        }
    }

    pub fn read_exprs(&self, p: ExprsPtr) -> Arc<[ExprPtr]> {
        match self.dag.expr_lists.get_index(p.idx()) {
            Some(es) => es.clone(),
            None => panic!("dangling expr list pointer {:?}", p),
        }
    }

    /// Store a `Name`, getting back a pointer to the allocated item. If the item was
    /// already stored, forego the allocation and return a pointer to the previously inserted
    /// element.
    pub fn alloc_name(&mut self, n: Name) -> NamePtr { Ptr::from(self.dag.names.insert_full(n).0) }

    /// Store an `Expr`, getting back a pointer to the allocated item. If the item was
    /// already stored, forego the allocation and return a pointer to the previously inserted
    /// element.
    pub fn alloc_expr(&mut self, e: Expr) -> ExprPtr { Ptr::from(self.dag.exprs.insert_full(e).0) }

    pub(crate) fn alloc_string(&mut self, s: &str) -> StringPtr {
        if let Some(idx) = self.dag.strings.get_index_of(s) {
            Ptr::from(idx)
        } else {
            Ptr::from(self.dag.strings.insert_full(s.to_owned()).0)
        }
    }

    /// Used for Nat literals.
    pub(crate) fn alloc_bignum(&mut self, n: BigUint) -> BigUintPtr { Ptr::from(self.dag.bignums.insert_full(n).0) }

    /// Store a sequence of expressions, probing with a slice before allocating.
    pub fn alloc_exprs(&mut self, es: &[ExprPtr]) -> ExprsPtr {
        if let Some(idx) = self.dag.expr_lists.get_index_of(es) {
            Ptr::from(idx)
        } else {
            Ptr::from(self.dag.expr_lists.insert_full(Arc::from(es)).0)
        }
    }

    /// A constructor for the anonymous name.
    pub fn anonymous(&self) -> NamePtr { Ptr::from(0) }

    pub fn str(&mut self, pfx: NamePtr, sfx: StringPtr) -> NamePtr {
        let hash = hash64!(crate::name::STR_HASH, pfx, sfx);
        self.alloc_name(Name::Str(pfx, sfx, hash))
    }

    pub fn num(&mut self, pfx: NamePtr, sfx: u64) -> NamePtr {
        let hash = hash64!(crate::name::NUM_HASH, pfx, sfx);
        self.alloc_name(Name::Num(pfx, sfx, hash))
    }

    /// Extend `pfx` with one string component, e.g. `List` to `List.rec`.
    pub fn str_ext(&mut self, pfx: NamePtr, s: &str) -> NamePtr {
        let s = self.alloc_string(s);
        self.str(pfx, s)
    }

    pub fn str1(&mut self, s: &str) -> NamePtr {
        let anon = self.anonymous();
        self.str_ext(anon, s)
    }

    pub fn str2(&mut self, s1: &str, s2: &str) -> NamePtr {
        let n = self.str1(s1);
        self.str_ext(n, s2)
    }

    /// Build a name from its dot-separated rendering; numeric components become `Name::Num`.
    pub fn name_of(&mut self, dot_separated_name: &str) -> NamePtr {
        let mut pfx = self.anonymous();
        for s in dot_separated_name.split('.') {
            pfx = match s.parse::<u64>() {
                Ok(num) => self.num(pfx, num),
                Err(_) => self.str_ext(pfx, s),
            };
        }
        pfx
    }

    pub fn mk_var(&mut self, dbj_idx: u16) -> ExprPtr {
        let hash = hash64!(crate::expr::VAR_HASH, dbj_idx);
        self.alloc_expr(Expr::Var { dbj_idx, hash })
    }

    pub fn mk_sort(&mut self, level: u32) -> ExprPtr {
        let hash = hash64!(crate::expr::SORT_HASH, level);
        self.alloc_expr(Expr::Sort { level, hash })
    }

    /// `Sort 0`
    pub fn prop(&mut self) -> ExprPtr { self.mk_sort(0) }

    /// `Sort 1`
    pub fn type0(&mut self) -> ExprPtr { self.mk_sort(1) }

    pub fn mk_const(&mut self, name: NamePtr) -> ExprPtr {
        let hash = hash64!(crate::expr::CONST_HASH, name);
        self.alloc_expr(Expr::Const { name, hash })
    }

    pub fn mk_app(&mut self, fun: ExprPtr, arg: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::APP_HASH, fun, arg);
        let num_loose_bvars = self.num_loose_bvars(fun).max(self.num_loose_bvars(arg));
        let has_fvars = self.has_fvars(fun) || self.has_fvars(arg);
        self.alloc_expr(Expr::App { fun, arg, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_lambda(
        &mut self,
        binder_name: NamePtr,
        binder_style: BinderStyle,
        binder_type: ExprPtr,
        body: ExprPtr,
    ) -> ExprPtr {
        let hash = hash64!(crate::expr::LAMBDA_HASH, binder_name, binder_style, binder_type, body);
        let num_loose_bvars = self.num_loose_bvars(binder_type).max(self.num_loose_bvars(body).saturating_sub(1));
        let has_fvars = self.has_fvars(binder_type) || self.has_fvars(body);
        self.alloc_expr(Expr::Lambda { binder_name, binder_style, binder_type, body, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_pi(&mut self, binder_name: NamePtr, binder_style: BinderStyle, binder_type: ExprPtr, body: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::PI_HASH, binder_name, binder_style, binder_type, body);
        let num_loose_bvars = self.num_loose_bvars(binder_type).max(self.num_loose_bvars(body).saturating_sub(1));
        let has_fvars = self.has_fvars(binder_type) || self.has_fvars(body);
        self.alloc_expr(Expr::Pi { binder_name, binder_style, binder_type, body, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_let(&mut self, binder_name: NamePtr, binder_type: ExprPtr, val: ExprPtr, body: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::LET_HASH, binder_name, binder_type, val, body);
        let num_loose_bvars = self
            .num_loose_bvars(binder_type)
            .max(self.num_loose_bvars(val).max(self.num_loose_bvars(body).saturating_sub(1)));
        let has_fvars = self.has_fvars(binder_type) || self.has_fvars(val) || self.has_fvars(body);
        self.alloc_expr(Expr::Let { binder_name, binder_type, val, body, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_proj(&mut self, ty_name: NamePtr, idx: usize, structure: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::PROJ_HASH, ty_name, idx, structure);
        let num_loose_bvars = self.num_loose_bvars(structure);
        let has_fvars = self.has_fvars(structure);
        self.alloc_expr(Expr::Proj { ty_name, idx, structure, num_loose_bvars, has_fvars, hash })
    }

    /// A case split on a value of the inductive `ind_name`. Branch `i` is a function
    /// of the (non-parameter) fields of the `i`th constructor.
    pub fn mk_case(&mut self, ind_name: NamePtr, motive: ExprPtr, scrutinee: ExprPtr, branches: &[ExprPtr]) -> ExprPtr {
        let branches_ptr = self.alloc_exprs(branches);
        let hash = hash64!(crate::expr::CASE_HASH, ind_name, motive, scrutinee, branches_ptr);
        let mut num_loose_bvars = self.num_loose_bvars(motive).max(self.num_loose_bvars(scrutinee));
        let mut has_fvars = self.has_fvars(motive) || self.has_fvars(scrutinee);
        for b in branches.iter().copied() {
            num_loose_bvars = num_loose_bvars.max(self.num_loose_bvars(b));
            has_fvars |= self.has_fvars(b);
        }
        self.alloc_expr(Expr::Case {
            ind_name,
            motive,
            scrutinee,
            branches: branches_ptr,
            num_loose_bvars,
            has_fvars,
            hash,
        })
    }

    /// A fixpoint `fix (f : binder_type) := body`, where `body` refers to `f` as `Var 0`
    /// and `rec_arg` is the position of the structurally decreasing argument.
    pub fn mk_fix(&mut self, binder_name: NamePtr, binder_type: ExprPtr, body: ExprPtr, rec_arg: u16) -> ExprPtr {
        let hash = hash64!(crate::expr::FIX_HASH, binder_name, binder_type, body, rec_arg);
        let num_loose_bvars = self.num_loose_bvars(binder_type).max(self.num_loose_bvars(body).saturating_sub(1));
        let has_fvars = self.has_fvars(binder_type) || self.has_fvars(body);
        self.alloc_expr(Expr::Fix { binder_name, binder_type, body, rec_arg, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_cofix(&mut self, binder_name: NamePtr, binder_type: ExprPtr, body: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::COFIX_HASH, binder_name, binder_type, body);
        let num_loose_bvars = self.num_loose_bvars(binder_type).max(self.num_loose_bvars(body).saturating_sub(1));
        let has_fvars = self.has_fvars(binder_type) || self.has_fvars(body);
        self.alloc_expr(Expr::CoFix { binder_name, binder_type, body, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_cast(&mut self, val: ExprPtr, ty: ExprPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::CAST_HASH, val, ty);
        let num_loose_bvars = self.num_loose_bvars(val).max(self.num_loose_bvars(ty));
        let has_fvars = self.has_fvars(val) || self.has_fvars(ty);
        self.alloc_expr(Expr::Cast { val, ty, num_loose_bvars, has_fvars, hash })
    }

    pub fn mk_nat_lit(&mut self, num_ptr: BigUintPtr) -> ExprPtr {
        let hash = hash64!(crate::expr::NAT_LIT_HASH, num_ptr);
        self.alloc_expr(Expr::NatLit { ptr: num_ptr, hash })
    }

    /// Shortcut to make an `Expr::NatLit` directly from a `BigUint`, rather than
    /// going `alloc_bignum` and `mk_nat_lit`
    pub fn mk_nat_lit_quick(&mut self, n: BigUint) -> ExprPtr {
        let num_ptr = self.alloc_bignum(n);
        self.mk_nat_lit(num_ptr)
    }

    /// Construct a free variable with a unique ID, incrementing the monotonic counter
    /// for unique free variable identifiers.
    pub fn mk_unique(&mut self, binder_name: NamePtr, binder_style: BinderStyle, binder_type: ExprPtr) -> ExprPtr {
        let id = self.unique_counter;
        self.unique_counter += 1;
        let hash = hash64!(crate::expr::LOCAL_HASH, binder_name, binder_style, binder_type, id);
        self.alloc_expr(Expr::Local { binder_name, binder_style, binder_type, id, hash })
    }

    /// `mk_unique` with a default binder style and a fresh string name.
    pub fn mk_local(&mut self, name: &str, binder_type: ExprPtr) -> ExprPtr {
        let n = self.str1(name);
        self.mk_unique(n, BinderStyle::Default, binder_type)
    }
}

/// Execution options for discovery and lifting, loadable from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Dot-separated names of global references the lifting engine must leave untouched.
    #[serde(default)]
    pub opaque: Vec<String>,

    /// If `true`, the first confirmed index position (outer to inner) is taken when several
    /// positions qualify. If `false`, several confirmed positions are an `AmbiguousIndex` error.
    #[serde(default = "default_true")]
    pub first_candidate_wins: bool,

    /// Re-wrap lifted subterms whose type is packed but whose form is not.
    #[serde(default = "default_true")]
    pub repack: bool,

    /// Promote context-free cache entries into a `LiftStore` after each request.
    #[serde(default)]
    pub retain_cache: bool,

    /// Eta-expand under-applied type formers, constructors and eliminators before lifting.
    #[serde(default = "default_true")]
    pub eta_expand: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { opaque: Vec::new(), first_candidate_wins: true, repack: true, retain_cache: false, eta_expand: true }
    }
}

impl TryFrom<&Path> for Config {
    type Error = Box<dyn Error>;
    fn try_from(p: &Path) -> Result<Config, Self::Error> {
        match OpenOptions::new().read(true).truncate(false).open(p) {
            Err(e) => Err(Box::from(format!("failed to open configuration file: {:?}", e))),
            Ok(config_file) => {
                let config = serde_json::from_reader::<_, Config>(BufReader::new(config_file))?;
                config.validate()?;
                Ok(config)
            }
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Config, Box<dyn Error>> {
        let config = serde_json::from_str::<Config>(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if let Some(bad) = self.opaque.iter().find(|s| s.is_empty() || s.split('.').any(str::is_empty)) {
            return Err(Box::from(format!("malformed opaque name {:?}", bad)))
        }
        Ok(())
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions { first_candidate_wins: self.first_candidate_wins }
    }

    pub fn lift_options(&self) -> LiftOptions {
        LiftOptions { repack: self.repack, eta_expand: self.eta_expand, retain_cache: self.retain_cache }
    }

    pub fn opaque_names(&self, ctx: &mut Ctx) -> Vec<NamePtr> { self.opaque.iter().map(|s| ctx.name_of(s)).collect() }
}

//! Ornaments: relating an algebraic type to a refinement of it that carries one more
//! index, and moving terms across that relation.
//!
//! ```ignore
//! let mut ctx = Ctx::new();
//! let mut env = Env::new();
//! pack::add_sigma(&mut ctx, &mut env)?;
//! // declare `List` and `Vec` ...
//! let corr = ornament::discover(&mut ctx, &env, list, vec, &DiscoveryOptions::default())?;
//! let mut config = lift::initialize_lifting_configuration(&corr, Direction::Forward, &[]);
//! let lifted = lift::lift(&mut ctx, &env, &mut config, term)?;
//! ```
#![allow(clippy::too_many_arguments)]

pub mod debug_printer;
pub mod env;
pub mod errors;
pub mod expr;
pub mod inductive;
pub mod introspect;
pub mod lift;
pub mod name;
pub mod ornament;
pub mod pack;
pub mod tc;
#[cfg(test)]
mod tests;
pub mod unique_hasher;
pub mod util;

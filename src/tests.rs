mod config;
mod kernel;
mod records;
pub(crate) mod util;

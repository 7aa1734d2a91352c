mod error;
mod symbols;
mod model;
mod limits;

pub use error::*;
pub use symbols::*;
pub use model::*;
pub use limits::*;


/// Longest supported model (CSSD) string, in columns.
pub const MAX_MODEL_STRING_LEN: usize = 200;

/// Element Column COUNT: we use `u8`, which is plenty because a model string
/// is capped at `MAX_MODEL_STRING_LEN` columns and a positional variable can
/// stretch a run by at most `MAX_POS_VAR` extra columns.
pub type ECOUNT = u8;

/// Compile-time sanity check: the longest literal run plus the largest
/// positional variable must fit into `ECOUNT`.
const _: () = {
    assert!(MAX_MODEL_STRING_LEN + MAX_POS_VAR as usize <= ECOUNT::MAX as usize);
};

//! DQL helpers for casegate
//!
//! Two concerns live here:
//! - [`rewrite`]: normalising caller-supplied statements so every result row
//!   carries the object identifier and the repository is asked for a bounded
//!   number of rows (`ENABLE(RETURN_TOP n)`),
//! - [`statement`]: the fixed statements behind case, group, user-profile and
//!   workflow lookups.
//!
//! Nothing in this crate performs I/O.

pub mod rewrite;
pub mod statement;

pub use rewrite::{
    rewrite, Query, QueryRewriter, QueryShape, RequiredColumns, DEFAULT_RETURN_TOP,
    IDENTIFIER_COLUMN, OBJECT_TYPE_COLUMN,
};
pub use statement::{escape_literal, CaseFilter};

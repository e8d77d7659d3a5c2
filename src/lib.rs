//! Hybrid semantic and lexical retrieval with LLM reranking, in a strictly linted crate.

// Forbidden practices
#![deny(unsafe_code)] // unsafe is opt-in per item (sqlite-vec registration only)
#![deny(missing_docs)]
#![warn(dead_code)]
#![deny(non_camel_case_types)]
#![warn(unused_imports)]
#![warn(unused_variables)]
#![deny(unused_must_use)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![deny(overflowing_literals)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::float_cmp,
        clippy::missing_const_for_fn,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation
    )
)]

/// Operator command line (argument parsing and command dispatch).
pub mod cli;
/// Document indexing, hybrid search, and reranking.
pub mod knowledge;

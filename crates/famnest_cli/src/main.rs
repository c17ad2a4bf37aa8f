//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `famnest_core` linkage.
//! - Print the full permission decision table so UI gating and storage
//!   enforcement can be diffed against one deterministic listing.

use famnest_core::decision_table;

fn main() {
    println!("famnest_core ping={}", famnest_core::ping());
    println!("famnest_core version={}", famnest_core::core_version());
    for row in decision_table() {
        println!("{row}");
    }
}

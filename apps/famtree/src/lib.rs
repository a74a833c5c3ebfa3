//! # famtree
//!
//! Command-line front end for [`famtree_core`]. This crate owns everything
//! the core leaves out: argument parsing, the optional `famtree.toml`,
//! reading and writing store files, logging, and projection rendering.
//!
//! ```bash
//! famtree init
//! famtree add --forename Ada --surname Byron --sex F
//! famtree link spouse I001 I002
//! famtree query roots I003
//! famtree graph --root I003 --ancestors -o tree.dot
//! ```

pub mod cli;
pub mod config;
pub mod render;
pub mod storage;

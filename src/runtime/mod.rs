//! Reference stack virtual machine for translated Milan programs
//!
//! Programs come either straight from the [`Compiler`](crate::compiler::Compiler)
//! or from a stored listing parsed with `str::parse::<Program>()`.

mod machine;

pub use machine::{Machine, VmOptions};

pub use crate::compiler::Program;

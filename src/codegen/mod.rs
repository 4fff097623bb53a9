//! Source generation for NEURON mechanisms and C++ channel classes.
//!
//! Both backends print the symbolic expressions of a [`ChannelModel`]
//! directly, state variables and concentrations are enumerated in sorted
//! order so the output is byte stable.
//!
//! [`ChannelModel`]: crate::channel::ChannelModel

pub mod nmodl;
pub mod cpp;
pub mod batch;

pub use nmodl::{ModFile, generate_mod_file};
pub use cpp::{CppChannel, generate_cpp_channel};
pub use batch::{BatchOutput, BatchReport, compile_registry, generate_registry};


/// Joins `items` formatted by `f` with `separator`
pub(crate) fn join_with<T, F: Fn(&T) -> String>(items: &[T], separator: &str, f: F) -> String {
    items.iter()
        .map(f)
        .collect::<Vec<String>>()
        .join(separator)
}

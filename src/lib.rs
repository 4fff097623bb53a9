//! # Ion Channel Compiler
//!
//! `ion_channel_compiler` turns declarative ion channel kinetics into
//! everything needed to simulate them. A channel is described by an open
//! probability over gating variables and, per gating variable, either rate
//! constants (`alpha`, `beta`) or an asymptotic value and time constant.
//! From that description the crate derives:
//!
//! - a normalized symbolic model with one asymptotic value, time constant
//!   and rate of change per state variable
//! - exact partial derivatives used for linearized (frequency domain) analysis
//! - fast numeric evaluators over scalars and arrays that stay finite at
//!   removable singularities of the rate functions
//! - NEURON mechanisms (NMODL) and C++ channel classes
//!
//! ### Evaluating a Channel
//!
//! ```rust
//! use ion_channel_compiler::channel::{ChannelDefinition, IonChannel, Overrides};
//! use ion_channel_compiler::constants::Ion;
//!
//! # fn main() -> Result<(), ion_channel_compiler::error::IonChannelError> {
//! let definition = ChannelDefinition::new("Kv", "n**4")
//!     .with_ion(Ion::K)
//!     .with_asymptotic("n", "1 / (1 + exp(-(v + 20) / 10))", "5.");
//! let channel = IonChannel::new(&definition)?;
//!
//! let p_open = channel.compute_open_probability(vec![-80., -40., 0.], &Overrides::new())?;
//! assert_eq!(p_open.shape(), &[3]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Generating Sources
//!
//! The binary reads a TOML file listing output directories and extra
//! channels, then writes one `I<name>.mod` file per channel together with
//! `Ionchannels.h` and `Ionchannels.cc`, see [`config::CompilerConfig`].

pub mod channel;
pub mod codegen;
pub mod config;
pub mod constants;
pub mod error;
pub mod numeric;
pub mod registry;
pub mod symbolic;

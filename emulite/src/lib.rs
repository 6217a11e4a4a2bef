//! Emulite: prepares and launches QEMU instances that boot a guest OS image.
//!
//! The crate is organised bottom-up:
//! - [`disk`] keeps an extended, qcow2-converted copy of the blobstore volume,
//!   keyed on a content hash of the source so unchanged volumes are reused.
//! - [`vmm`] turns a [`vmm::LaunchSpec`] into the ordered QEMU argument list,
//!   including the KVM acceleration decision.
//! - [`controller`] spawns the emulator and wires its console output.
//! - [`runtime`] holds configuration and [`EmuliteRuntime`], which wires the
//!   default collaborators together for callers such as the CLI.
//!
//! Collaborators at the boundary (boot artifact lookup, port allocation,
//! kernel arguments, volume tools) are traits with default implementations,
//! so the command can be built and inspected without an SDK on disk.

pub mod controller;
pub mod disk;
pub mod net;
pub mod runtime;
pub mod util;
pub mod vmm;

pub use emulite_shared::errors::{EmuliteError, EmuliteResult};
pub use controller::EmulatorProcess;
pub use runtime::EmuliteRuntime;
pub use runtime::options::EmuliteOptions;
pub use vmm::{LaunchPlan, LaunchSpec, QemuCommand, QemuCommandBuilder, TargetArch};

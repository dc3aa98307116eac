//! # Architecture Ports
//!
//! The kernel needs three things from a port: a way to pend a context
//! switch, a way to idle until the next interrupt, and (on real hardware)
//! the tick and PendSV handlers that call back into [`crate::kernel`].
//!
//! `port` names the implementation for the current build target: the
//! Armv7-M port on bare-metal ARM, the host port everywhere else.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod armv7m;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use armv7m as port;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod host;
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use host as port;

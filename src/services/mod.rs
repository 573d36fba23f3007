//! Long-running services for both ends of the link.
//!
//! - `drive`: the sender's fixed-period sample/encode/send loop
//! - `receiver`: the actuator's accept-then-serve loop
//! - `stdin_input`: an [`InputDevice`](crate::traits::InputDevice) fed by
//!   JSON lines on standard input
//!
//! Both loops take a shutdown future and return once it completes, so
//! the binaries can wire them to Ctrl+C:
//!
//! ```ignore
//! let mut server = ActuatorServer::new(acceptor, controller);
//! server.arm().await?;
//! server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod drive;
pub mod receiver;
pub mod stdin_input;

pub use drive::*;
pub use receiver::*;
pub use stdin_input::*;

//! # zwave-serial
//!
//! Link layer for the Z-Wave serial API.
//!
//! The crate turns raw serial bytes into typed messages and back, and runs
//! the send/acknowledge/retry discipline of a half-duplex link that carries
//! at most one outstanding request.
//!
//! ## Layers
//!
//! - **Protocol**: wire constants, XOR checksum, [`protocol::Envelope`] and
//!   the [`protocol::FrameBuffer`] that splits a byte stream into frames
//! - **Codec**: [`codec::FrameCodec`], byte-exact decode and encode
//! - **Messages**: [`message::Message`] and the [`message::MessageRegistry`]
//!   mapping function ids to constructors
//! - **Coordinator**: [`Coordinator`], the single-transaction state machine
//!   with timeout and retry, spawned behind a [`LinkHandle`]
//! - **Transport**: [`transport::Transport`] plus stream and serial port
//!   implementations
//!
//! ## Example
//!
//! ```ignore
//! use zwave_serial::{Coordinator, TransactionOutcome};
//! use zwave_serial::transport::{SerialSettings, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> zwave_serial::Result<()> {
//!     let transport = SerialTransport::new(SerialSettings::new("/dev/ttyACM0"));
//!     let (link, _events) = Coordinator::builder().spawn(transport)?;
//!
//!     link.open().await?;
//!     match link.request_version().await?.await? {
//!         TransactionOutcome::Completed(replies) => println!("{:?}", replies),
//!         other => println!("no version: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;

pub use config::LinkConfig;
pub use coordinator::{
    Coordinator, CoordinatorBuilder, EventRx, LinkEvent, LinkHandle, LinkState, LinkStatus,
    PendingTransaction, TransactionId, TransactionOutcome,
};
pub use error::{LinkError, Result};
pub use message::{Message, MessageRegistry, VersionReply};

//! # picabot core
//!
//! Value types and boundaries shared by every picabot crate.
//!
//! - **Message model**: [`Message`], [`InboundFrame`], [`OutboundFrame`], [`parse_frame`]
//! - **Identity**: [`Credentials`], [`Secret`], [`Endpoint`]
//! - **Lifecycle data**: [`ConnectionState`], [`StateSnapshot`], [`CloseReason`]
//! - **Transport boundary**: [`Connector`], [`DuplexChannel`], [`FrameSink`], [`FrameStream`]
//! - **Observability hook**: [`Observer`], [`TracingObserver`]
//! - **Errors**: the whole failure taxonomy lives in [`error`]
//!
//! ```text
//! ┌───────────┐  text   ┌───────────────┐ Message ┌────────────┐     ┌─────────┐
//! │ Transport │───────▶│ State machine │────────▶│ Dispatcher │────▶│ Handler │
//! │ (adapter) │◀───────│  (runtime)    │         │(framework) │────▶│ Handler │
//! └───────────┘  text   └───────────────┘         └────────────┘     └─────────┘
//! ```

pub mod credentials;
pub mod error;
pub mod frame;
pub mod message;
pub mod observer;
pub mod state;
pub mod transport;

pub use credentials::{Credentials, Endpoint, Secret};
pub use error::{
    AuthenticationError, ConnectError, HandlerError, HandlerSource, ParseError, ParseResult,
    RegistrationError, SendError, SendResult, TransportError, TransportResult,
};
pub use frame::{InboundFrame, OutboundFrame, parse_frame};
pub use message::Message;
pub use observer::{BoxedObserver, Observer, TracingObserver, tracing_observer};
pub use state::{CloseReason, ConnectionState, StateSnapshot};
pub use transport::{BoxedConnector, Connector, DuplexChannel, FrameSink, FrameStream, Incoming};

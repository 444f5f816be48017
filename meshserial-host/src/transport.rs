//! Transport abstraction.

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream carrying the serial protocol.
///
/// Blanket-implemented for anything async-readable and -writable, so the
/// same engine runs over a serial port bridge, a TCP socket, or an
/// in-memory duplex in tests. The stream carries raw protocol bytes; no
/// framing is assumed of the transport itself.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// A transport with its concrete type erased.
pub type BoxedTransport = Box<dyn Transport>;

/// Read with a bounded wait that does not cancel the read on timeout.
///
/// The original Go implementation (`AsyncOps.AsyncRead`) keeps a single
/// goroutine blocked in `read()` across timer expirations, re-joining the
/// same outstanding read on the next call instead of starting a new one.
/// `tokio::net::TcpStream::read` is cancellation-safe: no bytes are
/// consumed from the socket until the future resolves, so wrapping it in
/// `tokio::time::timeout` gives the same "read remains pending for next
/// call" behavior without needing a background task of our own.
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::GuardiaError;

/// Read into `buf`, waiting at most `wait` for data to arrive. Returns
/// `Ok(0)` on EOF, same as a plain `AsyncReadExt::read`. A timed-out read
/// is reported as `GuardiaError::Timeout` and is not itself a fault; the
/// caller is expected to loop and call again.
pub async fn read_with_timeout(
    stream: &mut TcpStream,
    buf: &mut [u8],
    wait: Duration,
) -> Result<usize, GuardiaError> {
    match timeout(wait, stream.read(buf)).await {
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(GuardiaError::Network(e)),
        Err(_elapsed) => Err(GuardiaError::timeout("read_with_timeout")),
    }
}

//! Session configuration.

use bitio::StreamMode;

/// Protocol version spoken by this build. A mismatch at handshake is fatal
/// to that connection.
pub const PROTOCOL_VERSION: u16 = 1;

/// Tunable knobs shared by client and server sessions.
///
/// Constants with invariant meaning (cache depths, fragment limits) live in
/// [`wire`]; everything here is runtime-tunable per deployment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Simulation ticks per second, advertised in the handshake.
    pub tick_rate: u32,
    /// Maximum simultaneously connected clients (server only).
    pub max_clients: usize,
    /// Milliseconds without any received package before disconnect.
    pub disconnect_timeout_ms: u64,
    /// Transport MTU; packages above `mtu - 128` bytes are fragmented.
    pub mtu: usize,
    /// Entropy coding negotiated for post-handshake packages.
    pub stream_mode: StreamMode,
    /// Milliseconds between keepalive packages while choked or idle.
    pub keepalive_interval_ms: u64,
    /// Milliseconds between connect retries while connecting.
    pub connect_retry_ms: u64,
    /// Attach and verify the per-snapshot debug hash.
    pub debug_hash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_clients: 16,
            disconnect_timeout_ms: 10_000,
            mtu: wire::DEFAULT_MTU,
            stream_mode: StreamMode::Raw,
            keepalive_interval_ms: 500,
            connect_retry_ms: 250,
            debug_hash: false,
        }
    }
}

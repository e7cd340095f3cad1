use std::{env, net::IpAddr, str::FromStr, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const DISPATCH_BROADCAST_CAPACITY: usize = 1024;
pub const OUTBOUND_BROADCAST_CAPACITY: usize = 1024;

// Minimum gap between two copies of the same noisy per-connection warning.
pub const LOG_THROTTLE: Duration = Duration::from_secs(2);
// Consecutive undecodable frames tolerated before the socket is closed.
pub const MAX_INVALID_JSON: u32 = 10;
// How long a fresh connection may take to send its first `join`.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

pub fn http_port() -> u16 {
    parse_or(env::var("ARENA_SERVER_PORT").ok().as_deref(), 3000)
}

pub fn bind_addr() -> IpAddr {
    parse_or(
        env::var("ARENA_BIND_ADDR").ok().as_deref(),
        IpAddr::from([127, 0, 0, 1]),
    )
}

pub fn spawn_broadcast_grace() -> Duration {
    let millis = parse_or(env::var("SPAWN_BROADCAST_GRACE_MS").ok().as_deref(), 1500);
    Duration::from_millis(millis)
}

fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5678;

/// Interface the receiving side binds to.
pub const LISTEN_ADDR: [u8; 4] = [0, 0, 0, 0];

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1 << 30; // 1 GiB

// self-test
pub const TEST_PORT_MIN: u16 = 10000;
pub const TEST_PORT_MAX: u16 = 15000; // exclusive
pub const TEST_PORT_ATTEMPTS: usize = 8;
pub const TEST_HOST: &str = "localhost";

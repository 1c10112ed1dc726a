// Connection configuration, read from environment variables
//
// WILC_TCP_RECV_CHUNK: Maximum bytes per receive (default: 1024, 1..=65536)
// WILC_TCP_NODELAY:    Disable Nagle's algorithm, 0/1/true/false (default: 1)
// WILC_TCP_SNDBUF:     SO_SNDBUF in bytes (default: system setting)
use std::env;
use wilc_transport::TcpOptions;

pub const DEFAULT_RECV_CHUNK_SIZE: usize = 1024;
pub const MAX_RECV_CHUNK_SIZE: usize = 65536;
const DEFAULT_THREAD_NAME: &str = "wilc-tcp-rx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub recv_chunk_size: usize,
    pub nodelay: bool,
    pub send_buffer_size: Option<usize>,
    pub thread_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            nodelay: true,
            send_buffer_size: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ConnectionConfig::default();

        let recv_chunk_size = lookup("WILC_TCP_RECV_CHUNK")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.recv_chunk_size);

        let nodelay = lookup("WILC_TCP_NODELAY")
            .and_then(|s| parse_flag(&s))
            .unwrap_or(defaults.nodelay);

        let send_buffer_size = lookup("WILC_TCP_SNDBUF")
            .and_then(|s| s.trim().parse().ok())
            .filter(|&size: &usize| size > 0);

        ConnectionConfig {
            recv_chunk_size,
            nodelay,
            send_buffer_size,
            thread_name: defaults.thread_name,
        }
        .normalized()
    }

    pub fn with_recv_chunk_size(mut self, size: usize) -> Self {
        self.recv_chunk_size = size;
        self.normalized()
    }

    /// Clamp values into the ranges the receive task can work with.
    pub fn normalized(mut self) -> Self {
        self.recv_chunk_size = self.recv_chunk_size.clamp(1, MAX_RECV_CHUNK_SIZE);
        self
    }

    pub fn tcp_options(&self) -> TcpOptions {
        TcpOptions {
            nodelay: self.nodelay,
            send_buffer_size: self.send_buffer_size,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ConnectionConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConnectionConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(config_from(&[]), ConnectionConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = config_from(&[
            ("WILC_TCP_RECV_CHUNK", "512"),
            ("WILC_TCP_NODELAY", "off"),
            ("WILC_TCP_SNDBUF", "65536"),
        ]);
        assert_eq!(config.recv_chunk_size, 512);
        assert!(!config.nodelay);
        assert_eq!(config.send_buffer_size, Some(65536));
        assert_eq!(config.tcp_options().send_buffer_size, Some(65536));
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = config_from(&[
            ("WILC_TCP_RECV_CHUNK", "lots"),
            ("WILC_TCP_NODELAY", "maybe"),
            ("WILC_TCP_SNDBUF", "0"),
        ]);
        assert_eq!(config.recv_chunk_size, DEFAULT_RECV_CHUNK_SIZE);
        assert!(config.nodelay);
        assert_eq!(config.send_buffer_size, None);
    }

    #[test]
    fn chunk_size_is_clamped() {
        assert_eq!(config_from(&[("WILC_TCP_RECV_CHUNK", "0")]).recv_chunk_size, 1);
        assert_eq!(
            ConnectionConfig::default()
                .with_recv_chunk_size(1 << 20)
                .recv_chunk_size,
            MAX_RECV_CHUNK_SIZE
        );
    }
}

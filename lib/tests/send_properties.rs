// Property checks for the send path over the in-memory transport
use proptest::prelude::*;
use std::sync::Arc;
use wilc_osal::mock::{self, MockConfig, MockConnector};
use wilc_osal::{Connection, ConnectionConfig, Endpoint, ErrorKind};

fn connected(config: MockConfig) -> (Connection, mock::MockPeer) {
    let (transport, peer) = mock::pair(config);
    let conn = Connection::with_connector(
        Endpoint::new("127.0.0.1", 9000).unwrap(),
        ConnectionConfig::default(),
        Arc::new(MockConnector::new(transport)),
    );
    conn.connect(|_: &[u8]| {}).unwrap();
    (conn, peer)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn payload_arrives_intact_for_any_write_size(
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
        max_write in 1usize..64,
    ) {
        let (conn, peer) = connected(MockConfig::chunked(max_write));
        prop_assert_eq!(conn.send(&payload).unwrap(), payload.len());
        prop_assert_eq!(peer.written(), payload.clone());
        prop_assert!(peer.write_sizes().iter().all(|&n| n >= 1 && n <= max_write));
        conn.disconnect();
    }

    #[test]
    fn failure_reports_exactly_what_was_written(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        max_write in 1usize..32,
        budget in 0usize..512,
    ) {
        let (conn, peer) = connected(MockConfig { max_write, fail_after: Some(budget) });
        match conn.send(&payload) {
            Ok(n) => {
                prop_assert!(budget >= payload.len());
                prop_assert_eq!(n, payload.len());
            }
            Err(err) => {
                prop_assert_eq!(err.kind(), ErrorKind::SendFailed);
                prop_assert_eq!(err.bytes_written(), budget);
                prop_assert_eq!(&peer.written()[..], &payload[..budget]);
            }
        }
        conn.disconnect();
    }

    #[test]
    fn sequential_sends_concatenate(
        messages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..8),
        max_write in 1usize..16,
    ) {
        let (conn, peer) = connected(MockConfig::chunked(max_write));
        for message in &messages {
            prop_assert_eq!(conn.send(message).unwrap(), message.len());
        }
        prop_assert_eq!(peer.written(), messages.concat());
        conn.disconnect();
    }
}

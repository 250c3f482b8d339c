//! Peer session against a plain loopback echo listener.

use aipc_client::infrastructure::peer::{PeerError, PeerSession};
use aipc_core::{ConnectionDescriptor, EndpointDescriptor, TransportAddress};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use uuid::Uuid;

async fn spawn_echo_listener() -> EndpointDescriptor {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }
    });
    EndpointDescriptor::new(
        ConnectionDescriptor::Anonymous,
        Uuid::new_v4(),
        TransportAddress::Tcp(addr),
    )
}

#[tokio::test]
async fn test_session_exchanges_lines_over_tcp() {
    // Arrange
    let descriptor = spawn_echo_listener().await;
    let mut session = PeerSession::connect(&descriptor).await.expect("connect");

    // Act
    let first = session.request("one").await.unwrap();
    let second = session.request("two").await.unwrap();

    // Assert
    assert_eq!(first, "one");
    assert_eq!(second, "two");
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Arrange: bind then drop so the port is known to be free
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let descriptor = EndpointDescriptor::new(
        ConnectionDescriptor::Anonymous,
        Uuid::new_v4(),
        TransportAddress::Tcp(addr),
    );

    // Act
    let result = PeerSession::connect(&descriptor).await;

    // Assert
    let err = tokio_test::assert_err!(result);
    assert!(matches!(err, PeerError::Connect(_)));
}

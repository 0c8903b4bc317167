//! Discovery announcer sending to a local socket.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use vtuner_core::{CoreContext, Settings, TaskWorker, Worker};
use vtuner_services::SsdpService;

async fn next_datagram(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no datagram within 2s")
        .unwrap();
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[tokio::test]
async fn announces_alive_then_byebye() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut settings = Settings::default();
    settings.discovery.address = Some("127.0.0.1".to_string());
    settings.discovery.announce_interval = Duration::from_millis(50);
    settings.device.device_id = "CAFE0001".to_string();
    let ctx = Arc::new(CoreContext::build(settings, None).unwrap());

    let mut worker =
        TaskWorker::new(SsdpService::new().with_target(receiver.local_addr().unwrap()));
    worker.start(ctx).unwrap();

    let first = next_datagram(&receiver).await;
    assert!(first.contains("NTS: ssdp:alive"));
    assert!(first.contains("LOCATION: http://127.0.0.1:5004/discover.json"));
    assert!(first.contains("USN: uuid:CAFE0001::"));

    let second = next_datagram(&receiver).await;
    assert!(second.contains("NTS: ssdp:alive"), "announcements repeat");

    worker.stop(Duration::from_secs(2)).await.unwrap();

    let mut last = next_datagram(&receiver).await;
    while last.contains("ssdp:alive") {
        last = next_datagram(&receiver).await;
    }
    assert!(last.contains("NTS: ssdp:byebye"));
}

//! Integration tests for the robot link: command channel, scanner and
//! state machine driven by a scripted radio.

mod common;

use common::{next, spawn_channel, wait_for_state, ScriptedRadio};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

use avatar_robot::bluetooth::{LinkError, LinkState, Notice, Notification, RadioState};

async fn connect_until_ready(
    radio: &ScriptedRadio,
) -> (
    avatar_robot::bluetooth::CommandChannel,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    let (channel, mut rx) = spawn_channel(radio);
    channel.connect();

    assert_eq!(
        next(&mut rx).await,
        Notification::Notice(Notice::Scanning {
            target: "ESP32".into()
        })
    );
    assert_eq!(next(&mut rx).await, Notification::Connected);
    assert_eq!(
        next(&mut rx).await,
        Notification::Notice(Notice::Ready {
            target: "ESP32".into()
        })
    );
    assert!(channel.is_connected());
    (channel, rx)
}

#[tokio::test]
async fn test_connect_reaches_ready() {
    let radio = ScriptedRadio::with_robot();
    let (channel, _rx) = connect_until_ready(&radio).await;

    assert_eq!(channel.state(), LinkState::Ready);
    assert!(channel.last_error().is_none());
    radio.recorded(|r| {
        assert_eq!(r.scans, 1);
        assert_eq!(r.connects, vec!["AA:BB:CC:DD:EE:01".to_string()]);
    });
}

#[tokio::test]
async fn test_send_writes_command_bytes() {
    let radio = ScriptedRadio::with_robot();
    let (channel, _rx) = connect_until_ready(&radio).await;

    channel.send("F").await.unwrap();
    channel.send(b"S".to_vec()).await.unwrap();

    radio.recorded(|r| assert_eq!(r.writes, vec![b"F".to_vec(), b"S".to_vec()]));
}

#[tokio::test]
async fn test_send_while_idle_is_not_connected() {
    let radio = ScriptedRadio::with_robot();
    let (channel, _rx) = spawn_channel(&radio);

    assert_eq!(channel.send("F").await, Err(LinkError::NotConnected));
    assert!(!channel.is_connected());
    radio.recorded(|r| assert!(r.writes.is_empty()));
}

#[tokio::test]
async fn test_unsupported_radio_fails_without_scanning() {
    let radio = ScriptedRadio::with_robot().with_state(RadioState::Absent);
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    let notice = next(&mut rx).await;
    assert_eq!(
        notice,
        Notification::Notice(Notice::Failed(LinkError::UnsupportedHardware))
    );
    if let Notification::Notice(notice) = notice {
        assert_eq!(notice.to_string(), "Bluetooth not supported");
    }

    wait_for_state(&channel, LinkState::Idle).await;
    assert_eq!(channel.last_error(), Some(LinkError::UnsupportedHardware));
    radio.recorded(|r| assert_eq!(r.scans, 0));
}

#[tokio::test]
async fn test_powered_off_radio_asks_to_enable() {
    let radio = ScriptedRadio::with_robot().with_state(RadioState::PoweredOff);
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    match next(&mut rx).await {
        Notification::Notice(notice) => assert_eq!(notice.to_string(), "Please enable Bluetooth"),
        other => panic!("unexpected notification {:?}", other),
    }
    wait_for_state(&channel, LinkState::Idle).await;
    radio.recorded(|r| assert_eq!(r.scans, 0));
}

#[tokio::test(start_paused = true)]
async fn test_scan_times_out_when_no_robot() {
    let radio = ScriptedRadio::new()
        .advertise("11:22:33:44:55:66", Some("Headphones"))
        .advertise("11:22:33:44:55:67", None);
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    assert!(matches!(
        next(&mut rx).await,
        Notification::Notice(Notice::Scanning { .. })
    ));
    let started = tokio::time::Instant::now();

    match next(&mut rx).await {
        Notification::Notice(notice) => assert_eq!(notice.to_string(), "ESP32 not found"),
        other => panic!("unexpected notification {:?}", other),
    }
    assert!(started.elapsed() >= std::time::Duration::from_secs(10));

    wait_for_state(&channel, LinkState::Idle).await;
    assert!(matches!(channel.last_error(), Some(LinkError::ScanTimeout(_))));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    radio.recorded(|r| assert!(r.connects.is_empty()));
}

#[tokio::test]
async fn test_only_first_match_connects() {
    let radio = ScriptedRadio::new()
        .advertise("AA:BB:CC:DD:EE:01", Some("esp32-robot"))
        .advertise("AA:BB:CC:DD:EE:02", Some("ESP32-Spare"));
    let (_channel, _rx) = connect_until_ready(&radio).await;

    radio.recorded(|r| assert_eq!(r.connects, vec!["AA:BB:CC:DD:EE:01".to_string()]));
}

#[tokio::test]
async fn test_connect_while_ready_is_a_no_op() {
    let radio = ScriptedRadio::with_robot();
    let (channel, mut rx) = connect_until_ready(&radio).await;

    channel.connect();
    channel.disconnect_and_wait().await;

    assert_eq!(rx.try_recv(), Ok(Notification::Disconnected));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    radio.recorded(|r| {
        assert_eq!(r.scans, 1);
        assert_eq!(r.connects.len(), 1);
    });
}

#[tokio::test]
async fn test_missing_capability_closes_link() {
    let radio = ScriptedRadio::with_robot().without_capability();
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    assert!(matches!(
        next(&mut rx).await,
        Notification::Notice(Notice::Scanning { .. })
    ));
    assert!(matches!(
        next(&mut rx).await,
        Notification::Notice(Notice::Failed(LinkError::CapabilityNotFound { .. }))
    ));

    wait_for_state(&channel, LinkState::Idle).await;
    assert!(!channel.is_connected());
    radio.recorded(|r| assert_eq!(r.closes, 1));

    channel.disconnect_and_wait().await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let radio = ScriptedRadio::with_robot()
        .connect_error(LinkError::connect("AA:BB:CC:DD:EE:01", "page timeout"));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    next(&mut rx).await;
    match next(&mut rx).await {
        Notification::Notice(Notice::Failed(LinkError::TransportConnectFailure {
            address,
            ..
        })) => assert_eq!(address, "AA:BB:CC:DD:EE:01"),
        other => panic!("unexpected notification {:?}", other),
    }
    wait_for_state(&channel, LinkState::Idle).await;
    radio.recorded(|r| assert_eq!(r.closes, 0));
}

#[tokio::test]
async fn test_scan_rejection_differs_from_not_found() {
    let radio = ScriptedRadio::with_robot()
        .scan_error(LinkError::ScanStartFailure("org.bluez.Error.InProgress".into()));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    next(&mut rx).await;
    match next(&mut rx).await {
        Notification::Notice(notice) => assert_eq!(notice.to_string(), "Scan failed"),
        other => panic!("unexpected notification {:?}", other),
    }
    wait_for_state(&channel, LinkState::Idle).await;
    assert!(matches!(
        channel.last_error(),
        Some(LinkError::ScanStartFailure(_))
    ));
}

#[tokio::test]
async fn test_peripheral_disconnect_fires_once() {
    let radio = ScriptedRadio::with_robot();
    let (channel, mut rx) = connect_until_ready(&radio).await;

    radio.drop_link().await;
    assert_eq!(next(&mut rx).await, Notification::Disconnected);
    wait_for_state(&channel, LinkState::Idle).await;
    assert_eq!(channel.send("F").await, Err(LinkError::NotConnected));

    channel.disconnect_and_wait().await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let radio = ScriptedRadio::with_robot();
    let (channel, mut rx) = connect_until_ready(&radio).await;

    channel.disconnect_and_wait().await;
    channel.disconnect_and_wait().await;
    channel.disconnect();
    channel.disconnect_and_wait().await;

    assert_eq!(rx.try_recv(), Ok(Notification::Disconnected));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(channel.state(), LinkState::Idle);
    radio.recorded(|r| assert_eq!(r.closes, 1));
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let radio = ScriptedRadio::with_robot();
    let (channel, mut rx) = connect_until_ready(&radio).await;

    channel.disconnect_and_wait().await;
    assert_eq!(next(&mut rx).await, Notification::Disconnected);

    channel.connect();
    next(&mut rx).await;
    assert_eq!(next(&mut rx).await, Notification::Connected);
    radio.recorded(|r| assert_eq!(r.scans, 2));
}

#[tokio::test]
async fn test_disconnect_during_scan() {
    let radio = ScriptedRadio::new();
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();
    next(&mut rx).await;
    assert_eq!(channel.state(), LinkState::Scanning);

    channel.disconnect_and_wait().await;

    assert_eq!(channel.state(), LinkState::Idle);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    radio.recorded(|r| assert!(r.connects.is_empty()));
}

#[tokio::test]
async fn test_write_failure_keeps_link_ready() {
    let radio = ScriptedRadio::with_robot()
        .write_error(LinkError::WriteFailure("ATT error 0x0e".into()));
    let (channel, _rx) = connect_until_ready(&radio).await;

    assert!(matches!(
        channel.send("F").await,
        Err(LinkError::WriteFailure(_))
    ));
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_closes_late_link() {
    let radio = ScriptedRadio::with_robot().connect_delay(Duration::from_millis(300));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();
    next(&mut rx).await;
    wait_for_state(&channel, LinkState::Connecting).await;

    channel.disconnect_and_wait().await;
    assert_eq!(channel.state(), LinkState::Idle);
    radio.recorded(|r| assert_eq!(r.closes, 0));

    // The transport link comes up after the attempt was abandoned.
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(channel.state(), LinkState::Idle);
    assert_eq!(channel.send("F").await, Err(LinkError::NotConnected));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    radio.recorded(|r| {
        assert_eq!(r.closes, 1);
        assert!(r.writes.is_empty());
    });
}

#[tokio::test(start_paused = true)]
async fn test_late_connection_does_not_drop_new_link() {
    let radio = ScriptedRadio::with_robot().connect_delay(Duration::from_millis(300));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();
    next(&mut rx).await;
    wait_for_state(&channel, LinkState::Connecting).await;
    channel.disconnect_and_wait().await;

    // Second attempt finds the same robot while the first connect is pending.
    channel.connect();
    assert!(matches!(
        next(&mut rx).await,
        Notification::Notice(Notice::Scanning { .. })
    ));
    assert_eq!(next(&mut rx).await, Notification::Connected);
    assert!(matches!(
        next(&mut rx).await,
        Notification::Notice(Notice::Ready { .. })
    ));

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(channel.is_connected());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    channel.send("F").await.unwrap();
    radio.recorded(|r| {
        assert_eq!(r.connects.len(), 2);
        assert_eq!(r.closes, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_discovering_services() {
    let radio = ScriptedRadio::with_robot().resolve_delay(Duration::from_millis(300));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();
    next(&mut rx).await;
    wait_for_state(&channel, LinkState::DiscoveringServices).await;

    channel.disconnect_and_wait().await;
    assert_eq!(channel.state(), LinkState::Idle);
    radio.recorded(|r| assert_eq!(r.closes, 1));

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(channel.state(), LinkState::Idle);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_during_service_discovery_fails() {
    let radio = ScriptedRadio::with_robot().resolve_delay(Duration::from_secs(1));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();
    next(&mut rx).await;
    wait_for_state(&channel, LinkState::DiscoveringServices).await;

    radio.drop_link().await;

    match next(&mut rx).await {
        Notification::Notice(Notice::Failed(LinkError::TransportConnectFailure {
            address,
            ..
        })) => assert_eq!(address, "AA:BB:CC:DD:EE:01"),
        other => panic!("unexpected notification {:?}", other),
    }
    wait_for_state(&channel, LinkState::Idle).await;
    radio.recorded(|r| assert_eq!(r.closes, 1));

    // The resolve that was still running must not revive the link.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!channel.is_connected());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_unwatchable_link_never_becomes_ready() {
    let radio = ScriptedRadio::with_robot()
        .watch_error(LinkError::connect("AA:BB:CC:DD:EE:01", "no D-Bus signal"));
    let (channel, mut rx) = spawn_channel(&radio);
    channel.connect();

    next(&mut rx).await;
    assert_eq!(
        next(&mut rx).await,
        Notification::Notice(Notice::Failed(LinkError::connect(
            "AA:BB:CC:DD:EE:01",
            "no D-Bus signal"
        )))
    );
    wait_for_state(&channel, LinkState::Idle).await;
    assert!(!channel.is_connected());
    radio.recorded(|r| assert_eq!(r.closes, 1));
}

async fn assert_ready_iff_writable(channel: &avatar_robot::bluetooth::CommandChannel) {
    let ready = channel.is_connected();
    let sent = channel.send("P").await.is_ok();
    assert_eq!(ready, sent, "link state {:?}", channel.state());
}

#[tokio::test(start_paused = true)]
async fn test_send_only_succeeds_when_ready() {
    let radio = ScriptedRadio::with_robot()
        .connect_delay(Duration::from_millis(50))
        .connect_delay(Duration::from_millis(50))
        .resolve_delay(Duration::from_millis(50));
    let (channel, _rx) = spawn_channel(&radio);

    // Cut each attempt short at a different point of the setup.
    for steps in [0, 1, 3, 6, 8, 12, 20, 40] {
        channel.connect();
        for _ in 0..steps {
            assert_ready_iff_writable(&channel).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_ready_iff_writable(&channel).await;
        channel.disconnect();
        for _ in 0..3 {
            tokio::task::yield_now().await;
            assert_ready_iff_writable(&channel).await;
        }
    }

    channel.disconnect_and_wait().await;
    assert_eq!(channel.state(), LinkState::Idle);
    assert_ready_iff_writable(&channel).await;
}

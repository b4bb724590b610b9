//! Integration tests for the connection status presenter.

mod common;

use std::time::Duration;

use common::*;
use sw_services::service::Service;
use sw_services::status::{ConnectionStatusPresenter, StatusLabel, StatusView};
use sw_socket::testing::{MockTransport, OpenMode};
use sw_socket::{BackoffPolicy, ConnectionConfig, ReadyState};

fn slow_backoff() -> ConnectionConfig {
    ConnectionConfig {
        backoff: BackoffPolicy::new(Duration::from_secs(4), 2.0, Duration::from_secs(60)),
        ..ConnectionConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn view_follows_connection_state() {
    let transport = MockTransport::hanging();
    let manager = create_test_manager(&transport);
    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init().unwrap();
    assert_eq!(
        presenter.view(),
        StatusView {
            label: StatusLabel::Disconnected,
            countdown: None
        }
    );

    let mut views = presenter.subscribe();
    manager.connect();
    views.changed().await.unwrap();
    assert_eq!(views.borrow_and_update().label, StatusLabel::Connecting);

    manager.close();
    settle().await;
    assert_eq!(
        presenter.view(),
        StatusView {
            label: StatusLabel::Disconnected,
            countdown: None
        }
    );
}

#[tokio::test(start_paused = true)]
async fn unplanned_close_starts_countdown() {
    let transport = MockTransport::refusing("connection refused");
    let manager = create_test_manager_with(&transport, slow_backoff());
    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init().unwrap();

    manager.connect();
    settle().await;
    assert_eq!(
        presenter.view(),
        StatusView {
            label: StatusLabel::Disconnected,
            countdown: Some(4)
        }
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(presenter.view().countdown, Some(3));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(presenter.view().countdown, Some(2));
    assert_eq!(presenter.view().to_string(), "disconnected (reconnecting in 2s)");
}

#[tokio::test(start_paused = true)]
async fn reconnect_cancels_countdown_and_connects() {
    let transport = MockTransport::refusing("connection refused");
    let manager = create_test_manager_with(&transport, slow_backoff());
    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init().unwrap();

    manager.connect();
    settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(presenter.view().countdown, Some(3));

    transport.set_mode(OpenMode::Hang);
    presenter.reconnect();
    assert_eq!(presenter.view().countdown, None);
    assert_eq!(manager.ready_state(), ReadyState::Connecting);
    settle().await;

    assert_eq!(presenter.view().label, StatusLabel::Connecting);
    assert_eq!(transport.open_count(), 2);
    // A fresh connect resets the backoff.
    assert_eq!(manager.current_interval(), Duration::from_secs(4));

    // The cancelled countdown never comes back.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(presenter.view().countdown, None);
}

#[tokio::test(start_paused = true)]
async fn countdown_is_cleared_by_next_attempt() {
    let transport = MockTransport::refusing("connection refused");
    let manager = create_test_manager_with(&transport, slow_backoff());
    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init().unwrap();

    manager.connect();
    settle().await;
    transport.set_mode(OpenMode::Hang);

    // The scheduled reconnect fires at 4s and moves to Connecting.
    tokio::time::sleep(Duration::from_millis(4_100)).await;
    assert_eq!(manager.ready_state(), ReadyState::Connecting);
    assert_eq!(
        presenter.view(),
        StatusView {
            label: StatusLabel::Connecting,
            countdown: None
        }
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_freezes_view() {
    let transport = MockTransport::hanging();
    let manager = create_test_manager(&transport);
    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init().unwrap();
    presenter.shutdown().unwrap();

    manager.connect();
    settle().await;
    assert_eq!(presenter.view().label, StatusLabel::Disconnected);
}

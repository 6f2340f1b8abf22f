//! Integration tests for the connection lifecycle: registration burst,
//! the registered transition and teardown on server EOF.

mod common;

use std::time::Duration;

use common::{TestBot, TestServer};
use prebot::event::names;
use prebot::{ConnectionState, EngineSettings};

#[tokio::test]
async fn test_registration_burst_order() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();

    let lines = peer.expect_registration().await.unwrap();
    assert_eq!(lines, vec!["NICK prebot", "USER prebot * * :Prebot IRC Bot"]);
    assert_eq!(irc.status(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_password_goes_first() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    let mut settings = TestBot::network(server.port(), "prebot");
    settings.password = Some("hunter2".into());
    let irc = bot.connection(settings);

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();

    let lines = peer.expect_registration().await.unwrap();
    assert_eq!(lines[0], "PASS hunter2");
    assert_eq!(lines[1], "NICK prebot");
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn test_connect_while_online_is_noop() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let _peer = server.accept().await.unwrap();
    let handle = irc.socket();

    bot.connect(&irc).await;
    assert_eq!(irc.socket(), handle);
    assert!(!server.accepts_within(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_connected_fires_once() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    bot.record(names::CONNECTED);
    bot.record(names::SERVER_MESSAGE);
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();
    peer.welcome("prebot").await.unwrap();
    peer.send_raw(":irc.test 251 prebot :There are 3 users").await.unwrap();
    peer.send_raw(":irc.test 001 prebot :Welcome again").await.unwrap();

    assert!(bot.pump_for(names::SERVER_MESSAGE, 3).await);
    bot.settle(Duration::from_millis(50)).await;

    let connected = bot
        .recorded_names()
        .iter()
        .filter(|n| *n == names::CONNECTED)
        .count();
    assert_eq!(connected, 1);
    assert_eq!(irc.status(), ConnectionState::Registered);
}

#[tokio::test]
async fn test_welcome_sets_server_assigned_nick() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    bot.record(names::CONNECTED);
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();
    peer.welcome("prebot_").await.unwrap();

    assert!(bot.pump_for(names::CONNECTED, 1).await);
    assert_eq!(irc.current_nick(), "prebot_");
    assert!(irc.is_me("PREBOT_"));
}

#[tokio::test]
async fn test_custom_registered_numeric() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::with_engine(EngineSettings {
        registered_numeric: 376,
        ..EngineSettings::default()
    });
    bot.record(names::SERVER_MESSAGE);
    bot.record(names::CONNECTED);
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();
    peer.welcome("prebot").await.unwrap();
    assert!(bot.pump_for(names::SERVER_MESSAGE, 1).await);
    assert_eq!(irc.status(), ConnectionState::Connected);

    peer.send_raw(":irc.test 376 prebot :End of MOTD").await.unwrap();
    assert!(bot.pump_for(names::CONNECTED, 1).await);
    assert_eq!(irc.status(), ConnectionState::Registered);
}

#[tokio::test]
async fn test_server_eof_disconnects() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    bot.record(names::DISCONNECTED);
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();
    peer.welcome("prebot").await.unwrap();
    peer.send_raw(":prebot!bot@host JOIN #rust").await.unwrap();
    peer.hang_up();

    assert!(bot.pump_for(names::DISCONNECTED, 1).await);
    assert_eq!(irc.status(), ConnectionState::Disconnected);
    assert!(irc.socket().is_none());
    assert!(irc.channels().is_empty());
    assert!(irc.users().is_empty());
    assert!(bot.ctx.pool.is_empty());
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    bot.record(names::DISCONNECTED);
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut first = server.accept().await.unwrap();
    first.expect_registration().await.unwrap();
    first.hang_up();
    assert!(bot.pump_for(names::DISCONNECTED, 1).await);

    bot.connect(&irc).await;
    let mut second = server.accept().await.unwrap();
    let lines = second.expect_registration().await.unwrap();
    assert_eq!(lines[0], "NICK prebot");
    assert_eq!(irc.status(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_quit_closes_after_flush() {
    let server = TestServer::bind().await.unwrap();
    let bot = TestBot::new();
    let irc = bot.connection(TestBot::network(server.port(), "prebot"));

    bot.connect(&irc).await;
    let mut peer = server.accept().await.unwrap();
    peer.welcome("prebot").await.unwrap();

    irc.quit(Some("bye")).unwrap();
    let line = peer.recv_until(|l| l.starts_with("QUIT")).await.unwrap();
    assert_eq!(line, "QUIT :bye");
}

#[tokio::test]
async fn test_unreachable_host_reports_error() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let server = TestServer::bind().await.unwrap();
        server.port()
    };
    let bot = TestBot::new();
    let irc = bot.connection(TestBot::network(port, "prebot"));

    let result = {
        let irc = irc.clone();
        tokio::task::spawn_blocking(move || irc.connect()).await.unwrap()
    };
    assert!(result.is_err());
    assert_eq!(irc.status(), ConnectionState::Disconnected);
}

//! Room driver against a scripted backend and an in-memory push channel.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use playground_client::{
    Call, ChannelStatus, ClientConfig, EVENT_RECONNECTED, EmitPolicy, MemoryApi,
    MemoryPushChannel, RoomDriver, RoomNotice, SessionManager, SystemEnv, TransportError,
    credential_channel,
    core::{
        CursorPosition, ErrorKind, RoomPhase, SessionState,
        proto::{OutboundFrame, RoomId},
    },
};
use serde_json::{Value, json};

type Session = SessionManager<MemoryApi, SystemEnv>;

async fn session() -> (Session, MemoryApi) {
    let (writer, reader) = credential_channel();
    let api = MemoryApi::new(reader);
    api.reply(Call::Refresh, json!({"success": true, "access_token": "tok"})).reply(
        Call::Identity,
        json!({"username": "alice", "email": "alice@example.com", "roles": []}),
    );

    let mut session = SessionManager::new(api.clone(), SystemEnv::new(), writer);
    session.start().await;
    assert_eq!(session.state(), SessionState::Authenticated);
    (session, api)
}

fn detail(id: &str, history: Value) -> Value {
    json!({
        "id": id,
        "name": id,
        "game": "tictactoe",
        "status": "playing",
        "players": [],
        "maxplayers": 2,
        "history": history,
    })
}

fn open_channel() -> Arc<MemoryPushChannel> {
    let push = Arc::new(MemoryPushChannel::default());
    push.connect();
    push
}

fn spectate_ack_id(push: &MemoryPushChannel) -> u64 {
    push.sent()
        .iter()
        .rev()
        .find(|frame| frame.event() == "spectate")
        .and_then(OutboundFrame::ack_id)
        .unwrap()
}

#[tokio::test]
async fn history_then_live_event_then_navigation() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([{"epoch": 5, "board": "A"}])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());

    let notices = driver.open(&mut session).await.unwrap();
    assert_eq!(notices, vec![RoomNotice::Updated { epoch: 5, following: true }]);
    assert_eq!(driver.controller().phase(), RoomPhase::Syncing);
    assert_eq!(push.subscriber_count("gamestate"), 1);

    push.ack(spectate_ack_id(&push), json!({"states": [{"epoch": 5, "board": "A"}]}));
    push.deliver("gamestate", json!({"epoch": 6, "board": "B"}));

    let notices = driver.process_pending();
    assert_eq!(notices, vec![RoomNotice::Updated { epoch: 6, following: true }]);
    assert_eq!(driver.controller().phase(), RoomPhase::Live);
    assert_eq!(driver.controller().current_snapshot().unwrap().board, json!("B"));

    driver.controller_mut().first();
    assert_eq!(driver.controller().current_snapshot().unwrap().board, json!("A"));
    driver.controller_mut().last();
    assert_eq!(driver.controller().current_snapshot().unwrap().board, json!("B"));
    assert_eq!(driver.controller().cursor().position(), CursorPosition::Live);
}

#[tokio::test]
async fn missing_room_navigates_away_without_subscribing() {
    let (mut session, api) = session().await;
    api.fail(Call::RoomDetail, TransportError::Status { status: 404, message: "no room".into() });
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R404"), push.clone());

    let notices = driver.open(&mut session).await.unwrap();

    assert_eq!(notices, vec![RoomNotice::NavigateAway { room_id: RoomId::new("R404") }]);
    assert_eq!(driver.subscription_count(), 0);
    assert_eq!(push.subscriber_count("gamestate"), 0);
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn retryable_fetch_failure_can_be_reopened() {
    let (mut session, api) = session().await;
    api.fail(Call::RoomDetail, TransportError::Network { reason: "timeout".into() })
        .reply(Call::RoomDetail, detail("R1", json!([])));
    let mut driver = RoomDriver::new(RoomId::new("R1"), open_channel());

    let notices = driver.open(&mut session).await.unwrap();
    assert_eq!(
        notices,
        vec![RoomNotice::FetchFailed {
            room_id: RoomId::new("R1"),
            kind: ErrorKind::NetworkUnavailable,
            retryable: true,
        }]
    );

    driver.open(&mut session).await.unwrap();
    assert_eq!(driver.controller().phase(), RoomPhase::Syncing);
}

#[tokio::test]
async fn unauthorized_fetch_forces_login() {
    let (mut session, api) = session().await;
    api.fail(Call::RoomDetail, TransportError::Status { status: 401, message: "expired".into() });
    let mut driver = RoomDriver::new(RoomId::new("R1"), open_channel());

    let notices = driver.open(&mut session).await.unwrap();

    assert!(matches!(
        notices.as_slice(),
        [RoomNotice::FetchFailed { kind: ErrorKind::Unauthorized, retryable: false, .. }]
    ));
    assert_eq!(session.state(), SessionState::AuthRequired);
    assert!(driver.open(&mut session).await.is_err());
}

#[tokio::test]
async fn switching_rooms_releases_old_handlers_first() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([{"epoch": 1, "board": "a"}])))
        .reply(Call::RoomDetail, detail("R2", json!([{"epoch": 10, "board": "x"}])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();

    // Queued for R1 but not yet processed
    push.deliver("gamestate", json!({"epoch": 2, "board": "b"}));

    driver.switch_to(RoomId::new("R2"), &mut session).await.unwrap();
    assert_eq!(push.subscriber_count("gamestate"), 1);
    assert!(driver.process_pending().is_empty());

    push.deliver("gamestate", json!({"epoch": 11, "board": "y"}));
    assert_eq!(driver.process_pending(), vec![RoomNotice::Updated { epoch: 11, following: true }]);
    assert_eq!(driver.controller().buffer().epochs().collect::<Vec<_>>(), vec![10, 11]);
}

#[tokio::test]
async fn payloads_for_other_rooms_are_ignored() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();

    push.deliver("gamestate", json!({"epoch": 3, "board": "z", "roomid": "R9"}));
    push.deliver("gamestate", json!({"board": "no epoch"}));

    assert!(driver.process_pending().is_empty());
    assert!(driver.controller().buffer().is_empty());
}

#[tokio::test]
async fn queued_spectate_flushes_after_reconnect() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = Arc::new(MemoryPushChannel::from_config(&ClientConfig::default()));
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());

    driver.open(&mut session).await.unwrap();
    assert!(push.sent().is_empty());

    push.connect();
    let id = spectate_ack_id(&push);
    push.ack(id, json!({"states": [{"epoch": 4, "board": "d"}]}));

    assert_eq!(driver.process_pending(), vec![RoomNotice::Updated { epoch: 4, following: true }]);
    assert_eq!(driver.controller().phase(), RoomPhase::Live);
}

#[tokio::test]
async fn fail_fast_spectate_keeps_following_live_events() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = Arc::new(MemoryPushChannel::new(EmitPolicy::FailFast, 4));
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());

    driver.open(&mut session).await.unwrap();
    assert!(push.sent().is_empty());

    push.connect();
    push.deliver("gamestate", json!({"epoch": 1, "board": "a"}));
    assert_eq!(driver.process_pending(), vec![RoomNotice::Updated { epoch: 1, following: true }]);
    assert_eq!(driver.controller().phase(), RoomPhase::Syncing);
}

#[tokio::test]
async fn drop_before_spectate_ack_spectates_again_on_reconnect() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([{"epoch": 1, "board": "a"}])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();
    let lost = spectate_ack_id(&push);

    // The ack for the first spectate dies with the connection
    push.disconnect(1);
    push.connect();
    push.ack(lost, json!({"states": [{"epoch": 9, "board": "stale"}]}));
    assert!(driver.process_pending().is_empty());
    assert_eq!(driver.controller().phase(), RoomPhase::Syncing);

    let spectates = push.sent().iter().filter(|frame| frame.event() == "spectate").count();
    assert_eq!(spectates, 2);
    let id = spectate_ack_id(&push);
    assert_ne!(id, lost);

    push.ack(id, json!({"states": [{"epoch": 2, "board": "b"}]}));
    assert_eq!(driver.process_pending(), vec![RoomNotice::Updated { epoch: 2, following: true }]);
    assert_eq!(driver.controller().phase(), RoomPhase::Live);

    // Live rooms spectate again too, to fill what the gap missed
    push.disconnect(1);
    push.connect();
    driver.process_pending();
    assert_eq!(push.sent().iter().filter(|frame| frame.event() == "spectate").count(), 3);
    assert_eq!(driver.controller().phase(), RoomPhase::Live);
}

#[tokio::test]
async fn exhausted_channel_raises_banner() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();

    push.disconnect(1);
    assert_eq!(driver.banner(), None);

    push.exhaust();
    assert_eq!(driver.banner(), Some(ChannelStatus::Exhausted));
    assert_eq!(driver.controller().phase(), RoomPhase::Syncing);
}

#[tokio::test]
async fn close_releases_subscriptions() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();
    assert_eq!(driver.subscription_count(), 4);

    driver.close();

    assert_eq!(driver.controller().phase(), RoomPhase::Closed);
    assert_eq!(push.subscriber_count("gamestate"), 0);
    assert_eq!(push.subscriber_count("joined"), 0);
    assert_eq!(push.subscriber_count("finished"), 0);
    assert_eq!(push.subscriber_count(EVENT_RECONNECTED), 0);
}

#[tokio::test]
async fn next_update_waits_for_push_event() {
    let (mut session, api) = session().await;
    api.reply(Call::RoomDetail, detail("R1", json!([])));
    let push = open_channel();
    let mut driver = RoomDriver::new(RoomId::new("R1"), push.clone());
    driver.open(&mut session).await.unwrap();

    let sender = push.clone();
    tokio::spawn(async move {
        sender.deliver("gamestate", json!({"epoch": 7, "board": "g"}));
    });

    let notices = driver.next_update().await;
    assert_eq!(notices, vec![RoomNotice::Updated { epoch: 7, following: true }]);
}

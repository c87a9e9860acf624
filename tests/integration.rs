//! Integration tests for lichat-client.
//!
//! Each test plays the server over an in-memory duplex stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use lichat_client::clock::ManualClock;
use lichat_client::codec::{encode, WireValue};
use lichat_client::protocol::FrameBuffer;
use lichat_client::schema::NO_FIELDS;
use lichat_client::{Client, LichatError, Registry};

async fn written(remote: &mut DuplexStream) -> Vec<String> {
    let mut buf = vec![0u8; 64 * 1024];
    match tokio::time::timeout(Duration::from_millis(50), remote.read(&mut buf)).await {
        Ok(Ok(n)) => String::from_utf8(buf[..n].to_vec())
            .unwrap()
            .split_terminator('\0')
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

async fn connect(extensions: &str) -> (Client, DuplexStream, Arc<ManualClock>) {
    let (local, mut remote) = duplex(64 * 1024);
    let reply = format!("(connect :from \"alice\" :id 0 :clock 1000 :extensions ({}))\0", extensions);
    remote.write_all(reply.as_bytes()).await.unwrap();

    let clock = Arc::new(ManualClock::new(1000));
    let mut client = Client::builder()
        .username("alice")
        .clock(clock.clone())
        .build()
        .unwrap();
    client.connect_with(local).await.unwrap();
    written(&mut remote).await;
    (client, remote, clock)
}

// ============================================================================
// Session scenarios
// ============================================================================

#[tokio::test]
async fn test_connect_handshake() {
    let (local, mut remote) = duplex(4096);
    remote
        .write_all(b"(connect :from \"alice\" :id 0 :clock 1000)\0")
        .await
        .unwrap();
    let mut client = Client::builder().username("alice").build().unwrap();

    client.connect_with(local).await.unwrap();

    let sent = written(&mut remote).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("(connect "));
    assert!(sent[0].contains(":version \"2.0\""));
    assert!(client.is_connected());
    assert_eq!(client.username(), Some("alice"));
    assert!(client.extensions().is_empty());
}

#[tokio::test]
async fn test_server_renames_user() {
    let (local, mut remote) = duplex(4096);
    remote
        .write_all(b"(connect :from \"Alice2\" :id 0 :clock 1000)\0")
        .await
        .unwrap();
    let mut client = Client::builder().username("alice").build().unwrap();

    client.connect_with(local).await.unwrap();

    assert_eq!(client.username(), Some("Alice2"));
}

#[tokio::test]
async fn test_decode_message_frame() {
    let (mut client, mut remote, _) = connect("").await;
    remote
        .write_all(b"(message :from \"bob\" :channel \"lounge\" :text \"hi\" :id 4 :clock 1000)\0")
        .await
        .unwrap();

    let updates = client.recv(None).await.unwrap();

    assert_eq!(updates.len(), 1);
    let message = &updates[0];
    assert_eq!(message.kind().name(), "message");
    assert_eq!(message.channel(), Some("lounge"));
    assert_eq!(message.text(), Some("hi"));
    assert_eq!(message.from(), Some("bob"));
    assert_eq!(message.id(), Some(4));
}

#[tokio::test]
async fn test_private_join_skips_info_requests() {
    let (mut client, mut remote, _) =
        connect("\"shirakumo-channel-info\" \"shirakumo-backfill\"").await;
    remote
        .write_all(b"(join :from \"alice\" :channel \"@private\" :id 7 :clock 1000)\0")
        .await
        .unwrap();

    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    let sent = written(&mut remote).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("(users "));
    assert!(sent.iter().all(|s| !s.starts_with("(channel-info") && !s.starts_with("(backfill")));
    assert_eq!(client.active_channel().map(|c| c.name()), Some("@private"));
}

#[tokio::test]
async fn test_public_join_requests_info_and_backfill() {
    let (mut client, mut remote, _) =
        connect("\"shirakumo-channel-info\" \"shirakumo-backfill\"").await;
    remote
        .write_all(b"(join :from \"alice\" :channel \"lounge\" :id 7 :clock 1000)\0")
        .await
        .unwrap();

    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    let sent = written(&mut remote).await;
    let kinds: Vec<&str> = sent
        .iter()
        .map(|s| s[1..].split(' ').next().unwrap())
        .collect();
    assert_eq!(kinds, vec!["users", "channel-info", "backfill"]);
    assert!(client.channel("LOUNGE").unwrap().has_user("alice"));
}

#[tokio::test]
async fn test_split_reads_reassemble() {
    let (mut client, mut remote, _) = connect("").await;

    remote.write_all(b"(ping").await.unwrap();
    let first = client.recv(None).await.unwrap();
    remote.write_all(b" :id 1)\0").await.unwrap();
    let second = client.recv(None).await.unwrap();

    assert!(first.is_empty());
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].kind().name(), "ping");
    assert_eq!(second[0].id(), Some(1));
}

// ============================================================================
// Correlation
// ============================================================================

#[tokio::test]
async fn test_callback_receives_echoed_response() {
    let (mut client, mut remote, _) = connect("").await;
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();

    let id = client
        .send_with_callback("join", [("channel", "lounge")], move |_, sent, response| {
            *s.lock().unwrap() = Some((sent.id(), response.kind().name().to_string()));
        })
        .await
        .unwrap();
    written(&mut remote).await;
    let echo = format!("(join :from \"alice\" :channel \"lounge\" :id {} :clock 1000)\0", id);
    remote.write_all(echo.as_bytes()).await.unwrap();
    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    assert_eq!(*seen.lock().unwrap(), Some((Some(id), "join".to_string())));
    assert!(!client.is_in_flight(id));
}

#[tokio::test]
async fn test_failure_correlates_by_update_id() {
    let (mut client, mut remote, _) = connect("").await;
    let origin = Arc::new(Mutex::new(None));
    let o = origin.clone();
    client
        .on("no-such-channel", move |client, failure| {
            *o.lock().unwrap() = client.origin(failure).map(|sent| sent.kind().name().to_string());
        })
        .unwrap();
    let called = Arc::new(Mutex::new(false));
    let c = called.clone();

    let id = client
        .send_with_callback("join", [("channel", "void")], move |_, _, response| {
            assert_eq!(response.kind().name(), "no-such-channel");
            *c.lock().unwrap() = true;
        })
        .await
        .unwrap();
    written(&mut remote).await;
    let failure = format!(
        "(no-such-channel :from \"srv\" :id 55 :clock 1000 :update-id {} :text \"no\")\0",
        id
    );
    remote.write_all(failure.as_bytes()).await.unwrap();
    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    assert!(*called.lock().unwrap());
    assert_eq!(origin.lock().unwrap().as_deref(), Some("join"));
    assert!(!client.is_in_flight(id));
}

#[tokio::test]
async fn test_stale_requests_are_swept() {
    let (mut client, mut remote, clock) = connect("").await;
    let id = client.send("join", [("channel", "lounge")]).await.unwrap();
    written(&mut remote).await;
    assert!(client.is_in_flight(id));

    clock.advance(601);
    remote
        .write_all(b"(message :from \"bob\" :channel \"lounge\" :text \"hi\" :id 3 :clock 1601)\0")
        .await
        .unwrap();
    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    assert!(!client.is_in_flight(id));
}

#[tokio::test]
async fn test_fresh_requests_survive_sweep() {
    let (mut client, mut remote, clock) = connect("").await;
    let id = client.send("join", [("channel", "lounge")]).await.unwrap();
    written(&mut remote).await;

    clock.advance(600);
    remote
        .write_all(b"(message :from \"bob\" :channel \"lounge\" :text \"hi\" :id 3 :clock 1600)\0")
        .await
        .unwrap();
    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    assert!(client.is_in_flight(id));
}

// ============================================================================
// Handlers
// ============================================================================

#[tokio::test]
async fn test_handler_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (local, mut remote) = duplex(4096);
    remote
        .write_all(b"(connect :from \"alice\" :id 0 :clock 1000)\0(ping :from \"srv\" :id 3 :clock 1000)\0")
        .await
        .unwrap();
    let exact = order.clone();
    let any = order.clone();
    let mut client = Client::builder()
        .username("alice")
        .on_any(move |_, m| any.lock().unwrap().push(format!("any:{}", m.kind().name())))
        .on("ping", move |_, _| exact.lock().unwrap().push("ping".to_string()))
        .build()
        .unwrap();

    client.connect_with(local).await.unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["any:connect", "ping", "any:ping"]
    );
    let sent = written(&mut remote).await;
    assert!(sent.iter().any(|s| s.starts_with("(pong ")));
}

#[tokio::test]
async fn test_handler_can_send_from_inside_dispatch() {
    let (mut client, mut remote, _) = connect("").await;
    client
        .on("message", |client, message| {
            if message.text() == Some("!echo") {
                let channel = message.channel().unwrap_or_default().to_string();
                client
                    .queue("message", [("channel", channel.as_str()), ("text", "echo")])
                    .unwrap();
            }
        })
        .unwrap();
    remote
        .write_all(b"(message :from \"bob\" :channel \"lounge\" :text \"!echo\" :id 3 :clock 1000)\0")
        .await
        .unwrap();

    for update in client.recv(None).await.unwrap() {
        client.handle(update).await;
    }

    let sent = written(&mut remote).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].ends_with(":channel \"lounge\" :text \"echo\")"));
}

#[tokio::test]
async fn test_peer_close_runs_disconnect_handlers() {
    let (mut client, remote, _) = connect("").await;
    let seen = Arc::new(Mutex::new(0));
    let s = seen.clone();
    client.on("disconnect", move |_, _| *s.lock().unwrap() += 1).unwrap();
    drop(remote);

    client.run().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), 1);
    assert!(!client.is_connected());
    assert!(matches!(
        client.send("ping", NO_FIELDS).await,
        Err(LichatError::NotConnected)
    ));
}

// ============================================================================
// Schema and codec
// ============================================================================

#[test]
fn test_schema_composition() {
    let registry = Registry::lichat().unwrap();

    let kick = registry.kind_named("kick").unwrap();
    let fields: Vec<&str> = kick.field_names().collect();
    assert_eq!(fields, vec!["id", "clock", "from", "channel", "target"]);

    let failure = registry.tag("failure").unwrap();
    let skewed = registry.tag("clock-skewed").unwrap();
    assert!(registry.is_subkind(&skewed, &failure));
    assert!(!registry.is_subkind(&failure, &skewed));
}

#[test]
fn test_custom_schema_extends_catalogue() {
    let mut registry = Registry::lichat().unwrap();
    registry
        .load(
            "(define-extension x-reactions
               (define-object react (channel-update text-update)
                 (emoji :default \"+1\")))",
        )
        .unwrap();

    let message = registry
        .make("react", [("channel", "lounge"), ("text", "hi")])
        .unwrap();

    assert_eq!(message.get_str("emoji"), Some("+1"));
    assert!(registry.extensions().iter().any(|e| e == "x-reactions"));
}

#[test]
fn test_message_round_trip() {
    let registry = Registry::lichat().unwrap();
    let text = "(message :id 4 :clock 1000 :from \"bob\" :channel \"lounge\" :text \"a \\\"quoted\\\" line\")";

    let message = registry.decode_message(text).unwrap();

    assert_eq!(message.text(), Some("a \"quoted\" line"));
    assert_eq!(message.encode().unwrap(), text);
    assert_eq!(encode(&message.to_wire()).unwrap(), text);
}

#[test]
fn test_unknown_field_on_wire_is_rejected() {
    let registry = Registry::lichat().unwrap();

    let result = registry.decode_message("(ping :id 1 :channel \"x\")");

    assert!(matches!(result, Err(LichatError::UnknownField { .. })));
}

#[test]
fn test_legacy_namespace_is_accepted() {
    let registry = Registry::lichat().unwrap();

    let message = registry
        .decode_message("(lichat-protocol:ping :id 1 :clock 1000)")
        .unwrap();

    assert_eq!(message.kind().name(), "ping");
}

#[test]
fn test_byte_at_a_time_framing() {
    let input = b"(ping :id 1)\0(message :text \"x\")\0(pong :id 2)\0";
    let mut whole = FrameBuffer::new();
    let mut trickle = FrameBuffer::new();

    let expected: Vec<String> = whole
        .push(input)
        .unwrap()
        .iter()
        .map(|f| f.text().unwrap().to_string())
        .collect();
    let mut actual = Vec::new();
    for byte in input.iter() {
        for frame in trickle.push(std::slice::from_ref(byte)).unwrap() {
            actual.push(frame.text().unwrap().to_string());
        }
    }

    assert_eq!(expected.len(), 3);
    assert_eq!(actual, expected);
    assert!(trickle.is_empty());
}

#[test]
fn test_wire_value_lists() {
    let value = WireValue::strings(["a", "b"]);

    assert_eq!(encode(&value).unwrap(), "(\"a\" \"b\")");
    assert_eq!(value.string_items(), vec!["a", "b"]);
}

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use relaycast_core::protocol::{Ack, Envelope, EnvelopeKind, ErrorReply, MessageStatus};

#[test]
fn decode_chat_envelope() {
    let raw = br#"{"from":"creative","type":"chat","body":{"sender":"steve","chatMessage":"hi"},"id":"","timestamp":""}"#;
    let env = Envelope::decode(raw).expect("must decode");
    assert_eq!(env.from, "creative");
    assert_eq!(env.parse_kind(), Some(EnvelopeKind::Chat));
    assert_eq!(env.body.chat_message, "hi");
    assert_eq!(env.content(), "hi");
}

#[test]
fn unknown_fields_are_ignored() {
    let raw = br#"{"from":"a","type":"event","body":{"eventDetail":"joined"},"futureField":42}"#;
    let env = Envelope::decode(raw).expect("must decode");
    assert_eq!(env.content(), "joined");
}

#[test]
fn unknown_type_decodes_but_does_not_parse() {
    let raw = br#"{"from":"a","type":"telemetry","body":{}}"#;
    let env = Envelope::decode(raw).expect("lenient decode");
    assert_eq!(env.parse_kind(), None);
}

#[test]
fn ensure_id_assigns_once_and_survives_roundtrip() {
    let mut env = Envelope {
        from: "mc1".into(),
        kind: "chat".into(),
        ..Default::default()
    };
    assert!(env.id.is_empty());
    env.ensure_id();
    let id = env.id.clone();
    assert_eq!(id.len(), 32, "128-bit id rendered as hex");

    // already assigned: no change
    env.ensure_id();
    assert_eq!(env.id, id);

    let bytes = env.encode().unwrap();
    let back = Envelope::decode(&bytes).unwrap();
    assert_eq!(back.id, id);
}

#[test]
fn generated_ids_are_unique() {
    let a = relaycast_core::protocol::envelope::generate_message_id();
    let b = relaycast_core::protocol::envelope::generate_message_id();
    assert_ne!(a, b);
}

#[test]
fn command_split() {
    let env = Envelope::decode(br#"{"from":"mc1","type":"command","body":{"command":"say hello world"}}"#).unwrap();
    assert_eq!(env.body.split_command(), Some(("say", "hello world")));

    let bare = Envelope::decode(br#"{"from":"mc1","type":"command","body":{"command":"stop"}}"#).unwrap();
    assert_eq!(bare.body.split_command(), Some(("stop", "")));
    assert_eq!(Envelope::default().body.split_command(), None);
}

#[test]
fn execute_at_omitted_when_empty() {
    let env = Envelope {
        from: "mc1".into(),
        kind: "chat".into(),
        ..Default::default()
    };
    let text = String::from_utf8(env.encode().unwrap()).unwrap();
    assert!(!text.contains("executeAt"));
}

#[test]
fn ack_and_error_shapes() {
    let ack = Ack::new("abc", "success", "delivered");
    let v: serde_json::Value = serde_json::from_slice(&ack.encode().unwrap()).unwrap();
    assert_eq!(v["type"], "ack");
    assert_eq!(v["id"], "abc");
    assert_eq!(v["status"], "success");

    let err = ErrorReply::new("abc", "not authenticated", 401);
    let v: serde_json::Value = serde_json::from_slice(&err.encode().unwrap()).unwrap();
    assert_eq!(v["type"], "error");
    assert_eq!(v["code"], 401);
}

#[test]
fn status_roundtrip() {
    for s in [MessageStatus::Processing, MessageStatus::Success, MessageStatus::Failed] {
        assert_eq!(MessageStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(MessageStatus::parse("queued"), None);
}

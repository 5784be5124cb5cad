use serde_json::Value;
use serde_json::json;

use super::*;

#[derive(Default)]
struct Recorder {
    sent: Vec<SmPayload>,
    resent: Vec<(StanzaKind, Value)>,
    acked: Vec<(StanzaKind, Value)>,
    failed: Vec<(StanzaKind, Value)>,
    bound: Vec<String>,
    cached: Vec<SmState>,
}

impl SmHandler for Recorder {
    fn send(&mut self, payload: SmPayload) {
        self.sent.push(payload);
    }

    fn resend(&mut self, kind: StanzaKind, stanza: Value) {
        self.resent.push((kind, stanza));
    }

    fn acked(&mut self, kind: StanzaKind, stanza: Value) {
        self.acked.push((kind, stanza));
    }

    fn failed(&mut self, kind: StanzaKind, stanza: Value) {
        self.failed.push((kind, stanza));
    }

    fn bound(&mut self, jid: &str) {
        self.bound.push(jid.to_string());
    }

    fn cache(&mut self, state: &SmState) {
        self.cached.push(state.clone());
    }
}

fn started_session(handler: &mut Recorder) -> StreamManagement {
    let mut sm = StreamManagement::new();
    sm.enable(handler);
    sm.enabled(handler, "session-1");
    sm
}

#[test]
fn enable_and_enabled_start_the_session() {
    let mut handler = Recorder::default();
    let sm = started_session(&mut handler);
    assert!(sm.started());
    assert_eq!(sm.id(), Some("session-1"));
    assert_eq!(
        handler.sent,
        vec![SmPayload::Enable {
            allow_resumption: true
        }]
    );
    assert!(!handler.cached.is_empty());
}

#[test]
fn tracked_stanzas_trigger_requests_at_the_window() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.set_window_size(2);

    sm.track(&mut handler, StanzaKind::Message, json!({"body": "one"}));
    assert!(!handler.sent.contains(&SmPayload::Request));

    sm.track(&mut handler, StanzaKind::Message, json!({"body": "two"}));
    assert!(handler.sent.contains(&SmPayload::Request));
    assert_eq!(sm.unacked_count(), 2);

    // Only one request is outstanding at a time.
    let requests = handler.sent.iter().filter(|p| **p == SmPayload::Request).count();
    sm.track(&mut handler, StanzaKind::Message, json!({"body": "three"}));
    let after = handler.sent.iter().filter(|p| **p == SmPayload::Request).count();
    assert_eq!(requests, after);
}

#[test]
fn untracked_kinds_are_ignored() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.track(&mut handler, StanzaKind::Other, json!({}));
    assert_eq!(sm.unacked_count(), 0);

    let mut idle = StreamManagement::new();
    idle.track(&mut handler, StanzaKind::Message, json!({}));
    assert_eq!(idle.unacked_count(), 0);
}

#[test]
fn acknowledgements_release_queued_stanzas() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.set_window_size(10);
    for n in 0..3 {
        sm.track(&mut handler, StanzaKind::Message, json!({"n": n}));
    }

    sm.process(&mut handler, Some(2), false);
    assert_eq!(sm.unacked_count(), 1);
    assert_eq!(
        handler.acked,
        vec![
            (StanzaKind::Message, json!({"n": 0})),
            (StanzaKind::Message, json!({"n": 1})),
        ]
    );
}

#[test]
fn counters_wrap_modulo_2_32() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.set_window_size(100);
    // Pretend a long-lived session is about to wrap its counter.
    sm.process(&mut handler, Some(u32::MAX - 5), false);
    for n in 0..11 {
        sm.track(&mut handler, StanzaKind::Message, json!({"n": n}));
    }

    sm.process(&mut handler, Some(5), false);
    assert_eq!(handler.acked.len(), 11);
    assert_eq!(sm.unacked_count(), 0);
}

#[test]
fn inbound_counting_wraps() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    let snapshot = SmState {
        handled: u32::MAX,
        ..SmState::default()
    };
    sm.load(snapshot, &mut handler);
    sm.handle(&mut handler);
    assert_eq!(sm.handled(), 0);
    sm.ack(&mut handler);
    assert!(handler.sent.contains(&SmPayload::Ack { handled: 0 }));
}

#[test]
fn resumption_resends_unacknowledged_stanzas() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.set_window_size(10);
    for n in 0..3 {
        sm.track(&mut handler, StanzaKind::Message, json!({"n": n}));
    }

    sm.resume(&mut handler);
    assert!(handler.sent.contains(&SmPayload::Resume {
        handled: 0,
        previous_session: "session-1".to_string(),
    }));

    sm.resumed(&mut handler, "session-1", Some(1));
    assert!(sm.started());
    assert_eq!(handler.acked, vec![(StanzaKind::Message, json!({"n": 0}))]);
    assert_eq!(
        handler.resent,
        vec![
            (StanzaKind::Message, json!({"n": 1})),
            (StanzaKind::Message, json!({"n": 2})),
        ]
    );
    assert_eq!(sm.unacked_count(), 0);
}

#[test]
fn failure_reports_queued_stanzas_and_resets() {
    let mut handler = Recorder::default();
    let mut sm = started_session(&mut handler);
    sm.set_window_size(10);
    for n in 0..3 {
        sm.track(&mut handler, StanzaKind::Message, json!({"n": n}));
    }

    sm.failed(&mut handler, Some(1));
    assert_eq!(handler.acked, vec![(StanzaKind::Message, json!({"n": 0}))]);
    assert_eq!(
        handler.failed,
        vec![
            (StanzaKind::Message, json!({"n": 1})),
            (StanzaKind::Message, json!({"n": 2})),
        ]
    );
    assert!(handler.resent.is_empty());
    assert!(!sm.started());
    assert_eq!(sm.id(), None);
    assert_eq!(sm.unacked_count(), 0);
}

#[test]
fn loading_a_snapshot_restores_the_binding() {
    let mut handler = Recorder::default();
    let mut sm = StreamManagement::new();
    let snapshot = SmState {
        id: Some("old-session".to_string()),
        jid: Some("user@example.org/res".to_string()),
        handled: 7,
        last_ack: 3,
        unacked: vec![(StanzaKind::Iq, json!({"id": "q1"}))],
    };
    sm.load(snapshot, &mut handler);
    assert_eq!(sm.id(), Some("old-session"));
    assert_eq!(sm.jid(), Some("user@example.org/res"));
    assert_eq!(sm.handled(), 7);
    assert_eq!(sm.unacked_count(), 1);
    assert_eq!(handler.bound, vec!["user@example.org/res".to_string()]);
    assert!(sm.resumable());
}

#[test]
fn snapshots_survive_serialization() {
    let state = SmState {
        id: Some("s".to_string()),
        jid: None,
        handled: 42,
        last_ack: 40,
        unacked: vec![(StanzaKind::Presence, json!({"show": "away"}))],
    };
    let encoded = serde_json::to_string(&state).unwrap();
    let decoded: SmState = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.handled, 42);
    assert_eq!(decoded.last_ack, 40);
    assert_eq!(decoded.unacked, state.unacked);
}

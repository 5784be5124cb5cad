//! XEP-0198 stream management: delivery acknowledgements and session
//! resumption.
//!
//! [StreamManagement] tracks outbound stanzas until the peer
//! acknowledges them and counts inbound stanzas so the peer can do the
//! same. Counters are modulo 2^32 per the protocol, so all arithmetic
//! here wraps. The session layer drives it through an [SmHandler],
//! which receives control payloads to put on the wire, stanzas to
//! resend or give up on, and state snapshots to persist for resumption
//! across process restarts.

use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Which queue a tracked stanza belongs to. Only the three stanza
/// kinds count toward acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StanzaKind {
    Message,
    Presence,
    Iq,
    Other,
}

/// A stream management control payload to be serialized and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmPayload {
    Enable { allow_resumption: bool },
    Resume { handled: u32, previous_session: String },
    Ack { handled: u32 },
    Request,
}

/// A resumable snapshot of the counters and the unacknowledged queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmState {
    pub id: Option<String>,
    pub jid: Option<String>,
    pub handled: u32,
    pub last_ack: u32,
    pub unacked: Vec<(StanzaKind, Value)>,
}

/// The session-side callbacks stream management drives.
pub trait SmHandler {
    /// Puts a control payload on the wire.
    fn send(&mut self, payload: SmPayload);
    /// Retransmits a stanza after a resumption reported it unhandled.
    fn resend(&mut self, kind: StanzaKind, stanza: Value);
    /// The peer has acknowledged this stanza.
    fn acked(&mut self, kind: StanzaKind, stanza: Value);
    /// The stanza will never be delivered by this session.
    fn failed(&mut self, kind: StanzaKind, stanza: Value);
    /// A resumed session is bound to this address.
    fn bound(&mut self, jid: &str);
    /// Persists a state snapshot for later resumption.
    fn cache(&mut self, state: &SmState);
}

pub struct StreamManagement {
    allow_resume: bool,
    id: Option<String>,
    jid: Option<String>,
    last_ack: u32,
    handled: u32,
    window_size: u32,
    unacked: VecDeque<(StanzaKind, Value)>,
    pending_ack: bool,
    inbound_started: bool,
    outbound_started: bool,
}

impl StreamManagement {
    pub fn new() -> StreamManagement {
        StreamManagement {
            allow_resume: true,
            id: None,
            jid: None,
            last_ack: 0,
            handled: 0,
            window_size: 1,
            unacked: VecDeque::new(),
            pending_ack: false,
            inbound_started: false,
            outbound_started: false,
        }
    }

    /// Whether to request a resumable session. While disabled, state
    /// snapshots are not emitted through [SmHandler::cache], since a
    /// restart would have nothing to resume.
    pub fn set_allow_resume(&mut self, allow: bool) {
        self.allow_resume = allow;
    }

    /// How many unacknowledged stanzas may accumulate before an
    /// acknowledgement is requested.
    pub fn set_window_size(&mut self, size: u32) {
        self.window_size = size.max(1);
    }

    pub fn set_jid(&mut self, jid: &str) {
        self.jid = Some(jid.to_string());
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn jid(&self) -> Option<&str> {
        self.jid.as_deref()
    }

    pub fn resumable(&self) -> bool {
        self.allow_resume && self.id.is_some()
    }

    pub fn started(&self) -> bool {
        self.outbound_started && self.inbound_started
    }

    pub fn handled(&self) -> u32 {
        self.handled
    }

    pub fn unacked_count(&self) -> usize {
        self.unacked.len()
    }

    /// Restores a cached snapshot before attempting resumption.
    pub fn load(&mut self, state: SmState, handler: &mut impl SmHandler) {
        self.id = state.id;
        self.allow_resume = true;
        self.handled = state.handled;
        self.last_ack = state.last_ack;
        self.unacked = state.unacked.into();
        if let Some(jid) = &state.jid {
            self.jid = Some(jid.clone());
            handler.bound(jid);
        }
    }

    pub fn enable(&mut self, handler: &mut impl SmHandler) {
        handler.send(SmPayload::Enable {
            allow_resumption: self.allow_resume,
        });
        self.handled = 0;
        self.pending_ack = false;
        self.outbound_started = true;
    }

    pub fn resume(&mut self, handler: &mut impl SmHandler) {
        handler.send(SmPayload::Resume {
            handled: self.handled,
            previous_session: self.id.clone().unwrap_or_default(),
        });
        self.pending_ack = false;
        self.outbound_started = true;
    }

    /// The peer accepted enablement.
    pub fn enabled(&mut self, handler: &mut impl SmHandler, id: &str) {
        self.id = Some(id.to_string());
        self.handled = 0;
        self.inbound_started = true;
        self.emit_cache(handler);
    }

    /// The peer accepted resumption, acknowledging up to `handled`.
    pub fn resumed(
        &mut self,
        handler: &mut impl SmHandler,
        previous_session: &str,
        handled: Option<u32>,
    ) {
        self.id = Some(previous_session.to_string());
        if handled.is_some() {
            self.process(handler, handled, true);
        }
        self.inbound_started = true;
        self.emit_cache(handler);
    }

    /// Enablement or resumption failed. Queued stanzas are reported as
    /// undeliverable and the session state is reset.
    pub fn failed(&mut self, handler: &mut impl SmHandler, handled: Option<u32>) {
        if handled.is_some() {
            self.process(handler, handled, false);
        }
        while let Some((kind, stanza)) = self.unacked.pop_front() {
            handler.failed(kind, stanza);
        }
        self.inbound_started = false;
        self.outbound_started = false;
        self.id = None;
        self.last_ack = 0;
        self.handled = 0;
        self.pending_ack = false;
        self.emit_cache(handler);
    }

    /// Answers the peer's acknowledgement request.
    pub fn ack(&mut self, handler: &mut impl SmHandler) {
        handler.send(SmPayload::Ack {
            handled: self.handled,
        });
    }

    /// Asks the peer to acknowledge what it has handled so far.
    pub fn request(&mut self, handler: &mut impl SmHandler) {
        self.pending_ack = true;
        handler.send(SmPayload::Request);
    }

    /// Processes an acknowledgement from the peer. With `resend`,
    /// stanzas past the acknowledged point are retransmitted instead of
    /// kept queued.
    pub fn process(
        &mut self,
        handler: &mut impl SmHandler,
        handled: Option<u32>,
        resend: bool,
    ) {
        let Some(handled) = handled else {
            return;
        };
        let num_acked = handled.wrapping_sub(self.last_ack);
        self.pending_ack = false;
        for _ in 0..num_acked {
            let Some((kind, stanza)) = self.unacked.pop_front() else {
                break;
            };
            handler.acked(kind, stanza);
        }
        self.last_ack = handled;
        if resend {
            let pending: Vec<(StanzaKind, Value)> = self.unacked.drain(..).collect();
            for (kind, stanza) in pending {
                handler.resend(kind, stanza);
            }
        }
        self.emit_cache(handler);
        if self.need_ack() {
            self.request(handler);
        }
    }

    /// Tracks an outbound stanza until the peer acknowledges it.
    /// Retransmissions are not re-tracked.
    pub fn track(&mut self, handler: &mut impl SmHandler, kind: StanzaKind, stanza: Value) {
        if kind == StanzaKind::Other || !self.outbound_started {
            return;
        }
        self.unacked.push_back((kind, stanza));
        self.emit_cache(handler);
        if self.need_ack() {
            self.request(handler);
        }
    }

    /// Counts one handled inbound stanza.
    pub fn handle(&mut self, handler: &mut impl SmHandler) {
        if self.inbound_started {
            self.handled = self.handled.wrapping_add(1);
            self.emit_cache(handler);
        }
    }

    fn need_ack(&self) -> bool {
        !self.pending_ack && self.unacked.len() >= self.window_size as usize
    }

    fn emit_cache(&self, handler: &mut impl SmHandler) {
        if !self.allow_resume {
            return;
        }
        let state = SmState {
            id: self.id.clone(),
            jid: self.jid.clone(),
            handled: self.handled,
            last_ack: self.last_ack,
            unacked: self.unacked.iter().cloned().collect(),
        };
        handler.cache(&state);
    }
}

impl Default for StreamManagement {
    fn default() -> StreamManagement {
        StreamManagement::new()
    }
}

#[cfg(test)]
mod tests;

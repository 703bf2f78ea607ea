//! Property-based tests.
//!
//! These use proptest to check invariants over arbitrary inputs:
//! - plugin chains run in registration order and stop at the first drop
//! - wire headers survive a roundtrip and reject malformed input
//! - staged stream runs drain exactly once, staged datagrams are read once
//! - datagrams for other sessions never disturb a live connection

mod common;

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use common::*;
use helium_core::core::WIRE_HEADER_SIZE;
use helium_core::plugins::{Plugin, PluginChain, PluginError, PluginVerdict};
use helium_core::session::{ConnState, SessionId};
use helium_core::transport::{Carrier, InboundStage, WireError, decode, encode};
use proptest::prelude::*;

type Log = Rc<RefCell<Vec<(char, usize)>>>;

/// Records which plugin ran, in which direction, and can drop at will.
struct Recorder {
    index: usize,
    log: Log,
    drop: bool,
}

impl Plugin for Recorder {
    fn ingress(&mut self, _packet: &mut [u8], _len: &mut usize) -> PluginVerdict {
        self.log.borrow_mut().push(('i', self.index));
        if self.drop { PluginVerdict::Drop } else { PluginVerdict::Continue }
    }

    fn egress(&mut self, _packet: &mut [u8], _len: &mut usize) -> PluginVerdict {
        self.log.borrow_mut().push(('e', self.index));
        if self.drop { PluginVerdict::Drop } else { PluginVerdict::Continue }
    }
}

fn chain_of(n: usize, drop_at: Option<usize>, log: &Log) -> PluginChain {
    let mut chain = PluginChain::new();
    for index in 0..n {
        chain.register(Recorder {
            index,
            log: Rc::clone(log),
            drop: drop_at == Some(index),
        });
    }
    chain
}

#[test]
fn prop_chain_runs_in_registration_order() {
    proptest!(|(n in 1usize..=10, data in prop::collection::vec(any::<u8>(), 1..64))| {
        let log = Log::default();
        let mut chain = chain_of(n, None, &log);
        prop_assert_eq!(chain.len(), n);

        let mut packet = data.clone();
        let mut len = packet.len();
        chain.ingress(&mut packet, &mut len).unwrap();
        chain.egress(&mut packet, &mut len).unwrap();

        let expected: Vec<(char, usize)> = (0..n)
            .map(|i| ('i', i))
            .chain((0..n).rev().map(|i| ('e', i)))
            .collect();
        prop_assert_eq!(&*log.borrow(), &expected);
        prop_assert_eq!(&packet[..len], &data[..]);
    });
}

#[test]
fn prop_drop_stops_chain() {
    proptest!(|((n, k) in (1usize..=10).prop_flat_map(|n| (Just(n), 0..n)))| {
        let log = Log::default();
        let mut chain = chain_of(n, Some(k), &log);

        let mut packet = vec![0xAB; 32];
        let mut len = packet.len();
        prop_assert_eq!(chain.ingress(&mut packet, &mut len), Err(PluginError::Drop));
        let ran: Vec<usize> = log.borrow().iter().map(|(_, i)| *i).collect();
        prop_assert_eq!(ran, (0..=k).collect::<Vec<_>>());

        log.borrow_mut().clear();
        prop_assert_eq!(chain.egress(&mut packet, &mut len), Err(PluginError::Drop));
        let ran: Vec<usize> = log.borrow().iter().map(|(_, i)| *i).collect();
        prop_assert_eq!(ran, (k..n).rev().collect::<Vec<_>>());
    });
}

#[test]
fn test_registration_is_append_only() {
    for n in [1, 3, 10] {
        let log = Log::default();
        let mut chain = chain_of(n, None, &log);
        chain.register(Recorder {
            index: n,
            log: Rc::clone(&log),
            drop: false,
        });

        let mut packet = [0u8; 4];
        let mut len = 4;
        chain.ingress(&mut packet, &mut len).unwrap();
        assert_eq!(log.borrow().last(), Some(&('i', n)));
        assert_eq!(chain.len(), n + 1);
    }
}

#[test]
fn prop_header_roundtrip() {
    proptest!(|(id in any::<u64>(), minor in any::<u8>(), aggressive in any::<bool>(),
                payload in prop::collection::vec(any::<u8>(), 0..32))| {
        let mut datagram = encode(SessionId::new(id), 1, minor, aggressive).to_vec();
        datagram.extend_from_slice(&payload);

        let header = decode(&datagram, 1).unwrap();
        prop_assert_eq!(header.session_id, SessionId::new(id));
        prop_assert_eq!(header.version.minor, minor);
        prop_assert_eq!(header.aggressive, aggressive);
    });
}

#[test]
fn prop_short_header_rejected() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..WIRE_HEADER_SIZE))| {
        let is_too_short = matches!(decode(&bytes, 1), Err(WireError::TooShort { .. }));
        prop_assert!(is_too_short);
    });
}

#[test]
fn prop_corrupt_magic_rejected() {
    proptest!(|(id in any::<u64>(), magic in any::<[u8; 2]>())| {
        prop_assume!(&magic != b"He");
        let mut header = encode(SessionId::new(id), 1, 0, false);
        header[..2].copy_from_slice(&magic);
        let is_bad_magic = matches!(decode(&header, 1), Err(WireError::BadMagic(_)));
        prop_assert!(is_bad_magic);
    });
}

#[test]
fn prop_stream_run_drains_exactly() {
    proptest!(|(run in prop::collection::vec(any::<u8>(), 1..4096),
                chunks in prop::collection::vec(1usize..512, 1..32))| {
        let mut stage = InboundStage::new(Carrier::Stream, 0);
        stage.stage_run(&run).unwrap();

        let mut drained = Vec::new();
        let mut buf = [0u8; 512];
        for size in chunks.iter().cycle() {
            if stage.remaining() == 0 {
                break;
            }
            // not drained yet, restaging is refused
            prop_assert!(stage.stage_run(b"more").is_err());
            let n = stage.read(&mut buf[..*size]).unwrap();
            prop_assert_eq!(n, (*size).min(run.len() - drained.len()));
            drained.extend_from_slice(&buf[..n]);
        }

        prop_assert_eq!(&drained, &run);
        prop_assert_eq!(
            stage.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        prop_assert!(stage.stage_run(b"next").is_ok());
    });
}

#[test]
fn prop_datagram_read_once() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 1..1500), reads in 2usize..5)| {
        let mut stage = InboundStage::new(Carrier::Datagram, 1500);
        stage.datagram_buffer().fill(&payload).unwrap();
        stage.stage_packet(0, payload.len());

        let mut buf = vec![0u8; 1500];
        prop_assert_eq!(stage.read(&mut buf).unwrap(), payload.len());
        prop_assert_eq!(&buf[..payload.len()], &payload[..]);
        for _ in 1..reads {
            prop_assert_eq!(
                stage.read(&mut buf).unwrap_err().kind(),
                io::ErrorKind::WouldBlock
            );
        }
    });
}

#[test]
fn prop_foreign_datagrams_never_reach_engine() {
    proptest!(|(id in any::<u64>(), garbage in prop::collection::vec(any::<u8>(), 1..256))| {
        let (mut client, mut server) = pair(Carrier::Datagram);
        establish(&mut client, &mut server);
        prop_assume!(SessionId::new(id) != server.session_id());

        let mut datagram = encode(SessionId::new(id), 1, 0, false).to_vec();
        datagram.extend_from_slice(&garbage);
        let err = server.outside_data_received(&datagram).unwrap_err();
        prop_assert!(err.is_silent_drop(), "unexpected error: {err}");

        // headerless noise
        if garbage.len() < WIRE_HEADER_SIZE || garbage[..2] != *b"He" {
            let err = server.outside_data_received(&garbage).unwrap_err();
            prop_assert!(err.is_silent_drop(), "unexpected error: {err}");
        }
        prop_assert_eq!(server.state(), ConnState::Online);
        prop_assert!(server.host().outbox.is_empty());

        let packet = ipv4_packet(100, 5);
        client.send_packet(&packet).unwrap();
        pump(&mut client, &mut server);
        prop_assert_eq!(&server.host().delivered, &vec![packet]);
    });
}

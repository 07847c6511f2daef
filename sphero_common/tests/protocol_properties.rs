//! Property tests for the frame codec: round trip, escaping and checksum
//! soundness over arbitrary messages.

use proptest::prelude::*;
use sphero_common::protocol::consts::{END, ESCAPE, MAX_PAYLOAD_LEN, START};
use sphero_common::protocol::{CommandMessage, Flags, FrameDecoder, ProtocolError, checksum};

fn arb_message() -> impl Strategy<Value = CommandMessage> {
    (
        any::<u8>(),
        any::<u8>(),
        any::<u8>(),
        prop::option::of(any::<u8>()),
        prop::option::of(any::<u8>()),
        prop::collection::vec(any::<u8>(), 0..MAX_PAYLOAD_LEN),
        any::<bool>(),
    )
        .prop_map(|(device, command, seq, target, source, payload, response)| {
            let mut msg = CommandMessage::request(device, command, target, seq, &payload)
                .expect("payload fits");
            msg.source_id = source;
            msg.flags.set(Flags::HAS_SOURCE_ID, source.is_some());
            msg.flags.set(Flags::IS_RESPONSE, response);
            msg
        })
}

/// Payloads guaranteed to contain at least one reserved byte.
fn arb_reserved_payload() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(any::<u8>(), 0..40),
        prop::sample::select(vec![START, END, ESCAPE, 0x88]),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(mut bytes, reserved, at)| {
            let pos = at.index(bytes.len() + 1);
            bytes.insert(pos, reserved);
            bytes
        })
}

fn decode_all(bytes: &[u8]) -> Vec<Result<CommandMessage, ProtocolError>> {
    FrameDecoder::new().feed(bytes)
}

proptest! {
    /// decode(encode(m)) == m.
    #[test]
    fn encode_decode_round_trip(msg in arb_message()) {
        let out = decode_all(&msg.encode());
        prop_assert_eq!(out.len(), 1);
        let decoded = out[0].clone().expect("valid frame");
        prop_assert_eq!(decoded.device_id, msg.device_id);
        prop_assert_eq!(decoded.command_id, msg.command_id);
        prop_assert_eq!(decoded.sequence, msg.sequence);
        prop_assert_eq!(decoded.payload.clone(), msg.payload.clone());
        prop_assert_eq!(decoded, msg);
    }

    /// Reserved bytes never appear literally inside the frame and survive
    /// the trip through the receiver.
    #[test]
    fn escaping_preserves_reserved_bytes(payload in arb_reserved_payload(), seq in any::<u8>()) {
        let msg = CommandMessage::request(0x18, 2, Some(0x12), seq, &payload).expect("fits");
        let frame = msg.encode();
        let interior = &frame[1..frame.len() - 1];
        prop_assert!(!interior.contains(&START));
        prop_assert!(!interior.contains(&END));

        let out = decode_all(&frame);
        let decoded = out[0].clone().expect("valid frame");
        prop_assert_eq!(decoded.payload.as_slice(), payload.as_slice());
    }

    /// The checksum byte covers flags through the last payload byte.
    #[test]
    fn checksum_matches_definition(msg in arb_message()) {
        let body = msg.body();
        let sum: u32 = body.iter().map(|&b| b as u32).sum();
        prop_assert_eq!(checksum(&body), (!sum & 0xFF) as u8);
    }

    /// Corrupting any single body byte makes the receiver drop the frame.
    #[test]
    fn single_byte_corruption_is_dropped(
        msg in arb_message(),
        at in any::<prop::sample::Index>(),
        delta in 1u8..=255,
    ) {
        let mut body = msg.body();
        let sum = checksum(&body);
        let i = at.index(body.len());
        body[i] = body[i].wrapping_add(delta);

        // Re-frame the corrupted body with the original checksum.
        let mut frame = vec![START];
        for &b in body.iter().chain(std::iter::once(&sum)) {
            if matches!(b, START | END | ESCAPE) {
                frame.push(ESCAPE);
                frame.push(b & !0x88);
            } else {
                frame.push(b);
            }
        }
        frame.push(END);

        let decoded: Vec<_> = decode_all(&frame).into_iter().filter_map(Result::ok).collect();
        prop_assert!(decoded.is_empty());
    }
}

/// A corrupted frame followed by a valid one yields only the valid one.
#[test]
fn flipped_checksum_between_valid_frames() {
    let first = CommandMessage::request(0x13, 3, None, 1, &[]).expect("fits");
    let second = CommandMessage::request(0x16, 6, Some(0x12), 2, &[]).expect("fits");

    let mut bad = first.encode();
    let chk = bad.len() - 2;
    bad[chk] = !bad[chk] & 0x7F;

    let mut stream = bad;
    stream.extend(second.encode());

    let decoded: Vec<_> = decode_all(&stream).into_iter().filter_map(Result::ok).collect();
    assert_eq!(decoded, vec![second]);
}

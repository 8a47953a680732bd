//! Integration tests for the message model and frame assembly

use bytes::Bytes;
use repwire_core::message::{Frame, Message, MessageAssembler};

#[test]
fn test_message_builder_basic() {
    let msg = Message::new()
        .push_str("hop")
        .push_empty()
        .push(Vec::from(&b"body"[..]));

    assert_eq!(msg.len(), 3);
    assert_eq!(msg.byte_len(), 7);
    assert_eq!(msg.frame_str(0), Some("hop"));

    let parts = msg.into_parts();
    assert_eq!(parts[0], Bytes::from_static(b"hop"));
    assert!(parts[1].is_empty());
    assert_eq!(parts[2], Bytes::from_static(b"body"));
}

#[test]
fn test_assembler_rebuilds_wire_message() {
    let original = Message::new().push_str("X").push_empty().push_str("A");
    let mut assembler = MessageAssembler::default();

    let mut completed = Vec::new();
    for frame in original.frames() {
        if let Some(msg) = assembler.push_frame(frame).unwrap() {
            completed.push(msg);
        }
    }
    assert_eq!(completed, vec![original]);
}

#[test]
fn test_assembler_splits_back_to_back_messages() {
    let mut assembler = MessageAssembler::default();

    assert_eq!(assembler.push_frame(Frame::new("", true)).unwrap(), None);
    assert!(assembler.in_progress());
    let first = assembler.push_frame(Frame::new("one", false)).unwrap();
    let second = assembler.push_frame(Frame::new("two", false)).unwrap();

    assert_eq!(first, Some(Message::new().push_empty().push_str("one")));
    assert_eq!(second, Some(Message::from("two")));
}

//! Codec Tests
//!
//! Tests for request/reply framing and command validation.

use std::io::Cursor;

use keysync::engine::{SetOutcome, Snapshot};
use keysync::protocol::{
    decode_request, decode_server_frame, encode_event, encode_reply, encode_request, read_frame,
    write_frame, Command, Response, ServerFrame, MAX_FRAME_SIZE,
};
use keysync::registry::Event;
use keysync::{Reference, SyncError};
use serde_json::{json, Value};

const REF: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

// =============================================================================
// Request Decoding Tests
// =============================================================================

#[test]
fn test_decode_request() {
    let request = decode_request(r#"{"ack": 3, "command": "get", "args": {"known": 2}}"#).unwrap();

    assert_eq!(request.ack, 3);
    assert_eq!(request.command, "get");
    assert_eq!(request.command().unwrap(), Command::Get { known: Some(2) });
}

#[test]
fn test_decode_request_without_args() {
    let request = decode_request(r#"{"ack": 1, "command": "now"}"#).unwrap();

    assert_eq!(request.command().unwrap(), Command::Now);
}

#[test]
fn test_decode_request_without_ack_is_abuse() {
    let err = decode_request(r#"{"command": "now"}"#).unwrap_err();
    assert!(matches!(err, SyncError::ProtocolAbuse(_)));

    let err = decode_request(r#"{"ack": null, "command": "now"}"#).unwrap_err();
    assert!(matches!(err, SyncError::ProtocolAbuse(_)));

    let err = decode_request(r#"{"ack": "one", "command": "now"}"#).unwrap_err();
    assert!(matches!(err, SyncError::ProtocolAbuse(_)));
}

#[test]
fn test_decode_garbage_is_abuse() {
    for line in ["not json", "[1, 2]", "42", "{\"ack\": 1"] {
        let err = decode_request(line).unwrap_err();
        assert!(matches!(err, SyncError::ProtocolAbuse(_)), "line: {}", line);
    }
}

#[test]
fn test_missing_command_name_is_answerable() {
    let request = decode_request(r#"{"ack": 9}"#).unwrap();

    assert_eq!(request.ack, 9);
    assert!(matches!(
        request.command().unwrap_err(),
        SyncError::UnknownCommand(_)
    ));
}

// =============================================================================
// Command Validation Tests
// =============================================================================

#[test]
fn test_parse_select_key() {
    let cmd = Command::parse("selectKey", &json!({ "ref": REF })).unwrap();
    assert_eq!(
        cmd,
        Command::SelectKey {
            reference: Some(Reference::parse(REF).unwrap())
        }
    );

    let cmd = Command::parse("selectKey", &json!({ "ref": null })).unwrap();
    assert_eq!(cmd, Command::SelectKey { reference: None });
}

#[test]
fn test_parse_select_key_rejects_bad_references() {
    let bad = [
        json!({ "ref": "abc" }),
        json!({ "ref": REF.to_uppercase() }),
        json!({ "ref": format!("{}0", REF) }),
        json!({ "ref": REF.replace('a', "g") }),
        json!({ "ref": 12 }),
    ];

    for args in bad {
        let err = Command::parse("selectKey", &args).unwrap_err();
        assert!(err.is_validation(), "args: {}", args);
    }
}

#[test]
fn test_parse_get_known_is_lenient() {
    assert_eq!(
        Command::parse("get", &json!({})).unwrap(),
        Command::Get { known: None }
    );
    assert_eq!(
        Command::parse("get", &json!({ "known": "2" })).unwrap(),
        Command::Get { known: None }
    );
}

#[test]
fn test_parse_set() {
    assert_eq!(
        Command::parse("set", &json!({ "data": "abc", "version": 4 })).unwrap(),
        Command::Set {
            data: "abc".to_string(),
            version: Some(4)
        }
    );
    assert_eq!(
        Command::parse("set", &json!({ "data": "" })).unwrap(),
        Command::Set {
            data: String::new(),
            version: None
        }
    );
}

#[test]
fn test_parse_set_rejects_bad_version() {
    let err = Command::parse("set", &json!({ "data": "abc", "version": 0 })).unwrap_err();
    assert!(matches!(err, SyncError::InvalidVersion(_)));
}

#[test]
fn test_parse_rejects_non_object_args() {
    assert!(Command::parse("get", &json!([1])).is_err());
}

#[test]
fn test_encode_request_decodes_to_same_command() {
    let cmd = Command::Set {
        data: "payload".to_string(),
        version: Some(2),
    };

    let request = decode_request(&encode_request(5, &cmd)).unwrap();

    assert_eq!(request.ack, 5);
    assert_eq!(request.command().unwrap(), cmd);
}

// =============================================================================
// Reply / Event Encoding Tests
// =============================================================================

fn reply_value(response: &Response) -> Value {
    let line = encode_reply(11, response);
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["ack"], 11);
    value["response"].clone()
}

#[test]
fn test_reply_shapes() {
    assert_eq!(reply_value(&Response::Timestamp(99)), json!({ "timestamp": 99 }));
    assert_eq!(reply_value(&Response::Selected), json!({}));
    assert_eq!(reply_value(&Response::Document(None)), Value::Null);
    assert_eq!(
        reply_value(&Response::Document(Some(Snapshot {
            version: 2,
            data: None
        }))),
        json!({ "version": 2 })
    );
    assert_eq!(
        reply_value(&Response::Document(Some(Snapshot {
            version: 2,
            data: Some("D2".to_string())
        }))),
        json!({ "data": "D2", "version": 2 })
    );
    assert_eq!(
        reply_value(&Response::Set(SetOutcome::Committed { version: 3 })),
        json!({ "success": true, "version": 3 })
    );
    assert_eq!(
        reply_value(&Response::Set(SetOutcome::Conflict {
            data: Some("D2".to_string()),
            version: Some(2)
        })),
        json!({ "success": false, "data": "D2", "version": 2 })
    );
    assert_eq!(
        reply_value(&Response::Set(SetOutcome::Conflict {
            data: None,
            version: None
        })),
        json!({ "success": false })
    );
    assert_eq!(
        reply_value(&Response::error("reference is not provided")),
        json!({ "error": "reference is not provided" })
    );
}

#[test]
fn test_decode_server_frames() {
    let reply = decode_server_frame(&encode_reply(4, &Response::Selected)).unwrap();
    assert_eq!(
        reply,
        ServerFrame::Reply {
            ack: 4,
            response: json!({})
        }
    );

    let event = decode_server_frame(&encode_event(&Event::Changed)).unwrap();
    assert_eq!(
        event,
        ServerFrame::Event {
            name: "changed".to_string()
        }
    );

    assert!(decode_server_frame("{}").is_err());
}

// =============================================================================
// Stream-based I/O Tests
// =============================================================================

#[test]
fn test_read_frames_from_stream() {
    let mut stream = Cursor::new(b"first\nsecond\r\nthird".to_vec());

    assert_eq!(read_frame(&mut stream).unwrap().as_deref(), Some("first"));
    assert_eq!(read_frame(&mut stream).unwrap().as_deref(), Some("second"));
    assert_eq!(read_frame(&mut stream).unwrap().as_deref(), Some("third"));
    assert_eq!(read_frame(&mut stream).unwrap(), None);
}

#[test]
fn test_write_then_read_frame() {
    let mut buf = Vec::new();
    write_frame(&mut buf, r#"{"event":"changed"}"#).unwrap();
    assert_eq!(buf.last(), Some(&b'\n'));

    let mut stream = Cursor::new(buf);
    assert_eq!(
        read_frame(&mut stream).unwrap().as_deref(),
        Some(r#"{"event":"changed"}"#)
    );
}

#[test]
fn test_oversized_frame_is_abuse() {
    let mut line = vec![b'x'; MAX_FRAME_SIZE + 10];
    line.push(b'\n');
    let mut stream = Cursor::new(line);

    let err = read_frame(&mut stream).unwrap_err();
    assert!(matches!(err, SyncError::ProtocolAbuse(_)));
}

#[test]
fn test_invalid_utf8_frame_is_abuse() {
    let mut stream = Cursor::new(vec![0xff, 0xfe, b'\n']);

    let err = read_frame(&mut stream).unwrap_err();
    assert!(matches!(err, SyncError::ProtocolAbuse(_)));
}

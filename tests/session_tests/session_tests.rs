//! Tests for Session
//!
//! These tests verify:
//! - The unselected / selected state machine
//! - Validation errors are answered, not fatal
//! - Commits broadcast `changed` to the other subscribers only
//! - Writer metadata, bucket scoping and the data size limit

use std::sync::{Arc, Mutex};

use keysync::config::{Config, ConfigBuilder};
use keysync::protocol::{Request, Response};
use keysync::registry::{ConnectionId, Event, EventSink};
use keysync::service::SyncService;
use keysync::session::{Session, SessionState};
use keysync::{DocumentKey, SetOutcome, Snapshot};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<ConnectionId>>,
}

impl RecordingSink {
    fn received(&self) -> Vec<ConnectionId> {
        self.sent.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn send(&self, connection: ConnectionId, _event: &Event) {
        self.sent.lock().unwrap().push(connection);
    }
}

fn setup_with(
    configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder,
) -> (TempDir, Arc<RecordingSink>, SyncService) {
    let temp_dir = TempDir::new().unwrap();
    let builder = Config::builder().data_dir(temp_dir.path()).fsync_writes(false);
    let sink = Arc::new(RecordingSink::default());
    let service = SyncService::open(&configure(builder).build(), sink.clone()).unwrap();
    (temp_dir, sink, service)
}

fn setup() -> (TempDir, Arc<RecordingSink>, SyncService) {
    setup_with(|b| b)
}

fn session(service: &SyncService) -> Session {
    Session::new(service.next_connection_id(), Some("192.0.2.1".to_string()))
}

fn request(command: &str, args: Value) -> Request {
    Request {
        ack: 1,
        command: command.to_string(),
        args,
    }
}

fn select(session: &mut Session, service: &SyncService, reference: &str) -> Response {
    session.handle(service, &request("selectKey", json!({ "ref": reference })))
}

fn set(session: &mut Session, service: &SyncService, data: &str, version: Option<u64>) -> Response {
    session.handle(service, &request("set", json!({ "data": data, "version": version })))
}

fn get(session: &mut Session, service: &SyncService, known: Option<u64>) -> Response {
    session.handle(service, &request("get", json!({ "known": known })))
}

const REF: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
const OTHER_REF: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

// =============================================================================
// State Machine Tests
// =============================================================================

#[test]
fn test_new_session_is_unselected() {
    let (_temp, _sink, service) = setup();
    let session = session(&service);

    assert_eq!(session.state(), &SessionState::Unselected);
}

#[test]
fn test_get_and_set_require_selection() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);

    assert_eq!(
        get(&mut s, &service, None),
        Response::error("reference is not provided")
    );
    assert_eq!(
        set(&mut s, &service, "x", None),
        Response::error("reference is not provided")
    );
}

#[test]
fn test_select_and_deselect() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);

    assert_eq!(select(&mut s, &service, REF), Response::Selected);
    assert_eq!(
        s.state(),
        &SessionState::Selected(DocumentKey::parse(None, REF).unwrap())
    );
    assert_eq!(service.registry().key_count(), 1);

    let response = s.handle(&service, &request("selectKey", json!({ "ref": null })));
    assert_eq!(response, Response::Selected);
    assert_eq!(s.state(), &SessionState::Unselected);
    assert_eq!(service.registry().key_count(), 0);
}

#[test]
fn test_invalid_reference_keeps_previous_selection() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);

    let response = select(&mut s, &service, "not-hex");
    assert!(response.is_error());

    let upper = REF.to_uppercase();
    assert!(select(&mut s, &service, &upper).is_error());

    assert_eq!(
        s.state(),
        &SessionState::Selected(DocumentKey::parse(None, REF).unwrap())
    );
}

#[test]
fn test_close_releases_subscription() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);
    let id = s.id();

    s.close(&service);

    assert_eq!(service.registry().selected_key(id), None);
    assert_eq!(service.registry().key_count(), 0);
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_now_returns_timestamp() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);

    match s.handle(&service, &request("now", Value::Null)) {
        Response::Timestamp(ts) => assert!(ts > 1_600_000_000_000),
        other => panic!("Expected timestamp, got {:?}", other),
    }
}

#[test]
fn test_unknown_command_is_answered() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);

    let response = s.handle(&service, &request("delete", json!({})));
    assert_eq!(response, Response::error("unknown command: delete"));
}

#[test]
fn test_set_get_roundtrip_through_session() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);

    assert_eq!(get(&mut s, &service, None), Response::Document(None));
    assert_eq!(
        set(&mut s, &service, "D1", None),
        Response::Set(SetOutcome::Committed { version: 1 })
    );
    assert_eq!(
        get(&mut s, &service, Some(1)),
        Response::Document(Some(Snapshot {
            version: 1,
            data: None
        }))
    );
    assert_eq!(
        get(&mut s, &service, None),
        Response::Document(Some(Snapshot {
            version: 1,
            data: Some("D1".to_string())
        }))
    );
}

#[test]
fn test_set_validation_errors() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);

    let cases = [
        json!({ "version": null }),
        json!({ "data": 42 }),
        json!({ "data": "x", "version": 0 }),
        json!({ "data": "x", "version": -3 }),
        json!({ "data": "x", "version": 1.5 }),
        json!({ "data": "x", "version": "1" }),
    ];

    for args in cases {
        let response = s.handle(&service, &request("set", args.clone()));
        assert!(response.is_error(), "expected error for {}", args);
    }

    // Nothing was written
    assert_eq!(get(&mut s, &service, None), Response::Document(None));
}

#[test]
fn test_set_rejects_oversized_data() {
    let (_temp, _sink, service) = setup_with(|b| b.max_data_size(16));
    let mut s = session(&service);
    select(&mut s, &service, REF);

    assert!(set(&mut s, &service, &"x".repeat(17), None).is_error());
    assert_eq!(
        set(&mut s, &service, &"x".repeat(16), None),
        Response::Set(SetOutcome::Committed { version: 1 })
    );
}

#[test]
fn test_set_records_writer_ip() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);

    set(&mut s, &service, "D1", None);

    let key = DocumentKey::parse(None, REF).unwrap();
    let document = service.engine().store().read(&key).unwrap().unwrap();
    assert_eq!(document.writer_info.unwrap().ip, "192.0.2.1");
}

#[test]
fn test_bucket_scopes_selected_key() {
    let (temp, _sink, service) = setup_with(|b| b.bucket(Some("tenant-1".to_string())));
    let mut s = session(&service);
    select(&mut s, &service, REF);

    set(&mut s, &service, "D1", None);

    let expected = temp
        .path()
        .join("tenant-1")
        .join(&REF[..2])
        .join(format!("{}.json", REF));
    assert!(expected.is_file());
}

#[test]
fn test_invalid_bucket_fails_to_open() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .bucket(Some("../escape".to_string()))
        .build();

    let result = SyncService::open(&config, Arc::new(RecordingSink::default()));
    assert!(result.is_err());
}

// =============================================================================
// Broadcast Tests
// =============================================================================

#[test]
fn test_commit_notifies_other_subscribers_only() {
    let (_temp, sink, service) = setup();
    let mut a = session(&service);
    let mut b = session(&service);
    let mut c = session(&service);

    select(&mut a, &service, REF);
    select(&mut b, &service, REF);
    select(&mut c, &service, OTHER_REF);

    set(&mut a, &service, "D1", None);

    assert_eq!(sink.received(), vec![b.id()]);
}

#[test]
fn test_conflict_does_not_notify() {
    let (_temp, sink, service) = setup();
    let mut a = session(&service);
    let mut b = session(&service);
    select(&mut a, &service, REF);
    select(&mut b, &service, REF);

    set(&mut a, &service, "D1", None);
    let response = set(&mut b, &service, "D2", None);

    assert_eq!(
        response,
        Response::Set(SetOutcome::Conflict {
            data: Some("D1".to_string()),
            version: Some(1)
        })
    );
    assert_eq!(sink.received(), vec![b.id()]);
}

#[test]
fn test_reselect_stops_old_notifications() {
    let (_temp, sink, service) = setup();
    let mut a = session(&service);
    let mut b = session(&service);
    select(&mut a, &service, REF);
    select(&mut b, &service, REF);
    select(&mut b, &service, OTHER_REF);

    set(&mut a, &service, "D1", None);

    assert!(sink.received().is_empty());
}

#[test]
fn test_requests_release_drain_permit() {
    let (_temp, _sink, service) = setup();
    let mut s = session(&service);
    select(&mut s, &service, REF);
    set(&mut s, &service, "D1", None);
    get(&mut s, &service, None);

    assert_eq!(service.drain().in_flight(), 0);
}

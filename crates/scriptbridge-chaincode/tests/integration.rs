//! Integration tests for scriptbridge-chaincode.
//!
//! Full-pipeline coverage: real business-logic bundles running inside
//! pooled engine instances, dispatching through a real per-transaction
//! context onto the in-memory ledger stub.
//! - Collection lifecycle and domain-conflict wording
//! - Timer drain after the entry function returns
//! - Caller identity extraction, including the admin special case
//! - Completion protocol failures and pool recovery
//! - Event batching on commit
//! - Outbound HTTP and persisted log verbosity

use std::io::{Read, Write};
use std::sync::Arc;

use scriptbridge_chaincode::{BridgeConfig, ScriptChaincode};
use scriptbridge_common::config::PoolConfig;
use scriptbridge_common::ledger::{LOG_LEVEL_STATE_KEY, LedgerStub};
use scriptbridge_common::memory::MemoryLedgerStub;
use serde_json::{Value, json};

fn deploy(bundle: &str) -> ScriptChaincode {
    ScriptChaincode::new(bundle, BridgeConfig::default()).unwrap()
}

fn stub_for(function: &str, parameters: &[&str]) -> Arc<MemoryLedgerStub> {
    Arc::new(MemoryLedgerStub::new().with_invocation(function, parameters.iter().copied()))
}

fn parse(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap()
}

// ============================================================================
// Test: Collection Lifecycle
// ============================================================================

const LIFECYCLE_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let failure = ();
    let out = #{};
    context.data_service.create_collection("assets", false, |err, collection| {
        if err != () { failure = err; return; }
        collection.add("A1", #{ value: 1 }, false, |e, v| { if e != () { failure = e; } });
        collection.get("A1", |e, object| { out.first = object; });
        collection.update("A1", #{ value: 2 }, |e, v| { if e != () { failure = e; } });
        collection.get("A1", |e, object| { out.second = object; });
        collection.remove("A1", |e, v| { if e != () { failure = e; } });
        collection.exists("A1", |e, present| { out.still_there = present; });
    });
    if failure != () { callback.call(failure, ()); } else { callback.call((), out); }
}
"#;

#[test]
fn test_asset_lifecycle_end_to_end() {
    let chaincode = deploy(LIFECYCLE_BUNDLE);
    let stub = stub_for("lifecycle", &[]);

    let payload = chaincode.invoke(stub.clone()).unwrap();
    assert_eq!(
        parse(&payload),
        json!({
            "first": {"value": 1},
            "second": {"value": 2},
            "still_there": false,
        })
    );
}

const ADD_TWICE_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let force = parameters[0] == "yes";
    let second_error = ();
    let stored = ();
    context.data_service.create_collection("assets", false, |err, collection| {
        collection.add("A1", #{ attempt: 1 }, force, |e, v| {});
        collection.add("A1", #{ attempt: 2 }, force, |e, v| { second_error = e; });
        collection.get("A1", |e, object| { stored = object; });
    });
    let out = #{ stored: stored };
    if second_error != () { out.message = second_error.message; }
    callback.call((), out);
}
"#;

#[test]
fn test_add_twice_fails_without_force() {
    let chaincode = deploy(ADD_TWICE_BUNDLE);

    let payload = chaincode.invoke(stub_for("add", &["no"])).unwrap();
    assert_eq!(
        parse(&payload),
        json!({
            "stored": {"attempt": 1},
            "message": "Failed to add object with ID 'A1' in collection with ID 'assets' \
                        as the object already exists",
        })
    );
}

#[test]
fn test_add_twice_with_force_overwrites() {
    let chaincode = deploy(ADD_TWICE_BUNDLE);

    let payload = chaincode.invoke(stub_for("add", &["yes"])).unwrap();
    assert_eq!(parse(&payload), json!({"stored": {"attempt": 2}}));
}

const FLEET_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let collected = ();
    context.data_service.create_collection("fleet", false, |err, collection| {
        for id in ["V1", "V2", "V3", "V4"] {
            collection.add(id, #{ id: id, wheels: 4 }, false, |e, v| {});
        }
        collection.get_all(|e, objects| { collected = objects; });
    });
    callback.call((), #{ fleet: collected });
}
"#;

#[test]
fn test_get_all_returns_every_member() {
    let chaincode = deploy(FLEET_BUNDLE);

    let payload = chaincode.invoke(stub_for("fill", &[])).unwrap();
    let fleet = parse(&payload)["fleet"].as_array().unwrap().clone();
    assert_eq!(fleet.len(), 4);

    let mut ids: Vec<&str> = fleet
        .iter()
        .map(|object| object["id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, ["V1", "V2", "V3", "V4"]);
    assert!(fleet.iter().all(|object| object["wheels"] == 4));
}

const TEARDOWN_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let gone = ();
    let lookup_error = ();
    context.data_service.create_collection("temp", false, |err, collection| {
        collection.add("T1", #{ n: 1 }, false, |e, v| {});
        collection.add("T2", #{ n: 2 }, false, |e, v| {});
    });
    context.data_service.delete_collection("temp", |e, v| {});
    context.data_service.exists_collection("temp", |e, present| { gone = !present; });
    context.data_service.get_collection("temp", |e, c| { lookup_error = e; });
    callback.call((), #{ gone: gone, message: lookup_error.message });
}
"#;

#[test]
fn test_delete_collection_leaves_no_residual_keys() {
    let chaincode = deploy(TEARDOWN_BUNDLE);
    let stub = stub_for("teardown", &[]);

    let payload = chaincode.invoke(stub.clone()).unwrap();
    assert_eq!(
        parse(&payload),
        json!({
            "gone": true,
            "message": "Collection with ID temp does not exist",
        })
    );
    assert!(stub.keys().is_empty());
}

// ============================================================================
// Test: Timer Drain
// ============================================================================

const TIMER_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let steps = [];
    set_timeout(|| {
        steps.push("timer");
        callback.call((), #{ steps: steps });
    }, 5);
    steps.push("entry");
}
"#;

#[test]
fn test_completion_may_arrive_from_a_timer() {
    let chaincode = deploy(TIMER_BUNDLE);

    let payload = chaincode.invoke(stub_for("deferred", &[])).unwrap();
    // The entry function returned before the timer fired.
    assert_eq!(parse(&payload), json!({"steps": ["entry", "timer"]}));
}

const INTERVAL_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let count = 0;
    let id = ();
    id = set_interval(|| {
        count += 1;
        if count >= 3 {
            clear_interval(id);
            callback.call((), #{ count: count });
        }
    }, 2);
}
"#;

#[test]
fn test_interval_repeats_until_cancelled() {
    let chaincode = deploy(INTERVAL_BUNDLE);

    let payload = chaincode.invoke(stub_for("tick", &[])).unwrap();
    assert_eq!(parse(&payload), json!({"count": 3}));
}

// ============================================================================
// Test: Caller Identity
// ============================================================================

const ALICE_CERT: &str = "-----BEGIN CERTIFICATE-----
MIICDzCCAbWgAwIBAgIUH2Wt9wh6pUUVjOmBoGZl3oLfnZcwCgYIKoZIzj0EAwIw
XTELMAkGA1UEBhMCVVMxFzAVBgNVBAgMDk5vcnRoIENhcm9saW5hMRQwEgYDVQQK
DAtIeXBlcmxlZGdlcjEPMA0GA1UECwwGY2xpZW50MQ4wDAYDVQQDDAVhbGljZTAe
Fw0yNjA4MjUwNzA5MDlaFw0zNjA4MjIwNzA5MDlaMF0xCzAJBgNVBAYTAlVTMRcw
FQYDVQQIDA5Ob3J0aCBDYXJvbGluYTEUMBIGA1UECgwLSHlwZXJsZWRnZXIxDzAN
BgNVBAsMBmNsaWVudDEOMAwGA1UEAwwFYWxpY2UwWTATBgcqhkjOPQIBBggqhkjO
PQMBBwNCAARhyxmaYsjxeXamiIp9tMIUEA3gE5pnYd/X1uqpnIqOxo1hKhaTto1n
1gBvVMe2F7c9tSOeAGUtsobFkPCuPsCHo1MwUTAdBgNVHQ4EFgQUCNFRZJcwny4W
mdI5o7vPd8obhGowHwYDVR0jBBgwFoAUCNFRZJcwny4WmdI5o7vPd8obhGowDwYD
VR0TAQH/BAUwAwEB/zAKBggqhkjOPQQDAgNIADBFAiAoT0u6L9wV8eWqQ1v14l/U
KoaROlgWxiPrTaKPhAuljwIhAISA9Jh6T8y7cFPaJQ2/Vi/753RUwnpiuUHY2izr
2oB3
-----END CERTIFICATE-----
";

const ADMIN_CERT: &str = "-----BEGIN CERTIFICATE-----
MIICGDCCAb+gAwIBAgIUciNjSQHyu0SYtp+JtDRVyIWUxmYwCgYIKoZIzj0EAwIw
YjELMAkGA1UEBhMCVVMxFzAVBgNVBAgMDk5vcnRoIENhcm9saW5hMRQwEgYDVQQK
DAtIeXBlcmxlZGdlcjEPMA0GA1UECwwGY2xpZW50MRMwEQYDVQQDDApBZG1pbi1V
c2VyMB4XDTI2MDgyNTA3MDkwOVoXDTM2MDgyMjA3MDkwOVowYjELMAkGA1UEBhMC
VVMxFzAVBgNVBAgMDk5vcnRoIENhcm9saW5hMRQwEgYDVQQKDAtIeXBlcmxlZGdl
cjEPMA0GA1UECwwGY2xpZW50MRMwEQYDVQQDDApBZG1pbi1Vc2VyMFkwEwYHKoZI
zj0CAQYIKoZIzj0DAQcDQgAE7X1IH0qBz72IfMRF3g5YAtK9hJtmZ2mySGUEXPcU
oyuko1LAO47AaRVoW3R9Tl43+NYZIff9ltPlGptD7m7YKKNTMFEwHQYDVR0OBBYE
FB6oS37jpjP6N+rkIw/uYhAFrWGwMB8GA1UdIwQYMBaAFB6oS37jpjP6N+rkIw/u
YhAFrWGwMA8GA1UdEwEB/wQFMAMBAf8wCgYIKoZIzj0EAwIDRwAwRAIgFzVu+3OS
ry3nH9OPg2S+api0eEqfNSWZU0WI44Z06tMCIH/kVn9v4low0fHUh2Nwz0OfvawQ
IiqK1frQHPCKvYNH
-----END CERTIFICATE-----
";

/// Wraps a PEM certificate in binary envelope bytes the way the host
/// ledger delivers the creator.
fn creator_blob(pem: &str) -> Vec<u8> {
    let mut blob = vec![0x0a, 0x07, 0x12, 0x9a, 0x06];
    blob.extend_from_slice(pem.as_bytes());
    blob.extend_from_slice(&[0x1a, 0x02, 0x08, 0x01]);
    blob
}

const IDENTITY_BUNDLE: &str = r#"
fn query(context, function_name, parameters, callback) {
    let out = #{};
    context.identity_service.get_name(|e, name| { out.name = name; });
    context.identity_service.get_identifier(|e, id| { out.identifier = id; });
    callback.call((), out);
}
"#;

#[test]
fn test_identity_common_name_reaches_the_script() {
    let chaincode = deploy(IDENTITY_BUNDLE);
    let stub = Arc::new(
        MemoryLedgerStub::new()
            .with_invocation("whoami", Vec::<String>::new())
            .with_creator(creator_blob(ALICE_CERT)),
    );

    let payload = chaincode.query(stub).unwrap();
    assert_eq!(
        parse(&payload),
        json!({
            "name": "alice",
            "identifier": "057202e34b6fd8e8f526912566213b6725cc9a00c064b24b90d96e4bb174d17a",
        })
    );
}

#[test]
fn test_admin_identity_has_no_name() {
    let chaincode = deploy(IDENTITY_BUNDLE);
    let stub = Arc::new(
        MemoryLedgerStub::new()
            .with_invocation("whoami", Vec::<String>::new())
            .with_creator(creator_blob(ADMIN_CERT)),
    );

    let payload = chaincode.query(stub).unwrap();
    assert_eq!(
        parse(&payload),
        json!({
            "name": null,
            "identifier": "7a96224dc06e910509328315860ba4d69952797a9cd35410f7e348b3a50bd117",
        })
    );
}

// ============================================================================
// Test: Completion Protocol
// ============================================================================

#[test]
fn test_missing_completion_is_a_protocol_error() {
    let chaincode = deploy("fn invoke(context, function_name, parameters, callback) { }");

    let err = chaincode.invoke(stub_for("noop", &[])).unwrap_err();
    assert!(err.is_protocol());
    assert_eq!(
        err.to_string(),
        "Failed to receive callback from transaction function"
    );
}

#[test]
fn test_thrown_error_carries_the_script_text() {
    let chaincode = deploy(
        r#"fn invoke(context, function_name, parameters, callback) { throw "insufficient funds"; }"#,
    );

    let err = chaincode.invoke(stub_for("transfer", &[])).unwrap_err();
    assert!(err.is_script());
    assert_eq!(err.to_string(), "Script error: insufficient funds");
}

const DOUBLE_COMPLETION_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    if function_name == "double" {
        callback.call((), ());
        callback.call((), ());
    } else {
        callback.call((), "fine");
    }
}
"#;

#[test]
fn test_double_completion_poisons_and_the_pool_recovers() {
    let chaincode = deploy(DOUBLE_COMPLETION_BUNDLE);
    assert_eq!(chaincode.idle_instances(), 1);

    let err = chaincode.invoke(stub_for("double", &[])).unwrap_err();
    assert!(err.is_contract_violation());
    assert!(err.to_string().contains("invoked more than once"));
    // The poisoned instance was discarded, not re-pooled.
    assert_eq!(chaincode.idle_instances(), 0);

    // The next call fabricates a fresh instance and completes normally.
    let payload = chaincode.invoke(stub_for("well_behaved", &[])).unwrap();
    assert_eq!(payload, b"\"fine\"");
    assert_eq!(chaincode.idle_instances(), 1);
}

// ============================================================================
// Test: Event Batching
// ============================================================================

const EVENT_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    context.event_service.emit(#{ kind: "created", id: "A1" }, |e, v| {});
    context.event_service.emit(#{ kind: "created", id: "A2" }, |e, v| {});
    if function_name == "fail_after_emitting" {
        throw "rolled back";
    }
    callback.call((), ());
}

fn query(context, function_name, parameters, callback) {
    context.event_service.emit(#{ kind: "peeked" }, |e, v| {});
    callback.call((), ());
}
"#;

#[test]
fn test_events_flush_as_one_batch_on_successful_invoke() {
    let chaincode = deploy(EVENT_BUNDLE);
    let stub = stub_for("emit_two", &[]);

    chaincode.invoke(stub.clone()).unwrap();

    let events = stub.events();
    assert_eq!(events.len(), 1);
    let (channel, payload) = &events[0];
    assert_eq!(channel, "scriptbridge");
    assert_eq!(
        parse(payload),
        json!([
            {"kind": "created", "id": "A1"},
            {"kind": "created", "id": "A2"},
        ])
    );
}

#[test]
fn test_no_events_flush_on_a_failed_invoke() {
    let chaincode = deploy(EVENT_BUNDLE);
    let stub = stub_for("fail_after_emitting", &[]);

    let err = chaincode.invoke(stub.clone()).unwrap_err();
    assert!(err.is_script());
    assert!(stub.events().is_empty());
}

#[test]
fn test_query_never_flushes_events() {
    let chaincode = deploy(EVENT_BUNDLE);
    let stub = stub_for("peek", &[]);

    chaincode.query(stub.clone()).unwrap();
    assert!(stub.events().is_empty());
}

// ============================================================================
// Test: Outbound HTTP
// ============================================================================

const HTTP_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    context.http_service.post(parameters[0], #{ ping: true }, |e, response| {
        callback.call(e, response);
    });
}
"#;

#[test]
fn test_http_post_round_trips_status_and_body() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut data = Vec::new();
        let mut buffer = [0_u8; 1024];
        while !data.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).unwrap();
            if read == 0 {
                break;
            }
            data.extend_from_slice(&buffer[..read]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
            .unwrap();
    });

    let chaincode = deploy(HTTP_BUNDLE);
    let url = format!("http://{addr}/hook");
    let payload = chaincode.invoke(stub_for("notify", &[url.as_str()])).unwrap();
    assert_eq!(parse(&payload), json!({"status_code": 200, "body": "ok"}));

    server.join().unwrap();
}

#[test]
fn test_http_rejects_unsupported_schemes() {
    let chaincode = deploy(HTTP_BUNDLE);

    let err = chaincode
        .invoke(stub_for("notify", &["ftp://example.org/drop"]))
        .unwrap_err();
    assert!(err.is_script());
    assert_eq!(
        err.to_string(),
        "Script error: URL scheme 'ftp' is not supported, only http and https are"
    );
}

// ============================================================================
// Test: Log Verbosity
// ============================================================================

const LOGGING_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    context.log_service.info("changing level to " + parameters[0]);
    context.log_service.set_level(parameters[0], |e, v| { callback.call(e, ()); });
}

fn query(context, function_name, parameters, callback) {
    context.log_service.get_level(|e, level| { callback.call(e, level); });
}
"#;

#[test]
fn test_set_level_persists_and_the_next_call_observes_it() {
    let chaincode = deploy(LOGGING_BUNDLE);
    let stub = Arc::new(MemoryLedgerStub::new().with_invocation("set", ["debug"]));

    chaincode.invoke(stub.clone()).unwrap();
    assert_eq!(
        stub.get_state(LOG_LEVEL_STATE_KEY).unwrap(),
        Some(b"DEBUG".to_vec())
    );

    // Same backing state, next call: the persisted value is effective.
    let payload = chaincode.query(stub.clone()).unwrap();
    assert_eq!(payload, b"\"DEBUG\"");
}

#[test]
fn test_invalid_level_is_reported_through_the_callback() {
    let chaincode = deploy(LOGGING_BUNDLE);

    let err = chaincode.invoke(stub_for("set", &["verbose"])).unwrap_err();
    assert!(err.is_script());
    assert_eq!(err.to_string(), "Script error: Invalid log level 'verbose'");
}

// ============================================================================
// Test: Pool Concurrency
// ============================================================================

const DOUBLING_BUNDLE: &str = r#"
fn invoke(context, function_name, parameters, callback) {
    let n = parse_int(parameters[0]);
    callback.call((), #{ doubled: n * 2 });
}
"#;

#[test]
fn test_concurrent_invocations_share_the_pool() {
    let config = BridgeConfig {
        pool: PoolConfig { size: 2 },
        ..BridgeConfig::default()
    };
    let chaincode = ScriptChaincode::new(DOUBLING_BUNDLE, config).unwrap();

    std::thread::scope(|scope| {
        for worker in 0..6_i64 {
            let chaincode = &chaincode;
            scope.spawn(move || {
                let argument = worker.to_string();
                let stub = stub_for("double", &[argument.as_str()]);
                let payload = chaincode.invoke(stub).unwrap();
                assert_eq!(parse(&payload), json!({"doubled": worker * 2}));
            });
        }
    });

    // Surplus instances were discarded on return, not pooled.
    assert!(chaincode.idle_instances() >= 1);
    assert!(chaincode.idle_instances() <= 2);
}

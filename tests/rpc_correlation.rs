//! RPC correlation behaviour over the in-memory transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use meridian_sdk::prelude::*;
use serde_json::Value;

type Results<T> = Arc<Mutex<Vec<Result<T, RpcError>>>>;

fn connected() -> (RpcClient<Arc<MemoryTransport>>, Arc<MemoryTransport>) {
    connected_with(RpcConfig::default())
}

fn connected_with(config: RpcConfig) -> (RpcClient<Arc<MemoryTransport>>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let rpc = RpcClient::with_config(transport.clone(), config);
    rpc.connect("ws://node").unwrap();
    assert_eq!(rpc.state(), ConnectionState::Connected);
    (rpc, transport)
}

fn emit_recorded<T>(rpc: &RpcClient<Arc<MemoryTransport>>, method: &str) -> (CallId, Results<T>)
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let results: Results<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let id = rpc
        .emit::<T, _>(RpcRequest::new("database", method), move |r| {
            sink.lock().unwrap().push(r)
        })
        .unwrap();
    (id, results)
}

// ─── Response dispatch ───────────────────────────────────────────────────────

#[test]
fn test_success_delivered_exactly_once() {
    let (rpc, transport) = connected();
    let (id, results) = emit_recorded::<String>(&rpc, "get_value");
    assert!(rpc.is_pending(id));

    let frame = format!(r#"{{"id":{},"result":"42"}}"#, id);
    transport.deliver(&frame);
    transport.deliver(&frame);

    assert_eq!(*results.lock().unwrap(), vec![Ok("42".to_string())]);
    assert!(!rpc.is_pending(id));
    assert_eq!(rpc.pending_count(), 0);
}

#[test]
fn test_error_envelope_becomes_response_error() {
    let (rpc, transport) = connected();
    let (id, results) = emit_recorded::<Value>(&rpc, "get_value");

    transport.deliver(&format!(
        r#"{{"id":{},"error":{{"message":"bad request","code":-32600}}}}"#,
        id
    ));

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(RpcError::Response { message, code, .. }) => {
            assert!(message.contains("bad request"));
            assert_eq!(*code, Some(-32600));
        }
        other => panic!("expected a response error, got {:?}", other),
    }
}

#[test]
fn test_decode_failure_only_hits_its_call() {
    let (rpc, transport) = connected();
    let (first, first_results) = emit_recorded::<u64>(&rpc, "count");
    let (second, second_results) = emit_recorded::<u64>(&rpc, "count");

    transport.deliver(&format!(r#"{{"id":{},"result":{{"not":"a number"}}}}"#, first));

    assert!(matches!(
        first_results.lock().unwrap().as_slice(),
        [Err(RpcError::Decode(_))]
    ));
    assert!(second_results.lock().unwrap().is_empty());
    assert!(rpc.is_pending(second));

    transport.deliver(&format!(r#"{{"id":{},"result":7}}"#, second));
    assert_eq!(*second_results.lock().unwrap(), vec![Ok(7)]);
}

#[test]
fn test_unknown_id_is_dropped() {
    let (rpc, transport) = connected();
    let (id, results) = emit_recorded::<Value>(&rpc, "x");
    transport.deliver(r#"{"id":9999,"result":1}"#);
    assert!(rpc.is_pending(id));
    assert!(results.lock().unwrap().is_empty());
}

// ─── Reconnection ────────────────────────────────────────────────────────────

#[test]
fn test_pending_calls_resubmitted_in_order_after_reconnect() {
    let (rpc, transport) = connected();
    let (first, _) = emit_recorded::<Value>(&rpc, "a");
    let (second, _) = emit_recorded::<Value>(&rpc, "b");
    assert_eq!((first, second), (1, 2));

    transport.simulate_disconnected();
    assert_eq!(rpc.state(), ConnectionState::Disconnected);
    transport.simulate_connected();

    assert_eq!(transport.sent_ids(), vec![1, 2, 1, 2]);
    assert!(rpc.is_pending(1));
    assert!(rpc.is_pending(2));
}

#[test]
fn test_late_answer_to_first_attempt_still_matches_once() {
    let (rpc, transport) = connected();
    let (id, results) = emit_recorded::<u64>(&rpc, "a");

    transport.simulate_disconnected();
    transport.simulate_connected();

    // One answer per attempt; only the first counts.
    transport.deliver(&format!(r#"{{"id":{},"result":1}}"#, id));
    transport.deliver(&format!(r#"{{"id":{},"result":2}}"#, id));
    assert_eq!(*results.lock().unwrap(), vec![Ok(1)]);
}

#[test]
fn test_emit_during_outage_is_sent_after_reconnect() {
    let (rpc, transport) = connected();
    transport.simulate_disconnected();

    let (id, results) = emit_recorded::<Value>(&rpc, "a");
    assert!(transport.sent_ids().is_empty());
    assert!(rpc.is_pending(id));
    assert!(results.lock().unwrap().is_empty());

    transport.simulate_connected();
    assert_eq!(transport.sent_ids(), vec![id]);
}

#[test]
fn test_first_connect_does_not_resubmit() {
    let transport = Arc::new(MemoryTransport::manual());
    let rpc = RpcClient::new(transport.clone());
    rpc.connect("ws://node").unwrap();
    assert_eq!(rpc.state(), ConnectionState::Disconnected);

    transport.simulate_connected();
    assert!(transport.sent().is_empty());
}

#[test]
fn test_emit_while_first_connect_opens_is_sent_on_connect() {
    let transport = Arc::new(MemoryTransport::manual());
    let rpc = RpcClient::new(transport.clone());
    rpc.connect("ws://node").unwrap();

    let (a, results_a) = emit_recorded::<Value>(&rpc, "a");
    let (b, _) = emit_recorded::<Value>(&rpc, "b");
    assert_eq!((a, b), (1, 2));
    assert!(rpc.is_pending(a) && rpc.is_pending(b));
    assert!(transport.sent().is_empty());
    assert!(results_a.lock().unwrap().is_empty());

    transport.simulate_connected();
    assert_eq!(transport.sent_ids(), vec![a, b]);

    transport.deliver(&format!(r#"{{"id":{},"result":"ok"}}"#, a));
    assert_eq!(*results_a.lock().unwrap(), vec![Ok(Value::from("ok"))]);
    assert!(!rpc.is_pending(a));
}

#[test]
fn test_emit_after_disconnect_while_opening_fails_fast() {
    let transport = Arc::new(MemoryTransport::manual());
    let rpc = RpcClient::new(transport.clone());
    rpc.connect("ws://node").unwrap();
    rpc.disconnect();

    let (id, results) = emit_recorded::<Value>(&rpc, "a");
    assert!(!rpc.is_pending(id));
    assert!(results.lock().unwrap()[0].as_ref().unwrap_err().is_connection());
}

// ─── Disconnect ──────────────────────────────────────────────────────────────

#[test]
fn test_disconnect_fails_pending_calls() {
    let (rpc, transport) = connected();
    let (_, a) = emit_recorded::<Value>(&rpc, "a");
    let (_, b) = emit_recorded::<Value>(&rpc, "b");

    rpc.disconnect();

    assert_eq!(rpc.pending_count(), 0);
    assert_eq!(rpc.state(), ConnectionState::Disconnected);
    assert!(!transport.is_connected());
    for results in [a, b] {
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_connection());
    }

    // Closed by the user: new calls fail straight away.
    let (_, c) = emit_recorded::<Value>(&rpc, "c");
    assert!(c.lock().unwrap()[0].as_ref().unwrap_err().is_connection());
}

#[test]
fn test_disconnect_can_keep_pending_calls() {
    let (rpc, transport) = connected_with(RpcConfig {
        fail_pending_on_disconnect: false,
    });
    let (id, results) = emit_recorded::<Value>(&rpc, "a");

    rpc.disconnect();
    assert!(rpc.is_pending(id));
    assert!(results.lock().unwrap().is_empty());

    rpc.connect("ws://node").unwrap();
    assert_eq!(transport.sent_ids(), vec![id, id]);
}

// ─── Listeners ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl ConnectionListener for EventLog {
    fn on_connected(&self) {
        self.0.lock().unwrap().push("connected".into());
    }

    fn on_disconnected(&self) {
        self.0.lock().unwrap().push("disconnected".into());
    }

    fn on_event(&self, text: &str) {
        self.0.lock().unwrap().push(text.into());
    }

    fn on_failure(&self, error: &TransportError) {
        self.0.lock().unwrap().push(format!("failure: {}", error));
    }
}

#[test]
fn test_listeners_see_lifecycle_and_raw_frames() {
    let transport = Arc::new(MemoryTransport::new());
    let rpc = RpcClient::new(transport.clone());
    let log = Arc::new(EventLog::default());
    rpc.on(log.clone());

    rpc.connect("ws://node").unwrap();
    let notice = r#"{"method":"notice","params":[1,[]]}"#;
    transport.deliver(notice);
    transport.simulate_failure(TransportError::SendFailed("boom".into()));
    transport.simulate_disconnected();

    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "connected".to_string(),
            notice.to_string(),
            "failure: Send failed: boom".to_string(),
            "disconnected".to_string(),
        ]
    );
}

#[test]
fn test_off_and_disconnect_clear_listeners() {
    let (rpc, transport) = connected();
    let removed = Arc::new(EventLog::default());
    let kept = Arc::new(EventLog::default());
    let removed_id = rpc.on(removed.clone());
    rpc.on(kept.clone());

    assert!(rpc.off(removed_id));
    transport.deliver("{}");
    assert!(removed.0.lock().unwrap().is_empty());
    assert_eq!(*kept.0.lock().unwrap(), vec!["{}"]);

    rpc.disconnect();
    assert_eq!(kept.0.lock().unwrap().last().unwrap(), "disconnected");

    transport.deliver("{}");
    assert_eq!(kept.0.lock().unwrap().len(), 2);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_emit_ids_unique_and_callbacks_once() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let (rpc, transport) = connected();
    let fired: Arc<Mutex<HashMap<CallId, usize>>> = Arc::new(Mutex::new(HashMap::new()));

    let per_thread_ids: Vec<Vec<CallId>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let rpc = rpc.clone();
                let fired = fired.clone();
                scope.spawn(move || {
                    let mut ids = Vec::with_capacity(PER_THREAD);
                    for _ in 0..PER_THREAD {
                        let fired = fired.clone();
                        let id_slot: Arc<Mutex<Option<CallId>>> = Arc::new(Mutex::new(None));
                        let slot = id_slot.clone();
                        let id = rpc
                            .emit::<Value, _>(RpcRequest::new("database", "x"), move |_| {
                                let id = slot.lock().unwrap().expect("id recorded before reply");
                                *fired.lock().unwrap().entry(id).or_insert(0) += 1;
                            })
                            .unwrap();
                        *id_slot.lock().unwrap() = Some(id);
                        ids.push(id);
                    }
                    ids
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ids in &per_thread_ids {
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {:?}", ids);
    }
    let mut all: Vec<CallId> = per_thread_ids.into_iter().flatten().collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), THREADS * PER_THREAD);
    assert_eq!(all, (1..=(THREADS * PER_THREAD) as CallId).collect::<Vec<_>>());

    // Answer every call from four threads at once; only the first answer counts.
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let transport = transport.clone();
            let all = all.clone();
            scope.spawn(move || {
                for id in all {
                    transport.deliver(&format!(r#"{{"id":{},"result":null}}"#, id));
                }
            });
        }
    });

    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), THREADS * PER_THREAD);
    assert!(fired.values().all(|&n| n == 1));
    assert_eq!(rpc.pending_count(), 0);
}

// ─── Future adaptor ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_call_resolves_and_reports_disconnect() {
    let (rpc, transport) = connected();

    let answered = tokio::spawn({
        let rpc = rpc.clone();
        async move { rpc.call::<String>(RpcRequest::new("database", "get_value")).await }
    });
    let abandoned = tokio::spawn({
        let rpc = rpc.clone();
        async move { rpc.call::<String>(RpcRequest::new("database", "never")).await }
    });

    while rpc.pending_count() < 2 {
        tokio::task::yield_now().await;
    }
    let ids = transport.sent_ids();
    let env: meridian_sdk::rpc::RequestEnvelope = serde_json::from_str(
        transport
            .sent()
            .iter()
            .find(|text| text.contains("get_value"))
            .unwrap(),
    )
    .unwrap();
    assert!(ids.contains(&env.id));

    transport.deliver(&format!(r#"{{"id":{},"result":"42"}}"#, env.id));
    assert_eq!(answered.await.unwrap().unwrap(), "42");

    rpc.disconnect();
    assert!(abandoned.await.unwrap().unwrap_err().is_connection());
}

//! Request correlation, timeouts, framing and event routing over a live stream

mod helpers;

use helpers::FakeBackend;
use ncplay::ipc::IpcClient;
use ncplay::Error;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

fn silent(_: &[Value]) -> helpers::Reply {
    None
}

fn request_id(backend: &FakeBackend, n: usize) -> u64 {
    backend.requests()[n]["request_id"].as_u64().unwrap()
}

#[tokio::test]
async fn test_out_of_order_replies_reach_their_callers() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(2), silent);

    let c1 = client.clone();
    let first = tokio::spawn(async move { c1.send_command("get_property", vec![json!("pause")]).await });
    backend.wait_for_requests(1).await;

    let c2 = client.clone();
    let second = tokio::spawn(async move { c2.send_command("get_property", vec![json!("volume")]).await });
    backend.wait_for_requests(2).await;

    let (id1, id2) = (request_id(&backend, 0), request_id(&backend, 1));
    assert!(id2 > id1);

    // Answer the second request first
    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\",\"data\":55}}\n", id2));
    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\",\"data\":false}}\n", id1));

    assert_eq!(second.await.unwrap().unwrap(), json!(55));
    assert_eq!(first.await.unwrap().unwrap(), json!(false));
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_timeout_removes_request_and_late_reply_is_dropped() {
    let mut answered = 0;
    let (client, backend) = FakeBackend::start(Duration::from_millis(150), move |_: &[Value]| {
        answered += 1;
        // Only the second request gets a reply
        if answered == 2 {
            Some(Ok(json!("second")))
        } else {
            None
        }
    });

    let result = client.send_command("get_property", vec![json!("duration")]).await;
    let abandoned = match result {
        Err(Error::RequestTimeout { command, request_id, timeout_ms }) => {
            assert_eq!(command, "get_property");
            assert_eq!(timeout_ms, 150);
            request_id
        }
        other => panic!("expected timeout, got {:?}", other),
    };
    assert_eq!(request_id(&backend, 0), abandoned);
    assert_eq!(client.pending_count(), 0);

    // Late reply for the abandoned request is discarded, nothing else breaks
    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\",\"data\":\"late\"}}\n", abandoned));

    let data = client.send_command("get_property", vec![json!("path")]).await.unwrap();
    assert_eq!(data, json!("second"));
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_error_reply_is_reported_with_message() {
    let (client, _backend) = FakeBackend::start(Duration::from_secs(1), |_: &[Value]| {
        Some(Err("property unavailable".to_string()))
    });

    let result = client.send_command("get_property", vec![json!("time-pos")]).await;
    assert!(matches!(result, Err(Error::BackendReportedError(msg)) if msg == "property unavailable"));
}

#[tokio::test]
async fn test_garbage_lines_are_ignored() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(1), silent);

    let c = client.clone();
    let pending = tokio::spawn(async move { c.send_command("get_property", vec![json!("pause")]).await });
    backend.wait_for_requests(1).await;

    backend.push("not json at all\n");
    backend.push("\n");
    backend.push("{}\n");
    backend.push("[1,2,3]\n");
    let id = request_id(&backend, 0);
    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\"}}\n", id + 1000));
    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\",\"data\":true}}\n", id));

    assert_eq!(pending.await.unwrap().unwrap(), json!(true));
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_reply_split_across_writes() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(1), silent);

    let c = client.clone();
    let pending = tokio::spawn(async move { c.send_command("get_property", vec![json!("volume")]).await });
    backend.wait_for_requests(1).await;

    backend.push(&format!("{{\"request_id\":{},\"err", request_id(&backend, 0)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    backend.push("or\":\"success\",\"data\":42}\n");

    assert_eq!(pending.await.unwrap().unwrap(), json!(42));
}

#[tokio::test]
async fn test_events_do_not_complete_requests() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(1), silent);
    let mut events = client.subscribe_events();

    let c = client.clone();
    let pending = tokio::spawn(async move { c.send_command("get_property", vec![json!("pause")]).await });
    backend.wait_for_requests(1).await;

    // An event that happens to carry a request_id is still an event
    let id = request_id(&backend, 0);
    backend.emit(json!({ "event": "end-file", "reason": "eof", "request_id": id }));

    let event = events.recv().await.unwrap();
    assert_eq!(event.name, "end-file");
    assert_eq!(event.reason(), Some("eof"));
    assert!(event.is_end_of_media());
    assert_eq!(client.pending_count(), 1);

    backend.push(&format!("{{\"request_id\":{},\"error\":\"success\",\"data\":false}}\n", id));
    assert_eq!(pending.await.unwrap().unwrap(), json!(false));
}

#[tokio::test]
async fn test_event_handler_can_issue_commands() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(1), |command: &[Value]| {
        Some(Ok(json!(format!("ack {}", command[0].as_str().unwrap_or_default()))))
    });
    let mut events = client.subscribe_events();

    let handler_client = client.clone();
    let handler = tokio::spawn(async move {
        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "file-loaded");
        handler_client.send_command("get_property", vec![json!("duration")]).await
    });

    backend.emit(json!({ "event": "file-loaded" }));
    assert_eq!(handler.await.unwrap().unwrap(), json!("ack get_property"));
}

#[tokio::test]
async fn test_hang_up_fails_pending_and_closes_events() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(2), silent);
    let mut events = client.subscribe_events();

    let c = client.clone();
    let pending = tokio::spawn(async move { c.send_command("get_property", vec![json!("pause")]).await });
    backend.wait_for_requests(1).await;

    backend.hang_up();

    assert!(matches!(pending.await.unwrap(), Err(Error::ConnectionClosed)));
    assert!(matches!(events.recv().await, Err(RecvError::Closed)));
    assert!(client.is_closed());
    assert!(matches!(
        client.send_command("stop", vec![]).await,
        Err(Error::ConnectionClosed)
    ));

    // Subscribing after close yields an already-closed stream
    let mut late = client.subscribe_events();
    assert!(matches!(late.recv().await, Err(RecvError::Closed)));
}

#[tokio::test]
async fn test_disconnect_rejects_outstanding_requests() {
    let (client, backend) = FakeBackend::start(Duration::from_secs(2), silent);

    let c = client.clone();
    let pending = tokio::spawn(async move { c.send_command("get_property", vec![json!("pause")]).await });
    backend.wait_for_requests(1).await;

    client.disconnect().await;

    assert!(matches!(pending.await.unwrap(), Err(Error::ConnectionClosed)));
    assert_eq!(client.pending_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_connect_over_unix_socket() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixListener;

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("backend.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let request: Value = serde_json::from_str(&line).unwrap();
        let reply = json!({ "request_id": request["request_id"], "error": "success", "data": request["command"] });
        write_half.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
    });

    let client = IpcClient::connect(&path, Duration::from_secs(1)).await.unwrap();
    let data = client.send_command("loadfile", vec![json!("a.mp3"), json!("replace")]).await.unwrap();
    assert_eq!(data, json!(["loadfile", "a.mp3", "replace"]));

    server.await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_connect_without_listener_is_not_running() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = IpcClient::connect(&dir.path().join("nobody.sock"), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(Error::BackendNotRunning(_))));
}

//! # End-to-End Client Scenarios
//!
//! One client against one mock daemon:
//!
//! 1. **Request/response**: a call resolves with the daemon's result
//! 2. **Disconnect**: a pending call fails with `ConnectionClosed`, then the
//!    client reconnects after its delay
//! 3. **Server events**: notifications reach every listener and stream
//!    without disturbing pending calls
//! 4. **Not connected**: calls fail fast and consume no correlation id
//! 5. **Destroy and re-create**: a new client under the same id starts clean

#[cfg(test)]
mod tests {
    use crate::support::{
        fast_reconnect, instance, wait_for_connection, ConnectionLog, MockDaemon, WAIT,
    };
    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};
    use studio_client::{ClientConfig, ClientError, ClientRegistry, RpcClient, ServerEvent};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    async fn connected_client(
        daemon: &mut MockDaemon,
        config: ClientConfig,
    ) -> (RpcClient, crate::support::DaemonConnection) {
        let client = RpcClient::new(instance("inst-1"), &daemon.url(), config).unwrap();
        client.connect();
        let conn = daemon.next_connection().await;
        wait_for_connection(&client, true).await;
        (client, conn)
    }

    fn spawn_call(
        client: &RpcClient,
        method: &'static str,
    ) -> tokio::task::JoinHandle<Result<Value, ClientError>> {
        let client = client.clone();
        tokio::spawn(async move { client.call_raw(method, None).await })
    }

    // =========================================================================
    // REQUEST / RESPONSE
    // =========================================================================

    #[tokio::test]
    async fn test_call_resolves_with_result() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let call = spawn_call(&client, "status");
        let request = conn.recv_request().await;
        assert_eq!(request.id, 1);
        assert_eq!(request.method, "status");
        assert_eq!(request.params, None);

        conn.respond(1, json!({ "ok": true })).await;
        assert_eq!(call.await.unwrap(), Ok(json!({ "ok": true })));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().resolved, 1);
    }

    #[tokio::test]
    async fn test_typed_call_with_params() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Peers {
            count: u32,
        }

        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .call::<_, Peers>("peers.list", json!({ "limit": 5 }))
                    .await
            }
        });
        let request = conn.recv_request().await;
        assert_eq!(request.params, Some(json!({ "limit": 5 })));

        conn.respond(request.id, json!({ "count": 3 })).await;
        assert_eq!(call.await.unwrap(), Ok(Peers { count: 3 }));
    }

    #[tokio::test]
    async fn test_remote_error_reaches_caller() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let call = spawn_call(&client, "content.fetch");
        let request = conn.recv_request().await;
        conn.respond_error(request.id, -32601, "Method not found").await;

        match call.await.unwrap() {
            Err(ClientError::Remote { code, message, .. }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_malformed_frames_are_ignored() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let call = spawn_call(&client, "status");
        let request = conn.recv_request().await;
        conn.send_raw("not json at all").await;
        conn.send_raw(r#"{"jsonrpc":"2.0","id":999,"result":1}"#).await;
        conn.respond(request.id, json!("fine")).await;

        assert_eq!(call.await.unwrap(), Ok(json!("fine")));
        assert!(client.is_connected());
    }

    // =========================================================================
    // DISCONNECT AND RECONNECT
    // =========================================================================

    #[tokio::test]
    async fn test_close_rejects_pending_then_reconnects() {
        let delay = Duration::from_millis(300);
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, fast_reconnect(delay)).await;
        let log = ConnectionLog::attach(&client);

        let _first = spawn_call(&client, "status");
        conn.recv_request().await;
        let second = spawn_call(&client, "peers");
        let request = conn.recv_request().await;
        assert_eq!(request.id, 2);

        let closed_at = Instant::now();
        conn.close().await;
        assert_eq!(second.await.unwrap(), Err(ClientError::ConnectionClosed));
        assert!(!client.is_connected());
        assert_eq!(client.pending_count(), 0);

        let _conn = daemon.next_connection().await;
        wait_for_connection(&client, true).await;
        assert!(closed_at.elapsed() >= delay);
        assert_eq!(log.seen(), vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_rejection_visible_to_disconnect_listener() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) =
            connected_client(&mut daemon, fast_reconnect(Duration::from_secs(60))).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let observed = client.clone();
        let _sub = client.on_connection(move |connected| {
            if !connected {
                let _ = tx.send(observed.is_connected());
            }
        });

        let call = spawn_call(&client, "status");
        conn.recv_request().await;
        drop(conn);

        assert_eq!(call.await.unwrap(), Err(ClientError::ConnectionClosed));
        let connected_seen_by_listener = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(!connected_seen_by_listener);
    }

    #[tokio::test]
    async fn test_refused_attempts_stay_silent() {
        let mut daemon = MockDaemon::start().await;
        daemon.refuse_connections(true);

        let client = RpcClient::new(
            instance("inst-1"),
            &daemon.url(),
            fast_reconnect(Duration::from_millis(50)),
        )
        .unwrap();
        let log = ConnectionLog::attach(&client);
        client.connect();

        timeout(WAIT, async {
            while daemon.attempts() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client kept retrying");
        assert_eq!(log.seen(), vec![false]);

        daemon.refuse_connections(false);
        let _conn = daemon.next_connection().await;
        wait_for_connection(&client, true).await;
        assert_eq!(log.seen(), vec![false, true]);
    }

    // =========================================================================
    // SERVER EVENTS
    // =========================================================================

    #[tokio::test]
    async fn test_event_reaches_all_listeners_and_streams() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let first_tx = tx.clone();
        let _first = client.on_event(move |event: &ServerEvent| {
            let _ = first_tx.send(("first", event.clone()));
        });
        let _second = client.on_event(move |event: &ServerEvent| {
            let _ = tx.send(("second", event.clone()));
        });
        let mut stream = client.events();

        let call = spawn_call(&client, "status");
        let request = conn.recv_request().await;

        conn.push_event("event", json!({ "type": "peer_joined" })).await;
        let expected = ServerEvent {
            method: "event".to_string(),
            params: json!({ "type": "peer_joined" }),
        };

        let mut got = vec![
            timeout(WAIT, rx.recv()).await.unwrap().unwrap(),
            timeout(WAIT, rx.recv()).await.unwrap().unwrap(),
        ];
        got.sort_by_key(|(who, _)| *who);
        assert_eq!(got, vec![("first", expected.clone()), ("second", expected.clone())]);
        assert_eq!(timeout(WAIT, stream.next()).await.unwrap(), Some(expected));

        assert_eq!(client.pending_count(), 1);
        conn.respond(request.id, json!({ "ok": true })).await;
        assert_eq!(call.await.unwrap(), Ok(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_gets_nothing() {
        let mut daemon = MockDaemon::start().await;
        let (client, mut conn) = connected_client(&mut daemon, ClientConfig::default()).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let gone_tx = tx.clone();
        let gone = client.on_event(move |event: &ServerEvent| {
            let _ = gone_tx.send(format!("gone:{}", event.method));
        });
        let _kept = client.on_event(move |event: &ServerEvent| {
            let _ = tx.send(format!("kept:{}", event.method));
        });
        gone.unsubscribe();

        conn.push_event("content.stored", json!({ "cid": "abc" })).await;
        conn.push_event("peer.left", json!({})).await;

        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "kept:content.stored");
        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "kept:peer.left");
        assert!(rx.try_recv().is_err());
    }

    // =========================================================================
    // NOT CONNECTED
    // =========================================================================

    #[tokio::test]
    async fn test_call_while_disconnected_consumes_no_id() {
        let mut daemon = MockDaemon::start().await;
        let client =
            RpcClient::new(instance("inst-1"), &daemon.url(), ClientConfig::default()).unwrap();

        assert_eq!(
            client.call_raw("status", None).await,
            Err(ClientError::NotConnected)
        );
        assert_eq!(client.stats().registered, 0);

        client.connect();
        let mut conn = daemon.next_connection().await;
        wait_for_connection(&client, true).await;

        let call = spawn_call(&client, "status");
        let request = conn.recv_request().await;
        assert_eq!(request.id, 1);
        conn.respond(1, Value::Null).await;
        assert_eq!(call.await.unwrap(), Ok(Value::Null));
    }

    // =========================================================================
    // DESTROY AND RE-CREATE
    // =========================================================================

    #[tokio::test]
    async fn test_destroy_then_create_starts_clean() {
        let mut daemon = MockDaemon::start().await;
        let registry = ClientRegistry::new();

        let old = registry.create_client(instance("inst-1"), &daemon.url()).unwrap();
        old.connect();
        let mut old_conn = daemon.next_connection().await;
        wait_for_connection(&old, true).await;

        let stale = spawn_call(&old, "status");
        old_conn.recv_request().await;

        assert!(registry.destroy_client(&instance("inst-1")));
        let new = registry.create_client(instance("inst-1"), &daemon.url()).unwrap();
        assert_eq!(stale.await.unwrap(), Err(ClientError::ClientDestroyed));
        old_conn.wait_closed().await;

        new.connect();
        let mut conn = daemon.next_connection().await;
        wait_for_connection(&new, true).await;

        let call = spawn_call(&new, "status");
        let request = conn.recv_request().await;
        assert_eq!(request.id, 1);
        conn.respond(request.id, json!({ "ok": true })).await;
        assert_eq!(call.await.unwrap(), Ok(json!({ "ok": true })));

        assert!(old.is_destroyed());
        assert_eq!(old.call_raw("status", None).await, Err(ClientError::ClientDestroyed));
        assert_eq!(new.stats().registered, 1);
    }
}

//! # Response Routing
//!
//! Responses are matched to callers purely by correlation id, whatever
//! order the daemon answers in.

#[cfg(test)]
mod tests {
    use crate::support::{instance, wait_for_connection, MockDaemon};
    use proptest::prelude::*;
    use serde_json::json;
    use studio_client::{ClientConfig, ClientError, RpcClient};

    /// Issue `fails.len()` calls, answer them in `order`, and check every
    /// caller got its own answer.
    async fn answer_out_of_order(order: Vec<usize>, fails: Vec<bool>) {
        let mut daemon = MockDaemon::start().await;
        let client =
            RpcClient::new(instance("inst-1"), &daemon.url(), ClientConfig::default()).unwrap();
        client.connect();
        let mut conn = daemon.next_connection().await;
        wait_for_connection(&client, true).await;

        let calls: Vec<_> = (0..fails.len())
            .map(|i| {
                let client = client.clone();
                let method = format!("method.{i}");
                tokio::spawn(async move { client.call_raw(&method, None).await })
            })
            .collect();

        let mut requests = Vec::new();
        for _ in 0..fails.len() {
            requests.push(conn.recv_request().await);
        }

        for &slot in &order {
            let request = &requests[slot];
            let index: usize = request.method["method.".len()..].parse().unwrap();
            if fails[index] {
                conn.respond_error(request.id, -32000, &request.method).await;
            } else {
                conn.respond(request.id, json!({ "echo": request.method })).await;
            }
        }

        for (i, call) in calls.into_iter().enumerate() {
            let method = format!("method.{i}");
            match call.await.unwrap() {
                Ok(result) => {
                    assert!(!fails[i]);
                    assert_eq!(result, json!({ "echo": method }));
                }
                Err(ClientError::Remote { message, .. }) => {
                    assert!(fails[i]);
                    assert_eq!(message, method);
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        }
        assert_eq!(client.pending_count(), 0);
        client.destroy();
    }

    fn calls_and_order() -> impl Strategy<Value = (Vec<usize>, Vec<bool>)> {
        prop::collection::vec(any::<bool>(), 1..8).prop_flat_map(|fails| {
            let order: Vec<usize> = (0..fails.len()).collect();
            (Just(order).prop_shuffle(), Just(fails))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_responses_reach_their_callers((order, fails) in calls_and_order()) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(answer_out_of_order(order, fails));
        }
    }

    #[tokio::test]
    async fn test_reverse_order() {
        answer_out_of_order(vec![3, 2, 1, 0], vec![false, true, false, false]).await;
    }
}

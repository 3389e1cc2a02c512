//! Consumer 集成测试

#[cfg(feature = "mcp")]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use prompt_relay::consumer::{ConsumerTools, McpServer, WatchOutcome, WATCH_POLL_INTERVAL};
    use prompt_relay::{Relay, RelayConfig};
    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;

    fn test_relay() -> Relay {
        Relay::new(RelayConfig {
            port: 0,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_watch_timeout_is_bounded() {
        let relay = test_relay();
        let tools = relay.consumer();

        let started = Instant::now();
        let outcome = tools.watch(ConsumerTools::watch_timeout(Some(1.0))).await;
        let elapsed = started.elapsed();

        assert!(matches!(outcome, WatchOutcome::TimedOut { .. }));
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(1) + WATCH_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_concurrent_watch_delivers_once() {
        let relay = test_relay();
        let queue = relay.queue();
        queue.enqueue("only one", None, None).unwrap();

        let a = {
            let tools = relay.consumer();
            tokio::spawn(async move { tools.watch(Duration::from_secs(1)).await })
        };
        let b = {
            let tools = relay.consumer();
            tokio::spawn(async move { tools.watch(Duration::from_secs(1)).await })
        };

        let outcomes = [a.await.unwrap(), b.await.unwrap()];
        let delivered: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                WatchOutcome::Delivered(r) => Some(r.prompt.clone()),
                WatchOutcome::TimedOut { .. } => None,
            })
            .collect();

        assert_eq!(delivered, vec!["only one".to_string()]);
        assert_eq!(queue.count(), 0);
    }

    #[tokio::test]
    async fn test_watch_pops_in_fifo_order() {
        let relay = test_relay();
        let queue = relay.queue();
        let tools = relay.consumer();

        for p in ["first", "second", "third"] {
            queue.enqueue(p, None, None).unwrap();
        }

        for expected in ["first", "second", "third"] {
            match tools.watch(Duration::from_secs(1)).await {
                WatchOutcome::Delivered(r) => assert_eq!(r.prompt, expected),
                other => panic!("Expected Delivered, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_watch_publishes_processing() {
        let relay = test_relay();
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        relay.broadcaster().subscribe(tx);

        relay.queue().enqueue("x", None, None).unwrap();
        relay.consumer().watch(Duration::from_secs(1)).await;

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.data, r#"{"status":"processing"}"#);
    }

    /// 通过内存管道驱动 MCP 服务器
    struct McpClient {
        writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
        reader: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    }

    impl McpClient {
        async fn send(&mut self, message: Value) {
            let line = format!("{}\n", message);
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let mut line = String::new();
            timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for response")
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn start_mcp(relay: &Relay) -> (McpClient, tokio::task::JoinHandle<anyhow::Result<()>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let mcp: Arc<McpServer> = McpServer::new(relay.consumer());
        let handle = tokio::spawn(mcp.serve(server_read, server_write));

        (
            McpClient {
                writer: client_write,
                reader: BufReader::new(client_read),
            },
            handle,
        )
    }

    #[tokio::test]
    async fn test_mcp_handshake_and_tools() {
        let relay = test_relay();
        let (mut client, handle) = start_mcp(&relay);

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "prompt-relay");

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["id"], 2);
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 4);

        drop(client);
        timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_mcp_parse_error_keeps_connection() {
        let relay = test_relay();
        let (mut client, _handle) = start_mcp(&relay);

        client.send_raw("this is not json\n").await;
        let response = client.recv().await;
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], Value::Null);

        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["id"], 3);
    }

    #[tokio::test]
    async fn test_mcp_watch_does_not_block_other_calls() {
        let relay = test_relay();
        let queue = relay.queue();
        let (mut client, _handle) = start_mcp(&relay);

        client
            .send(json!({
                "jsonrpc": "2.0", "id": 10, "method": "tools/call",
                "params": {"name": "watch", "arguments": {"timeout_seconds": 5}}
            }))
            .await;
        client
            .send(json!({"jsonrpc": "2.0", "id": 11, "method": "ping"}))
            .await;

        // watch 仍在阻塞，ping 先返回
        let response = client.recv().await;
        assert_eq!(response["id"], 11);

        queue
            .enqueue("make it pop", Some("http://localhost:3000/".to_string()), None)
            .unwrap();

        let response = client.recv().await;
        assert_eq!(response["id"], 10);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("make it pop"));
        assert!(text.contains("Prompt from /"));
        assert_eq!(queue.count(), 0);
    }

    #[tokio::test]
    async fn test_mcp_get_list_clear_scenario() {
        let relay = test_relay();
        let queue = relay.queue();
        let (mut client, _handle) = start_mcp(&relay);

        queue
            .enqueue("add a footer", None, Some("/design".to_string()))
            .unwrap();

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "list_pending"}}))
            .await;
        let text = client.recv().await["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.contains("1 pending prompt(s)"));
        assert!(text.contains("/design (12 chars"));

        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "get_prompt"}}))
            .await;
        let text = client.recv().await["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.contains("add a footer"));
        assert!(text.contains("/design"));
        assert_eq!(queue.count(), 1);

        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "clear"}}))
            .await;
        let text = client.recv().await["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(text, "Cleared 1 prompt(s).");
        assert_eq!(queue.count(), 0);

        client
            .send(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "get_prompt"}}))
            .await;
        let text = client.recv().await["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(text, "No pending prompts.");
    }
}

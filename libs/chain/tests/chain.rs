#[cfg(test)]
mod tests {
    use chain::error::{FailureClass, RpcFailure};
    use chain::limits::{RpcLimitations, RpcMethod};
    use eyre::Result;

    fn rpc(code: i64, message: &str) -> RpcFailure {
        RpcFailure::Rpc { code, message: message.to_string() }
    }

    #[test]
    fn test_archive_node_errors_are_detected_by_message() {
        let missing_trie = rpc(-32000, "missing trie node 1a2b3c (path )");
        assert_eq!(missing_trie.class(), FailureClass::ArchiveNodeRequired);

        let pruned = rpc(-32000, "Run with --pruning=archive to query old state");
        assert_eq!(pruned.class(), FailureClass::ArchiveNodeRequired);

        let http = RpcFailure::Http { status: 400, body: "Missing Trie Node".to_string() };
        assert!(http.requires_archive_node());
        assert!(!http.is_retryable());
    }

    #[test]
    fn test_rate_limits_and_server_errors_are_retryable() {
        assert_eq!(rpc(429, "slow down").class(), FailureClass::Retryable);
        assert_eq!(rpc(-32005, "limit").class(), FailureClass::Retryable);
        assert_eq!(rpc(-32600, "daily request count exceeded").class(), FailureClass::Retryable);
        assert_eq!(
            RpcFailure::Http { status: 503, body: String::new() }.class(),
            FailureClass::Retryable
        );
        assert_eq!(
            RpcFailure::Http { status: 429, body: String::new() }.class(),
            FailureClass::Retryable
        );
        assert_eq!(RpcFailure::Timeout("30s".to_string()).class(), FailureClass::Retryable);
        assert_eq!(
            RpcFailure::Transport("connection reset".to_string()).class(),
            FailureClass::Retryable
        );
    }

    #[test]
    fn test_misconfiguration_is_fatal() {
        assert_eq!(rpc(-32601, "method not found").class(), FailureClass::Fatal);
        assert_eq!(rpc(-32602, "invalid params").class(), FailureClass::Fatal);
        assert_eq!(RpcFailure::Decode("expected array".to_string()).class(), FailureClass::Fatal);
        assert_eq!(
            RpcFailure::Http { status: 401, body: "unauthorized".to_string() }.class(),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_limitations_from_json() -> Result<()> {
        let json = r#"{
            "max_get_logs_addresses": 10,
            "max_get_logs_block_span": 3000,
            "methods": { "eth_get_logs": 5, "eth_call": null },
            "min_delay_between_calls_ms": 250
        }"#;
        let limitations: RpcLimitations = serde_json::from_str(json)?;

        assert_eq!(limitations.max_get_logs_addresses, 10);
        assert_eq!(limitations.max_batch_calls(RpcMethod::EthGetLogs), 5);
        // null and missing both mean "no batching"
        assert_eq!(limitations.max_batch_calls(RpcMethod::EthCall), 1);
        assert_eq!(limitations.max_batch_calls(RpcMethod::EthBlockNumber), 1);
        assert!(!limitations.supports_batching(RpcMethod::EthCall));
        assert_eq!(limitations.min_delay_between_calls().as_millis(), 250);
        assert!(!limitations.is_archive_node);
        Ok(())
    }
}

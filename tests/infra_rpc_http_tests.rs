//! HTTP-based integration tests for the JSON-RPC health checker and the EVM
//! contract backend.
//!
//! Uses `wiremock` to stand in for XDC RPC nodes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vrf_dice_sync::domain::{AppError, ContractBackend, ContractError, EndpointProbe, NetworkConfig};
use vrf_dice_sync::infra::network::xdc_apothem;
use vrf_dice_sync::infra::{
    EvmContractBackend, FailoverConfig, HealthCheckConfig, HttpRpcHealthChecker,
    JsonRpcHttpClient, NetworkRegistry, RpcFailover,
};

const PLAYER: &str = "0xaaaa000000000000000000000000000000000001";

fn rpc_result(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

fn rpc_error(code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": code, "message": message } })
}

fn word(value: u128) -> String {
    format!("{value:064x}")
}

// ============================================================================
// HEALTH CHECKER TESTS
// ============================================================================

mod health_checker_tests {
    use super::*;

    fn checker(config: HealthCheckConfig) -> HttpRpcHealthChecker {
        HttpRpcHealthChecker::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_healthy_endpoint_reports_block_number() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x4b7"))))
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig::default())
            .probe(&mock_server.uri())
            .await;

        assert!(health.healthy);
        assert_eq!(health.block_number, Some(1207));
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_http_500_is_unhealthy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig::default())
            .probe(&mock_server.uri())
            .await;

        assert!(!health.healthy);
        assert!(health.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_json_rpc_error_is_unhealthy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(rpc_error(-32000, "header not found")),
            )
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig::default())
            .probe(&mock_server.uri())
            .await;

        assert!(!health.healthy);
        assert!(health.block_number.is_none());
    }

    #[tokio::test]
    async fn test_malformed_quantity_is_unhealthy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(42))))
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig::default())
            .probe(&mock_server.uri())
            .await;

        assert!(!health.healthy);
    }

    #[tokio::test]
    async fn test_slow_endpoint_exceeds_latency_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!("0x1")))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig {
            timeout: Duration::from_secs(5),
            max_latency: Some(Duration::from_millis(50)),
        })
        .probe(&mock_server.uri())
        .await;

        assert!(!health.healthy);
        assert!(health.latency_ms >= 50);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unhealthy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!("0x1")))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let health = checker(HealthCheckConfig {
            timeout: Duration::from_millis(100),
            max_latency: None,
        })
        .probe(&mock_server.uri())
        .await;

        assert!(!health.healthy);
    }
}

// ============================================================================
// EVM CONTRACT BACKEND TESTS
// ============================================================================

mod evm_backend_tests {
    use super::*;

    fn network(endpoints: Vec<String>) -> NetworkConfig {
        NetworkConfig {
            rpc_endpoints: endpoints,
            ..xdc_apothem()
        }
    }

    fn backend(endpoints: Vec<String>) -> (EvmContractBackend, Arc<NetworkRegistry>) {
        let registry = Arc::new(NetworkRegistry::new(vec![network(endpoints)]).unwrap());
        let probe = Arc::new(HttpRpcHealthChecker::new(HealthCheckConfig::default()).unwrap());
        let failover = Arc::new(RpcFailover::new(
            Arc::clone(&registry),
            probe,
            FailoverConfig {
                max_retries: 2,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
        ));
        let client = JsonRpcHttpClient::new(Duration::from_secs(5)).unwrap();
        (EvmContractBackend::new(failover, client), registry)
    }

    fn game_status_data(active: bool, eligible: bool, last_play: u64) -> String {
        let words = [
            word(active as u128),
            word(0),
            word(!active as u128),
            word(42),
            word(1_000_000_000_000_000_000),
            word(0),
            word(0),
            "ab".repeat(32),
            word(1),
            word(0),
            word(eligible as u128),
            word(last_play as u128),
        ];
        format!("0x{}", words.concat())
    }

    #[tokio::test]
    async fn test_get_code_reads_bytecode() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getCode" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x6080"))))
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let code = backend
            .get_code(51, &xdc_apothem().contracts.game)
            .await
            .unwrap();
        assert_eq!(code, "0x6080");
    }

    #[tokio::test]
    async fn test_game_status_is_decoded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_call" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!(game_status_data(true, true, 1_700_000_000)))),
            )
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let game = backend.game_contract(51, &xdc_apothem().contracts.game);
        let status = game.get_game_status(PLAYER).await.unwrap();

        assert!(status.is_active);
        assert!(status.recovery_eligible);
        assert_eq!(status.chosen_number, 42);
        assert_eq!(status.last_play_timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_game_status_calldata_uses_selector() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!(game_status_data(false, false, 0)))),
            )
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let game = backend.game_contract(51, &xdc_apothem().contracts.game);
        game.get_game_status(PLAYER).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let data = body["params"][0]["data"].as_str().unwrap();
        assert!(data.starts_with("0x54e4437e"));
        assert!(data.ends_with(&PLAYER[2..]));
        assert_eq!(body["params"][1], "latest");
    }

    #[tokio::test]
    async fn test_token_balance_is_decoded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!(format!("0x{}", word(5_000))))),
            )
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let token = backend.token_contract(51, &xdc_apothem().contracts.token);
        assert_eq!(token.balance_of(PLAYER).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_bet_history_is_decoded() {
        let mock_server = MockServer::start().await;

        let data = format!(
            "0x{}",
            [
                word(32),
                word(1),
                word(3),
                word(5),
                word(1_700_000_000),
                word(100),
                word(0),
            ]
            .concat()
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(data))))
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let game = backend.game_contract(51, &xdc_apothem().contracts.game);
        let history = game.get_bet_history(PLAYER).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].chosen_number, 3);
        assert_eq!(history[0].rolled_number, 5);
        assert!(!history[0].is_win());
    }

    #[tokio::test]
    async fn test_revert_maps_to_contract_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(rpc_error(3, "execution reverted: no stats")),
            )
            .mount(&mock_server)
            .await;

        let (backend, _) = backend(vec![mock_server.uri()]);
        let game = backend.game_contract(51, &xdc_apothem().contracts.game);
        let result = game.get_contract_stats().await;

        assert!(matches!(
            result,
            Err(AppError::Contract(ContractError::Reverted(_)))
        ));
        // A revert is not an endpoint failure: exactly one request went out
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_endpoint_rotates_to_backup() {
        let primary = MockServer::start().await;
        let backup = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x6080"))))
            .mount(&backup)
            .await;

        let (backend, registry) = backend(vec![primary.uri(), backup.uri()]);
        let code = backend
            .get_code(51, &xdc_apothem().contracts.token)
            .await
            .unwrap();

        assert_eq!(code, "0x6080");
        // max_retries = 2 consecutive failures before rotating
        assert_eq!(primary.received_requests().await.unwrap().len(), 2);
        assert_eq!(registry.active_endpoint(51), Some(backup.uri()));
    }

    #[tokio::test]
    async fn test_all_endpoints_down_is_rpc_unhealthy() {
        let primary = MockServer::start().await;
        let backup = MockServer::start().await;

        for server in [&primary, &backup] {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(502))
                .mount(server)
                .await;
        }

        let (backend, _) = backend(vec![primary.uri(), backup.uri()]);
        let result = backend.get_code(51, &xdc_apothem().contracts.token).await;

        assert!(matches!(
            result,
            Err(AppError::RpcUnhealthy { chain_id: 51, .. })
        ));
    }
}

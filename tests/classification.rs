use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use token_ledger_indexer::config::ScannerConfig;
use token_ledger_indexer::models::Address;
use token_ledger_indexer::{ContractClassifier, Database, IndexerError, RpcClient, ScanEngine};

const TOKEN: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const CREATOR: &str = "0x1111111111111111111111111111111111111111";

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": code, "message": message},
    }))
}

/// ABI-encode a string return value in the dynamic layout.
fn abi_string(text: &str) -> String {
    let data = hex::encode(text.as_bytes());
    let padded_len = data.len().div_ceil(64) * 64;
    format!("0x{:064x}{:064x}{:0<padded_len$}", 0x20, text.len(), data)
}

fn abi_uint(value: u128) -> String {
    format!("0x{:064x}", value)
}

async fn mount_call(server: &MockServer, selector_body: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains(selector_body))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_token_classification() {
    let server = MockServer::start().await;
    mount_call(&server, "eth_getCode", rpc_result(json!("0x6080604052"))).await;
    mount_call(&server, "06fdde03", rpc_result(json!(abi_string("Test Token")))).await;
    mount_call(&server, "95d89b41", rpc_result(json!(abi_string("TST")))).await;
    mount_call(&server, "313ce567", rpc_result(json!(abi_uint(18)))).await;
    mount_call(&server, "18160ddd", rpc_result(json!(abi_uint(1_000_000)))).await;

    let classifier = ContractClassifier::new(RpcClient::new(server.uri()));
    let record = classifier
        .classify(&Address::parse(TOKEN).unwrap())
        .await
        .unwrap();

    assert!(record.is_token);
    assert_eq!(record.name.as_deref(), Some("Test Token"));
    assert_eq!(record.symbol.as_deref(), Some("TST"));
    assert_eq!(record.decimals, Some(18));
    assert_eq!(record.total_supply.as_deref(), Some("1000000"));
    assert_eq!(record.bytecode, "0x6080604052");
}

#[tokio::test]
async fn test_externally_owned_account_is_not_a_contract() {
    let server = MockServer::start().await;
    mount_call(&server, "eth_getCode", rpc_result(json!("0x"))).await;

    let classifier = ContractClassifier::new(RpcClient::new(server.uri()));
    let result = classifier.classify(&Address::parse(TOKEN).unwrap()).await;

    assert!(matches!(result, Err(IndexerError::NotAContract(_))));
}

#[tokio::test]
async fn test_partial_interface_still_classifies_as_token() {
    let server = MockServer::start().await;
    mount_call(&server, "eth_getCode", rpc_result(json!("0x6080604052"))).await;
    // name() reverts, symbol() answers, decimals() returns nothing.
    mount_call(&server, "06fdde03", rpc_error(-32000, "execution reverted")).await;
    mount_call(&server, "95d89b41", rpc_result(json!(abi_string("TST")))).await;
    mount_call(&server, "313ce567", rpc_result(json!(null))).await;
    mount_call(&server, "18160ddd", rpc_result(json!(abi_uint(42)))).await;

    let classifier = ContractClassifier::new(RpcClient::new(server.uri()));
    let record = classifier
        .classify(&Address::parse(TOKEN).unwrap())
        .await
        .unwrap();

    assert!(record.is_token);
    assert_eq!(record.name, None);
    assert_eq!(record.symbol.as_deref(), Some("TST"));
    assert_eq!(record.decimals, None);
    assert_eq!(record.total_supply.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_contract_without_token_interface() {
    let server = MockServer::start().await;
    mount_call(&server, "eth_getCode", rpc_result(json!("0x6080604052"))).await;
    mount_call(&server, "06fdde03", rpc_error(-32000, "execution reverted")).await;
    mount_call(&server, "95d89b41", rpc_error(-32000, "execution reverted")).await;
    mount_call(&server, "313ce567", rpc_error(-32000, "execution reverted")).await;

    let classifier = ContractClassifier::new(RpcClient::new(server.uri()));
    let record = classifier
        .classify(&Address::parse(TOKEN).unwrap())
        .await
        .unwrap();

    assert!(!record.is_token);
    assert_eq!(record.total_supply, None);
}

#[tokio::test]
async fn test_register_creation_resolves_receipt_and_persists() {
    let server = MockServer::start().await;
    mount_call(&server, "eth_getCode", rpc_result(json!("0x6080604052"))).await;
    mount_call(&server, "06fdde03", rpc_result(json!(abi_string("Test Token")))).await;
    mount_call(&server, "95d89b41", rpc_result(json!(abi_string("TST")))).await;
    mount_call(&server, "313ce567", rpc_result(json!(abi_uint(18)))).await;
    mount_call(&server, "18160ddd", rpc_result(json!(abi_uint(1_000_000)))).await;
    mount_call(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({
            "contractAddress": TOKEN,
            "from": CREATOR,
            "blockNumber": "0x64",
            "transactionHash": "0xcreate1",
        })),
    )
    .await;

    let db = Arc::new(Database::new_in_memory().unwrap());
    let engine = ScanEngine::new(
        RpcClient::new(server.uri()),
        Arc::clone(&db),
        ScannerConfig::default(),
        Arc::new(AtomicBool::new(false)),
    );

    let record = engine
        .register_creation("0xcreate1")
        .await
        .unwrap()
        .expect("receipt names a created contract");

    assert_eq!(record.address, Address::parse(TOKEN).unwrap());
    assert_eq!(record.creator_address, Some(Address::parse(CREATOR).unwrap()));
    assert_eq!(record.creation_block, Some(100));
    assert_eq!(record.creation_tx.as_deref(), Some("0xcreate1"));

    let stored = db
        .get_contract(&Address::parse(TOKEN).unwrap())
        .unwrap()
        .expect("persisted");
    assert!(stored.is_token);
    assert_eq!(stored.creation_block, Some(100));
}

#[tokio::test]
async fn test_plain_value_transfer_receipt_creates_nothing() {
    let server = MockServer::start().await;
    mount_call(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({
            "contractAddress": null,
            "from": CREATOR,
            "blockNumber": "0x64",
            "transactionHash": "0xplain",
        })),
    )
    .await;

    let db = Arc::new(Database::new_in_memory().unwrap());
    let engine = ScanEngine::new(
        RpcClient::new(server.uri()),
        Arc::clone(&db),
        ScannerConfig::default(),
        Arc::new(AtomicBool::new(false)),
    );

    let record = engine.register_creation("0xplain").await.unwrap();
    assert!(record.is_none());
}

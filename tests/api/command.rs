use super::Guard;
use sentinel_guard::{
    base::{BlockType, TrafficType},
    core::flow,
    datasource::{rule_json_array_parser, FileWritableDataSource, WritableDataSourceRegistry},
    transport::{CommandHandler, CommandRequest, FetchRulesCommandHandler, ModifyRulesCommandHandler},
    EntryBuilder,
};
use std::env;
use std::fs;
use std::sync::Arc;

fn pass(guard: &Guard, resource: &str, origin: &str) -> Result<(), BlockType> {
    let mut builder = EntryBuilder::new(resource.into())
        .with_traffic_type(TrafficType::Inbound)
        .with_slot_chain(guard.chain.clone());
    if !origin.is_empty() {
        let context =
            sentinel_guard::api::enter_context_of(&guard.storage, "command_test", origin).unwrap();
        builder = builder.with_context(context);
    }
    builder
        .build()
        .map(|entry| entry.exit())
        .map_err(|err| err.block_type())
}

#[test]
fn update_rules_then_persist() {
    let guard = Guard::new();
    let registry = Arc::new(WritableDataSourceRegistry::new());
    let path = env::temp_dir().join(format!("sentinel-flow-{}.json", uuid::Uuid::new_v4()));
    registry.register_flow_data_source(Some(Arc::new(
        FileWritableDataSource::<flow::Rule>::new(&path).unwrap(),
    )));
    let handler = ModifyRulesCommandHandler::new(guard.managers.clone(), registry);

    let resp = handler.handle_request(
        &CommandRequest::new()
            .with_param("type", "flow")
            .with_param("data", r#"[{"resource":"cmd_res","threshold":1.0}]"#),
    );
    assert!(resp.is_success());
    assert_eq!("success", resp.result());

    // the rules are in effect
    assert_eq!(Ok(()), pass(&guard, "cmd_res", ""));
    assert_eq!(Err(BlockType::Flow), pass(&guard, "cmd_res", ""));

    // and persisted
    let persisted =
        rule_json_array_parser::<flow::Rule>(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(1, persisted.len());
    assert_eq!("cmd_res", persisted[0].resource);

    // a bad update leaves the rules in effect
    let resp = handler.handle("flow", "not a json array");
    assert!(!resp.is_success());
    assert_eq!("parse rule data error", resp.result());
    assert_eq!(Err(BlockType::Flow), pass(&guard, "cmd_res", ""));
    let resp = handler.handle("flow", "%E2%28%A1");
    assert_eq!("decode rule data error", resp.result());
    assert_eq!(Err(BlockType::Flow), pass(&guard, "cmd_res", ""));

    // an empty array clears the rules
    assert!(handler.handle("flow", "[]").is_success());
    assert_eq!(Ok(()), pass(&guard, "cmd_res", ""));
    fs::remove_file(&path).unwrap();
}

#[test]
fn authority_and_fetch() {
    let guard = Guard::new();
    let handler = ModifyRulesCommandHandler::new(
        guard.managers.clone(),
        Arc::new(WritableDataSourceRegistry::new()),
    );
    let resp = handler.handle(
        "Authority",
        r#"[{"resource":"auth_res","strategy":"White","limit_origins":["app-a"]}]"#,
    );
    assert!(resp.is_success());
    assert_eq!(Ok(()), pass(&guard, "auth_res", "app-a"));
    assert_eq!(Err(BlockType::Authority), pass(&guard, "auth_res", "app-b"));
    // unknown callers are not checked
    assert_eq!(Ok(()), pass(&guard, "auth_res", ""));

    let fetch = FetchRulesCommandHandler::new(guard.managers.clone());
    let resp = fetch.handle("authority");
    assert!(resp.is_success());
    assert!(resp.result().contains("app-a"));
}

#[test]
fn invalid_type() {
    let guard = Guard::new();
    let handler = ModifyRulesCommandHandler::new(
        guard.managers.clone(),
        Arc::new(WritableDataSourceRegistry::new()),
    );
    let resp = handler.handle("cluster", "[]");
    assert!(!resp.is_success());
    assert_eq!("invalid type", resp.result());
}

#[test]
fn url_encoded_update() {
    let guard = Guard::new();
    let handler = ModifyRulesCommandHandler::new(
        guard.managers.clone(),
        Arc::new(WritableDataSourceRegistry::new()),
    );
    // [{"resource":"encoded res","threshold":1.0}]
    let data = "%5B%7B%22resource%22%3A%22encoded+res%22%2C%22threshold%22%3A1.0%7D%5D";
    let resp = handler.handle_request(
        &CommandRequest::new()
            .with_param("type", "flow")
            .with_param("data", data),
    );
    assert_eq!("success", resp.result());
    assert_eq!(Ok(()), pass(&guard, "encoded res", ""));
    assert_eq!(Err(BlockType::Flow), pass(&guard, "encoded res", ""));
}

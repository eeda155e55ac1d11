use super::*;
use crate::api::RuleManagers;
use crate::base::SentinelRule;
use crate::datasource::{
    default_writable_data_source_registry, rule_json_array_encoder, rule_json_array_parser,
    RuleDataSource, WritableDataSourceRegistry,
};
use crate::{logging, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

const SUCCESS_MSG: &str = "success";
const DECODE_FAILURE_MSG: &str = "decode rule data error";
const PARSE_FAILURE_MSG: &str = "parse rule data error";
const WRITE_DS_FAILURE_MSG: &str = "partial success (write data source failed)";

/// ModifyRulesCommandHandler serves `setRules`: the rules of the given kind are replaced
/// by the decoded ones as a whole, then written to the data source registered for the kind.
pub struct ModifyRulesCommandHandler {
    managers: RuleManagers,
    registry: Arc<WritableDataSourceRegistry>,
}

impl Default for ModifyRulesCommandHandler {
    fn default() -> Self {
        Self::new(RuleManagers::global(), default_writable_data_source_registry())
    }
}

impl ModifyRulesCommandHandler {
    pub fn new(managers: RuleManagers, registry: Arc<WritableDataSourceRegistry>) -> Self {
        ModifyRulesCommandHandler { managers, registry }
    }

    /// `data` is a url encoded JSON array of rule records, the old rules are untouched on
    /// any failure before loading. A failed data source write does not roll back the loaded rules.
    pub fn handle(&self, kind: &str, data: &str) -> CommandResponse {
        logging::info!(
            "[ModifyRulesCommandHandler] Receiving rule change (type: {}): {}",
            kind,
            data
        );
        let kind = match kind.parse::<RuleKind>() {
            Ok(kind) => kind,
            Err(err) => return CommandResponse::of_failure(err.to_string()),
        };
        let data = match decode_rule_data(data) {
            Ok(data) => data,
            Err(err) => {
                logging::info!(
                    "[ModifyRulesCommandHandler] Decode rule data error: {:?}",
                    err
                );
                return CommandResponse::of_failure(DECODE_FAILURE_MSG);
            }
        };
        let data = data.as_str();
        let managers = &self.managers;
        match kind {
            RuleKind::Flow => modify_rules(
                data,
                |rules| managers.flow.load_rules(rules),
                self.registry.flow_data_source(),
            ),
            RuleKind::Degrade => modify_rules(
                data,
                |rules| managers.circuitbreaker.load_rules(rules),
                self.registry.degrade_data_source(),
            ),
            RuleKind::System => modify_rules(
                data,
                |rules| managers.system.load_rules(rules),
                self.registry.system_data_source(),
            ),
            RuleKind::Authority => modify_rules(
                data,
                |rules| managers.authority.load_rules(rules),
                self.registry.authority_data_source(),
            ),
            RuleKind::ParamFlow => modify_rules(
                data,
                |rules| managers.hotspot.load_rules(rules),
                self.registry.param_flow_data_source(),
            ),
        }
    }
}

impl CommandHandler for ModifyRulesCommandHandler {
    fn name(&self) -> &'static str {
        "setRules"
    }

    fn desc(&self) -> &'static str {
        "modify the rules, accept param: type={ruleType}&data={ruleJson}"
    }

    fn handle_request(&self, request: &CommandRequest) -> CommandResponse {
        self.handle(
            request.param("type").unwrap_or_default(),
            request.param("data").unwrap_or_default(),
        )
    }
}

/// Form decoding: `+` is a space, `%XX` a byte. The decoded bytes must be UTF-8.
fn decode_rule_data(data: &str) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }
    let data = data.replace('+', " ");
    Ok(urlencoding::decode(&data)?.into_owned())
}

fn modify_rules<P, L>(
    data: &str,
    load: L,
    data_source: Option<RuleDataSource<P>>,
) -> CommandResponse
where
    P: SentinelRule + DeserializeOwned,
    L: FnOnce(Vec<Arc<P>>) -> Result<bool>,
{
    let rules = match rule_json_array_parser::<P>(data) {
        Ok(rules) => rules,
        Err(err) => {
            logging::info!(
                "[ModifyRulesCommandHandler] Parse rule data error: {:?}",
                err
            );
            return CommandResponse::of_failure(PARSE_FAILURE_MSG);
        }
    };
    if let Err(err) = load(rules.clone()) {
        logging::warn!(
            "[ModifyRulesCommandHandler] Rules rejected, error: {:?}",
            err
        );
        return CommandResponse::of_failure(err.to_string());
    }
    if let Some(data_source) = data_source {
        if let Err(err) = data_source.write(&rules) {
            logging::warn!(
                "[ModifyRulesCommandHandler] Write data source failed, error: {:?}",
                err
            );
            return CommandResponse::of_success(WRITE_DS_FAILURE_MSG);
        }
    }
    CommandResponse::of_success(SUCCESS_MSG)
}

/// FetchRulesCommandHandler serves `getRules`: the active rules of the given kind as a JSON array.
pub struct FetchRulesCommandHandler {
    managers: RuleManagers,
}

impl Default for FetchRulesCommandHandler {
    fn default() -> Self {
        Self::new(RuleManagers::global())
    }
}

impl FetchRulesCommandHandler {
    pub fn new(managers: RuleManagers) -> Self {
        FetchRulesCommandHandler { managers }
    }

    pub fn handle(&self, kind: &str) -> CommandResponse {
        let kind = match kind.parse::<RuleKind>() {
            Ok(kind) => kind,
            Err(err) => return CommandResponse::of_failure(err.to_string()),
        };
        let encoded = match kind {
            RuleKind::Flow => encode(&self.managers.flow.get_rules()),
            RuleKind::Degrade => encode(&self.managers.circuitbreaker.get_rules()),
            RuleKind::System => encode(&self.managers.system.get_rules()),
            RuleKind::Authority => encode(&self.managers.authority.get_rules()),
            RuleKind::ParamFlow => encode(&self.managers.hotspot.get_rules()),
        };
        match encoded {
            Ok(rules) => CommandResponse::of_success(rules),
            Err(err) => CommandResponse::of_failure(err.to_string()),
        }
    }
}

impl CommandHandler for FetchRulesCommandHandler {
    fn name(&self) -> &'static str {
        "getRules"
    }

    fn desc(&self) -> &'static str {
        "get all active rules by type, request param: type={ruleType}"
    }

    fn handle_request(&self, request: &CommandRequest) -> CommandResponse {
        self.handle(request.param("type").unwrap_or_default())
    }
}

fn encode<P: SentinelRule + Serialize>(rules: &[Arc<P>]) -> Result<String> {
    rule_json_array_encoder(rules)
}

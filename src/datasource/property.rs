use super::*;
use serde_json;

/// PropertyConverter func is to convert source message string to the specific property, that is, the sentinel rules.
/// if succeed to convert src, return Ok(Property)
/// if not, return the detailed error when convert src.
pub type PropertyConverter<P> = fn(src: &str) -> Result<Vec<Arc<P>>>;

/// PropertyEncoder func is the reverse of `PropertyConverter`.
pub type PropertyEncoder<P> = fn(rules: &[Arc<P>]) -> Result<String>;

/// `rule_json_array_parser` provide JSON as the default serialization for list of rules.
/// Blank source means no rules.
pub fn rule_json_array_parser<P: SentinelRule + DeserializeOwned>(
    src: &str,
) -> Result<Vec<Arc<P>>> {
    if src.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rules: Vec<P> = serde_json::from_str(src)
        .map_err(|err| Error::msg(format!("fail to parse rules: {}", err)))?;
    Ok(rules.into_iter().map(Arc::new).collect())
}

/// `rule_json_array_encoder` writes the rules as a JSON array
pub fn rule_json_array_encoder<P: SentinelRule + Serialize>(rules: &[Arc<P>]) -> Result<String> {
    let rules: Vec<&P> = rules.iter().map(|r| r.as_ref()).collect();
    Ok(serde_json::to_string(&rules)?)
}

//! Policy document loading
//!
//! Policies are authored as TOML (or JSON) documents and handed to the
//! compiler as a raw JSON mapping. Key order survives parsing, since rule
//! order decides which match is reported first.

use crate::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Reads a policy document, choosing the parser by file extension.
///
/// `.json` files are parsed as JSON; anything else as TOML.
pub fn load_policy_file(path: impl AsRef<Path>) -> Result<Map<String, Value>, ConfigError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        return load_policy_json(path);
    }

    let text = read(path)?;
    parse_policy_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses a TOML policy document.
pub fn parse_policy_str(text: &str) -> Result<Map<String, Value>, toml::de::Error> {
    toml::from_str(text)
}

/// Reads a JSON policy document. The top level must be an object.
pub fn load_policy_json(path: impl AsRef<Path>) -> Result<Map<String, Value>, ConfigError> {
    let path = path.as_ref();
    let text = read(path)?;

    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::JsonError {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::ValidationError(format!(
            "policy document at {} must be an object",
            path.display()
        ))),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const STAFF_POLICY: &str = r#"
deny = false
eduPersonAffiliation = ["^staff$", "^faculty$"]
uid = "^admin$"

[rejectMsg]
en = "Staff only"
el = "Μόνο για προσωπικό"
"#;

    #[test]
    fn test_parse_toml_policy() {
        let policy = parse_policy_str(STAFF_POLICY).expect("Failed to parse policy");

        assert_eq!(policy["deny"], json!(false));
        assert_eq!(
            policy["eduPersonAffiliation"],
            json!(["^staff$", "^faculty$"])
        );
        assert_eq!(policy["rejectMsg"]["el"], json!("Μόνο για προσωπικό"));
    }

    #[test]
    fn test_key_order_preserved() {
        let policy = parse_policy_str(STAFF_POLICY).expect("Failed to parse policy");

        let keys: Vec<&str> = policy.keys().map(String::as_str).collect();
        assert_eq!(keys, ["deny", "eduPersonAffiliation", "uid", "rejectMsg"]);
    }

    #[test]
    fn test_client_tables() {
        let policy = parse_policy_str(
            r#"
oidc_issuer = "https://op.example.org/"

[clients.portal]
affiliation = "^staff$"

[clients.wiki]
deny = true
uid = ["^guest$"]
"#,
        )
        .expect("Failed to parse policy");

        assert_eq!(policy["clients"]["portal"]["affiliation"], json!("^staff$"));
        assert_eq!(policy["clients"]["wiki"]["deny"], json!(true));
    }

    #[test]
    fn test_load_by_extension() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let toml_path = temp_dir.path().join("policy.toml");
        fs::write(&toml_path, STAFF_POLICY).expect("Failed to write policy");
        let from_toml = load_policy_file(&toml_path).expect("Failed to load TOML");

        let json_path = temp_dir.path().join("policy.json");
        fs::write(&json_path, r#"{"uid": "^admin$", "deny": true}"#)
            .expect("Failed to write policy");
        let from_json = load_policy_file(&json_path).expect("Failed to load JSON");

        assert_eq!(from_toml["uid"], json!("^admin$"));
        assert_eq!(from_json["deny"], json!(true));
    }

    #[test]
    fn test_json_must_be_object() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("policy.json");
        fs::write(&path, "[1, 2]").expect("Failed to write policy");

        assert!(matches!(
            load_policy_json(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_errors_carry_path() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            load_policy_file(&missing),
            Err(ConfigError::ReadError { .. })
        ));

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "uid = [").expect("Failed to write policy");
        match load_policy_file(&broken) {
            Err(ConfigError::ParseError { path, .. }) => assert_eq!(path, broken),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}

use serde_json::Value;
use uuid::Uuid;
use warden_types::{EnvVar, WorkloadTemplate};

use crate::naming;
use crate::util::Error;

fn get<'a>(spec: &'a Value, path: &str) -> Result<&'a Value, Error> {
    let mut cursor = spec;
    for part in path.split('.') {
        cursor = cursor
            .get(part)
            .ok_or_else(|| Error::malformed(path, "missing field"))?;
    }
    Ok(cursor)
}

fn get_str(spec: &Value, path: &str) -> Result<String, Error> {
    get(spec, path)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::malformed(path, "expected a string"))
}

fn get_i64(spec: &Value, path: &str) -> Result<i64, Error> {
    get(spec, path)?
        .as_i64()
        .ok_or_else(|| Error::malformed(path, "expected an integer"))
}

fn get_str_seq(spec: &Value, path: &str) -> Result<Vec<String>, Error> {
    let arr = get(spec, path)?
        .as_array()
        .ok_or_else(|| Error::malformed(path, "expected an array"))?;
    arr.iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::malformed(format!("{path}[{i}]"), "expected a string"))
        })
        .collect()
}

/// Extracts `spec.env`: an ordered sequence of `{name, value}` pairs. Missing or empty is
/// accepted (the boundary behavior in `SPEC_FULL.md` §8), but if present it must be
/// well-formed.
fn get_env(spec: &Value) -> Result<Vec<EnvVar>, Error> {
    let Some(entries) = spec.get("env") else {
        return Ok(Vec::new());
    };
    let entries = entries
        .as_array()
        .ok_or_else(|| Error::malformed("env", "expected an array"))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed(format!("env[{i}].name"), "missing or not a string"))?;
            let value = entry
                .get("value")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed(format!("env[{i}].value"), "missing or not a string"))?;
            Ok(EnvVar::new(name, value))
        })
        .collect()
}

/// Validates and projects a document's `spec` subtree into a [`WorkloadTemplate`] (§4.2).
/// Any missing or wrongly-typed field fails the whole extraction with a malformed-document
/// error naming the offending path.
pub fn extract(spec: &Value) -> Result<WorkloadTemplate, Error> {
    let id_str = get_str(spec, "id")?;
    let id = Uuid::parse_str(&id_str).map_err(|_| Error::malformed("id", "not a valid uuid"))?;

    let mut env = get_env(spec)?;

    let api_v1_url = get_str(spec, "settings.api.v1.url")?;
    let api_v1_key = get_str(spec, "settings.api.v1.key")?;
    let api_v2_url = get_str(spec, "settings.api.v2.url")?;
    let api_v2_email = get_str(spec, "settings.api.v2.email")?;
    let api_v2_password = get_str(spec, "settings.api.v2.password")?;

    let app_id = get_str(spec, "settings.app.id")?;
    let release_id = get_str(spec, "settings.release.id")?;
    let world_id = get_str(spec, "settings.world.id")?;
    let max_players = get_i64(spec, "settings.players.max")?;
    let host = get_str(spec, "settings.server.host")?;
    let image = get_str(spec, "settings.server.image")?;
    let image_pull_secrets = get_str_seq(spec, "settings.server.imagePullSecrets")?;

    let resource_name = naming::name(id);

    env.push(EnvVar::new("VE_API_ROOT_URL", api_v1_url));
    env.push(EnvVar::new("VE_API2_ROOT_URL", api_v2_url));
    env.push(EnvVar::new("VE_SERVER_API_KEY", api_v1_key));
    env.push(EnvVar::new("VE_SERVER_API_EMAIL", api_v2_email));
    env.push(EnvVar::new("VE_SERVER_API_PASSWORD", api_v2_password));
    env.push(EnvVar::new("VE_SERVER_ID", resource_name.clone()));
    env.push(EnvVar::new("VE_SERVER_NAME", resource_name));
    env.push(EnvVar::new("VE_SERVER_HOST", host.clone()));
    env.push(EnvVar::new("VE_SERVER_MAX_PLAYERS", max_players.to_string()));
    env.push(EnvVar::new("VE_SERVER_SPACE_ID", world_id));
    env.push(EnvVar::new("VE_SERVER_APP_ID", app_id));
    env.push(EnvVar::new("VE_SERVER_RELEASE_ID", release_id));

    Ok(WorkloadTemplate {
        id,
        env,
        image,
        image_pull_secrets,
        host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn well_formed_spec(id: &str) -> Value {
        json!({
            "id": id,
            "env": [{"name": "CUSTOM_VAR", "value": "1"}],
            "settings": {
                "api": {
                    "v1": {"url": "https://api.example.com", "key": "k"},
                    "v2": {"url": "https://api2.example.com", "email": "a@b.com", "password": "p"},
                },
                "app": {"id": "app-1"},
                "release": {"id": "rel-1"},
                "world": {"id": "world-1"},
                "players": {"max": 16},
                "server": {
                    "host": "example.com",
                    "image": "example/server:latest",
                    "imagePullSecrets": ["regcred"],
                },
            },
        })
    }

    #[test]
    fn extracts_well_formed_document() {
        let id = Uuid::new_v4().to_string();
        let tpl = extract(&well_formed_spec(&id)).expect("extraction should succeed");
        assert_eq!(tpl.id.to_string(), id);
        assert_eq!(tpl.image, "example/server:latest");
        assert_eq!(tpl.image_pull_secrets, vec!["regcred".to_string()]);
        assert_eq!(tpl.host, "example.com");

        // custom env entry precedes the fixed VE_* variables
        assert_eq!(tpl.env[0].name, "CUSTOM_VAR");
        let names: Vec<&str> = tpl.env.iter().map(|e| e.name.as_str()).collect();
        for fixed in [
            "VE_API_ROOT_URL",
            "VE_API2_ROOT_URL",
            "VE_SERVER_API_KEY",
            "VE_SERVER_API_EMAIL",
            "VE_SERVER_API_PASSWORD",
            "VE_SERVER_ID",
            "VE_SERVER_NAME",
            "VE_SERVER_HOST",
            "VE_SERVER_MAX_PLAYERS",
            "VE_SERVER_SPACE_ID",
            "VE_SERVER_APP_ID",
            "VE_SERVER_RELEASE_ID",
        ] {
            assert!(names.contains(&fixed), "missing {fixed}");
        }
    }

    #[test]
    fn max_players_zero_renders_as_decimal_zero() {
        let mut spec = well_formed_spec(&Uuid::new_v4().to_string());
        spec["settings"]["players"]["max"] = json!(0);
        let tpl = extract(&spec).unwrap();
        let max_players = tpl
            .env
            .iter()
            .find(|e| e.name == "VE_SERVER_MAX_PLAYERS")
            .unwrap();
        assert_eq!(max_players.value, "0");
    }

    #[test]
    fn empty_env_and_empty_pull_secrets_are_accepted() {
        let mut spec = well_formed_spec(&Uuid::new_v4().to_string());
        spec["env"] = json!([]);
        spec["settings"]["server"]["imagePullSecrets"] = json!([]);
        let tpl = extract(&spec).unwrap();
        assert!(tpl.image_pull_secrets.is_empty());
    }

    #[test]
    fn string_typed_players_max_is_malformed() {
        let mut spec = well_formed_spec(&Uuid::new_v4().to_string());
        spec["settings"]["players"]["max"] = json!("5");
        let err = extract(&spec).unwrap_err();
        assert!(matches!(err, Error::Malformed { path, .. } if path == "settings.players.max"));
    }

    #[test]
    fn missing_field_is_malformed_with_path() {
        let mut spec = well_formed_spec(&Uuid::new_v4().to_string());
        spec["settings"]["server"].as_object_mut().unwrap().remove("host");
        let err = extract(&spec).unwrap_err();
        assert!(matches!(err, Error::Malformed { path, .. } if path == "settings.server.host"));
    }

    #[test]
    fn invalid_id_is_malformed() {
        let mut spec = well_formed_spec("not-a-uuid");
        spec["id"] = json!("not-a-uuid");
        let err = extract(&spec).unwrap_err();
        assert!(matches!(err, Error::Malformed { path, .. } if path == "id"));
    }
}

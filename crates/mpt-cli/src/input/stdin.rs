use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a piped JSON or YAML document from stdin.
///
/// Returns `None` when stdin is a terminal or the pipe is empty. JSON is
/// tried first; anything that fails to parse as JSON is read as YAML.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_document(&buffer)
}

fn parse_document<T: DeserializeOwned>(text: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => serde_yaml::from_str(trimmed)
            .map(Some)
            .map_err(|yaml_err| {
                format!("stdin is neither JSON ({}) nor YAML ({})", json_err, yaml_err).into()
            }),
    }
}

use anyhow::{anyhow, Context, Result};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{to_string, to_value, Map, Value};
use std::{
    fs,
    io::{Read, Write},
};

pub fn dejsonify<'a, T>(json_str: &'a str) -> serde_json::Result<T>
where
    T: Deserialize<'a>,
{
    serde_json::from_str::<T>(json_str)
}

/// Serializes `obj` with object keys sorted, so equal values always produce equal strings.
pub fn jsonify<T>(obj: &T) -> Result<String>
where
    T: Serialize,
{
    let value = to_value(obj)?;
    Ok(to_string(&jsonify_internal(&value))?)
}

pub fn jsonify_internal(json_value: &Value) -> Value {
    match json_value {
        Value::Object(obj) => {
            let mut sorted_map = Map::new();
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = obj.get(key) {
                    sorted_map.insert(key.clone(), jsonify_internal(value));
                }
            }
            Value::Object(sorted_map)
        }
        Value::Array(items) => Value::Array(items.iter().map(jsonify_internal).collect()),
        _ => json_value.clone(),
    }
}

/// Reads a JSON argument given on the command line.
///
/// `-` reads stdin, anything ending in `.json` is read as a file path and
/// everything else is parsed as an inline JSON string.
pub fn read_json_arg<T>(arg: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let json = if arg == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read json from stdin")?;
        buffer
    } else if arg.ends_with(".json") {
        fs::read_to_string(arg).with_context(|| format!("failed to read json file: {}", arg))?
    } else {
        arg.to_string()
    };
    serde_json::from_str::<T>(&json).map_err(|e| anyhow!("failed to parse json ({}): {}", arg, e))
}

pub fn decompress_obj<T>(input: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut decoder = ZlibDecoder::new(input);
    let mut decompressed = String::new();
    decoder.read_to_string(&mut decompressed)?;
    Ok(serde_json::from_str(&decompressed)?)
}

pub fn compress_obj<T>(input: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(jsonify(input)?.as_bytes())?;
    Ok(encoder.finish()?)
}

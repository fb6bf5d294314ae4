//! Pipe-wrapper and `application/x-www-form-urlencoded` query-string
//! parsing for incoming pixel log lines.

use percent_encoding::percent_decode_str;

use crate::error::LogJoinError;

/// Split `"<customer>|<unix_seconds>|<query_string>"` into its three
/// fields. Exactly the first two `|` bytes are treated as separators —
/// the query-string body may itself contain `|`.
pub(crate) fn parse_pipe_wrapper(raw_line: &str) -> Result<(String, u64, String), LogJoinError> {
    let mut parts = raw_line.splitn(3, '|');
    let customer = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LogJoinError::Parse("missing customer key".into()))?;
    let time_field = parts
        .next()
        .ok_or_else(|| LogJoinError::Parse("missing unix-seconds field".into()))?;
    let body = parts
        .next()
        .ok_or_else(|| LogJoinError::Parse("missing query-string body".into()))?;
    let time_s: u64 = time_field
        .parse()
        .map_err(|_| LogJoinError::Parse(format!("invalid unix-seconds field {time_field:?}")))?;
    Ok((customer.to_string(), time_s, body.to_string()))
}

/// Decode a `application/x-www-form-urlencoded` query string into ordered
/// key/value pairs. A component that fails UTF-8 decoding after
/// percent-decoding is a structural failure, not a lossily-replaced value.
pub(crate) fn parse_query_string(body: &str) -> Result<Vec<(String, String)>, LogJoinError> {
    let mut pairs = Vec::new();
    if body.is_empty() {
        return Ok(pairs);
    }
    for pair in body.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut kv = pair.splitn(2, '=');
        let raw_key = kv.next().unwrap_or("");
        let raw_value = kv.next().unwrap_or("");
        pairs.push((decode_component(raw_key)?, decode_component(raw_value)?));
    }
    Ok(pairs)
}

fn decode_component(raw: &str) -> Result<String, LogJoinError> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded).decode_utf8().map(|cow| cow.into_owned()).map_err(|_| {
        LogJoinError::Parse("query component is not valid utf-8 after percent-decoding".into())
    })
}

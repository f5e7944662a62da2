//! Text protocol encoding and reply parsing.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::{Item, ProtocolError, MAX_VALUE_LENGTH};

const CRLF: &[u8] = b"\r\n";

pub(crate) fn encode_get(keys: &[String]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + keys.iter().map(|k| k.len() + 1).sum::<usize>() + 2);
    buf.extend_from_slice(b"get");
    for key in keys {
        buf.push(b' ');
        buf.extend_from_slice(key.as_bytes());
    }
    buf.extend_from_slice(CRLF);
    buf
}

pub(crate) fn encode_set(item: &Item) -> Vec<u8> {
    let header = format!(
        "set {} {} {} {}\r\n",
        item.key,
        item.flags,
        item.expiration,
        item.value.len()
    );
    let mut buf = Vec::with_capacity(header.len() + item.value.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(&item.value);
    buf.extend_from_slice(CRLF);
    buf
}

/// Reads one reply line without its line terminator.
async fn read_line<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed mid-reply",
        )
        .into());
    }
    if !line.ends_with("\r\n") {
        return Err(ProtocolError::UnexpectedResponse(line));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

/// Maps the error replies every command can receive.
fn error_reply(line: &str) -> Option<ProtocolError> {
    if line == "ERROR" {
        Some(ProtocolError::UnknownCommand)
    } else if let Some(msg) = line.strip_prefix("SERVER_ERROR ") {
        Some(ProtocolError::Server(msg.to_string()))
    } else if let Some(msg) = line.strip_prefix("CLIENT_ERROR ") {
        Some(ProtocolError::Client(msg.to_string()))
    } else {
        None
    }
}

/// Parses `VALUE <key> <flags> <bytes> [<cas>]`.
fn parse_value_header(line: &str) -> Option<(String, u32, usize)> {
    let mut parts = line.split(' ');
    if parts.next()? != "VALUE" {
        return None;
    }
    let key = parts.next()?.to_string();
    let flags = parts.next()?.parse().ok()?;
    let len = parts.next()?.parse().ok()?;
    // Optional CAS unique, then nothing
    if let Some(cas) = parts.next() {
        cas.parse::<u64>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some((key, flags, len))
}

/// Reads `VALUE` blocks up to `END`.
pub(crate) async fn read_values<R>(reader: &mut R) -> Result<HashMap<String, Item>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut items = HashMap::new();
    loop {
        let line = read_line(reader).await?;
        if line == "END" {
            return Ok(items);
        }
        if let Some(err) = error_reply(&line) {
            return Err(err);
        }

        let (key, flags, len) =
            parse_value_header(&line).ok_or_else(|| ProtocolError::UnexpectedResponse(line.clone()))?;

        if len > MAX_VALUE_LENGTH {
            return Err(ProtocolError::UnexpectedResponse(format!(
                "value for {key:?} is {len} bytes, limit is {MAX_VALUE_LENGTH}"
            )));
        }
        let mut data = vec![0u8; len + CRLF.len()];
        reader.read_exact(&mut data).await?;
        if !data.ends_with(CRLF) {
            return Err(ProtocolError::UnexpectedResponse(format!(
                "value for {key:?} not terminated by CRLF"
            )));
        }
        data.truncate(len);

        items.insert(
            key.clone(),
            Item {
                key,
                value: data,
                flags,
                expiration: 0,
            },
        );
    }
}

/// Reads the single-line reply to a storage command.
pub(crate) async fn read_store_reply<R>(reader: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    match line.as_str() {
        "STORED" => Ok(()),
        "NOT_STORED" => Err(ProtocolError::NotStored),
        _ => Err(error_reply(&line).unwrap_or(ProtocolError::UnexpectedResponse(line))),
    }
}

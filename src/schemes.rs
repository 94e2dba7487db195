//! Scheme classification and the local (non-network) handlers.
//!
//! A raw URL is classified exactly once into one of the scheme handlers;
//! `file:` and `data:` are resolved synchronously here, `http:`/`https:` are
//! handed to the redirect controller. A `view-source:` prefix is stripped
//! before classification and reported back as a presentation flag.

use crate::errors::FetchError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::fs;
use url::Url;

const VIEW_SOURCE_PREFIX: &str = "view-source:";
const DATA_PREFIX: &str = "data:";

/// Splits off a leading `view-source:` wrapper. The flag is passed through to
/// the caller untouched; the remainder is dispatched by its own scheme.
#[must_use]
pub fn strip_view_source(raw: &str) -> (&str, bool) {
    match raw.strip_prefix(VIEW_SOURCE_PREFIX) {
        Some(rest) => (rest, true),
        None => (raw, false),
    }
}

/// The four scheme handlers, selected by a single classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeHandler {
    /// Local file read; errors are recovered into a synthesized body.
    File,
    /// Inline `data:` payload decode.
    Data,
    /// Network fetch through the redirect controller (http and https).
    Network,
}

impl SchemeHandler {
    /// Classifies a URL by the scheme before the first `:`.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` when there is no scheme separator at all,
    /// `UnsupportedScheme` for schemes the engine does not handle.
    pub fn classify(raw: &str) -> Result<Self, FetchError> {
        let Some((scheme, _)) = raw.split_once(':') else {
            return Err(FetchError::InvalidUrl(format!("no scheme in {raw:?}")));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "file" => Ok(SchemeHandler::File),
            "data" => Ok(SchemeHandler::Data),
            "http" | "https" => Ok(SchemeHandler::Network),
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Reads a `file:///absolute/path` URL.
///
/// Read failures never fail the fetch: a missing file, a permission error or
/// an unusable path all produce a synthesized minimal error body instead.
#[must_use]
pub fn read_file_url(raw: &str) -> Vec<u8> {
    let read = Url::parse(raw)
        .map_err(|err| err.to_string())
        .and_then(|url| {
            url.to_file_path()
                .map_err(|()| format!("not a local file path: {raw}"))
        })
        .and_then(|path| fs::read(&path).map_err(|err| format!("{}: {err}", path.display())));

    match read {
        Ok(bytes) => bytes,
        Err(reason) => {
            tracing::warn!(%reason, "file read failed, serving synthesized error body");
            file_error_body(&reason)
        }
    }
}

fn file_error_body(reason: &str) -> Vec<u8> {
    format!("<html><body><h1>File error</h1><p>{reason}</p></body></html>").into_bytes()
}

/// Decodes a `data:[mediatype][;base64],payload` URL.
///
/// A missing `,` yields an empty body. With `;base64` the payload is
/// base64-decoded; otherwise it is percent-decoded and interpreted as UTF-8.
/// The mediatype (default `text/plain`) is informational only.
///
/// # Errors
///
/// `InvalidUrl` when a `;base64` payload fails to decode.
pub fn decode_data_url(raw: &str) -> Result<Vec<u8>, FetchError> {
    let rest = raw.strip_prefix(DATA_PREFIX).unwrap_or(raw);

    let Some((meta, payload)) = rest.split_once(',') else {
        return Ok(Vec::new());
    };

    let is_base64 = meta.contains(";base64");
    let meta = meta.replace(";base64", "");
    let mediatype = if meta.is_empty() { "text/plain" } else { &meta };
    tracing::debug!(mediatype, base64 = is_base64, "decoding data url");

    if is_base64 {
        BASE64
            .decode(payload)
            .map_err(|err| FetchError::InvalidUrl(format!("bad base64 payload: {err}")))
    } else {
        Ok(percent_decode_str(payload)
            .decode_utf8_lossy()
            .into_owned()
            .into_bytes())
    }
}

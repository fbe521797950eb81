//! API utility functions
//!
//! Pure, stateless helpers for request parsing and response headers.

use crate::api::error::ApiError;

/// Name of the generated Windows script
pub const BAT_FILENAME: &str = "download.bat";

/// Parses and validates Content-Type header for application/json
///
/// Accepts `application/json` with or without parameters. Rejects
/// `application/jsonp`, `text/json`, `application/json-patch+json` and
/// malformed media types.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// `Content-Disposition` value for a file attachment
///
/// Quotes, backslashes and control characters would break the quoted-string,
/// so they are replaced with `_`.
pub fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// Windows batch script that runs yt-dlp locally for `url`
///
/// The URL is trimmed. Characters that would end the quoted argument or
/// split the line are dropped and `%` is doubled so cmd.exe does not expand
/// it as a variable.
pub fn render_bat_script(url: &str) -> String {
    let url: String = url
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();
    let url = url.replace('%', "%%");

    format!(
        "@echo off\r\nyt-dlp -f bestvideo+bestaudio --merge-output-format mp4 \"{url}\"\r\npause\r\n"
    )
}

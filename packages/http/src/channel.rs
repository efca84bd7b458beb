//! Read-only seekable byte channel over a remote HTTP/S resource.

use std::io::{self, BufReader, Read};

use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header;
use url::Url;

use httpfs_core::error::{HttpFsError, Result};
use httpfs_core::settings::HttpSettings;

use crate::client::{build_client, transport};
use crate::retry::{Attempt, RetryHandler};

/// Forward seek distance within which the channel consumes bytes from the
/// current stream instead of opening a new connection.
const SKIP_DISTANCE: u64 = 8 * 1024;

/// A seekable, read-only byte channel backed by ranged HTTP GET requests.
///
/// The channel keeps one live response stream and converts seeks either into
/// stream skips (short forward seeks) or into a fresh ranged request. Every
/// network call runs through the channel's retry handler. Exclusive `&mut
/// self` receivers serialize all operations on the channel.
#[derive(Debug)]
pub struct HttpSeekableByteChannel {
    uri: Url,
    client: Client,
    retry: RetryHandler,
    stream: Option<BufReader<Response>>,
    position: u64,
    size: Option<u64>,
    open: bool,
}

impl HttpSeekableByteChannel {
    /// Opens a channel at the beginning of the resource with default
    /// settings.
    pub fn new(uri: Url) -> Result<Self> {
        Self::with_settings(uri, &HttpSettings::default(), 0)
    }

    /// Opens a channel at `position` with default settings.
    pub fn new_at(uri: Url, position: u64) -> Result<Self> {
        Self::with_settings(uri, &HttpSettings::default(), position)
    }

    /// Opens a channel reading `uri` from `position`, configured by
    /// `settings`. The URI should not carry range parameters itself.
    pub fn with_settings(uri: Url, settings: &HttpSettings, position: u64) -> Result<Self> {
        let client = build_client(settings)?;
        let retry = RetryHandler::new(settings.retry.clone(), uri.clone());
        let stream = retry.run_with_retries(|| open_stream(&client, &uri, position))?;
        Ok(Self {
            uri,
            client,
            retry,
            stream: Some(stream),
            position,
            size: None,
            open: true,
        })
    }

    /// The URI this channel reads from.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Reads into `dst`, advancing the channel position by the number of
    /// bytes read. Returns `Ok(0)` at end of stream, which leaves the
    /// position unchanged.
    ///
    /// A failed read leaves the underlying stream in an indeterminate
    /// state, so retries reopen the connection at the current position
    /// before reading again. `dst` is only observed through the returned
    /// count, so a failure never moves the caller's cursor.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.assert_open()?;
        let Self {
            uri,
            client,
            retry,
            stream,
            position,
            ..
        } = self;
        let read = retry.try_once_then_with_retries(|attempt| {
            if attempt == Attempt::Retry {
                *stream = None;
                *stream = Some(open_stream(client, uri, *position)?);
            }
            read_stream(stream, dst)
        })?;
        self.position += read as u64;
        Ok(read)
    }

    /// Writing is not supported; the channel is read-only.
    pub fn write(&mut self, _src: &[u8]) -> Result<usize> {
        Err(HttpFsError::NonWritableChannel)
    }

    /// Truncation is not supported; the channel is read-only.
    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        Err(HttpFsError::NonWritableChannel)
    }

    /// The current byte offset into the resource.
    pub fn position(&self) -> Result<u64> {
        self.assert_open()?;
        Ok(self.position)
    }

    /// Moves the channel to `new_position`.
    ///
    /// A short forward seek (less than the skip window) drains bytes from
    /// the live stream; a backward or long forward seek closes the stream
    /// and reopens it with a ranged request at the target offset.
    pub fn set_position(&mut self, new_position: u64) -> Result<&mut Self> {
        self.assert_open()?;
        if self.position == new_position {
            return Ok(self);
        }
        let Self {
            uri,
            client,
            retry,
            stream,
            position,
            ..
        } = self;
        if *position < new_position && new_position - *position < SKIP_DISTANCE {
            let bytes_to_skip = new_position - *position;
            retry.try_once_then_with_retries(|attempt| match attempt {
                Attempt::First => {
                    skip_exact(stream, bytes_to_skip)?;
                    debug!(
                        "skipped {} bytes when setting position to {} (previously on {})",
                        bytes_to_skip, new_position, position
                    );
                    Ok(())
                }
                Attempt::Retry => {
                    *stream = None;
                    *stream = Some(open_stream(client, uri, new_position)?);
                    Ok(())
                }
            })?;
        } else {
            *stream = None;
            let reopened = retry.run_with_retries(|| open_stream(client, uri, new_position))?;
            *stream = Some(reopened);
        }
        self.position = new_position;
        Ok(self)
    }

    /// The total size of the resource, taken from the `Content-Length` of a
    /// HEAD request on first call and cached afterwards.
    pub fn size(&mut self) -> Result<u64> {
        self.assert_open()?;
        if let Some(size) = self.size {
            return Ok(size);
        }
        let Self {
            uri,
            client,
            retry,
            ..
        } = self;
        let size = retry.run_with_retries(|| {
            let response = client
                .head(uri.clone())
                .send()
                .map_err(|e| transport(format!("failed HEAD request for {uri}"), e))?;
            check_response(response.status().as_u16(), false, uri)?;
            content_length(&response, uri)
        })?;
        self.size = Some(size);
        Ok(size)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Closes the channel and the underlying stream. Closing is idempotent;
    /// every subsequent operation fails with a closed-channel error.
    pub fn close(&mut self) {
        self.stream = None;
        self.open = false;
    }

    fn assert_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(HttpFsError::ClosedChannel)
        }
    }
}

impl Read for HttpSeekableByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        HttpSeekableByteChannel::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for HttpSeekableByteChannel {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => offset,
            io::SeekFrom::Current(delta) => offset_from(self.position()?, delta)?,
            io::SeekFrom::End(delta) => offset_from(self.size()?, delta)?,
        };
        self.set_position(target)?;
        Ok(target)
    }
}

fn offset_from(base: u64, delta: i64) -> io::Result<u64> {
    base.checked_add_signed(delta).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot seek to a negative position (from {base}, delta {delta})"),
        )
    })
}

/// Sends a GET for `uri`, ranged when `position` is non-zero, validates the
/// response code and returns the buffered body stream.
fn open_stream(client: &Client, uri: &Url, position: u64) -> Result<BufReader<Response>> {
    let is_range_request = position != 0;
    let mut request = client.get(uri.clone());
    if is_range_request {
        request = request.header(header::RANGE, format!("bytes={position}-"));
    }
    let response = request
        .send()
        .map_err(|e| transport(format!("failed to connect to {uri} at position {position}"), e))?;
    check_response(response.status().as_u16(), is_range_request, uri)?;
    Ok(BufReader::new(response))
}

fn read_stream(stream: &mut Option<BufReader<Response>>, dst: &mut [u8]) -> Result<usize> {
    let stream = stream.as_mut().ok_or(HttpFsError::ClosedChannel)?;
    Ok(stream.read(dst)?)
}

/// Drains exactly `n` bytes from the live stream. A stream that ends early
/// fails with an unexpected-EOF error, which the default settings classify
/// as retryable.
fn skip_exact(stream: &mut Option<BufReader<Response>>, n: u64) -> Result<()> {
    let stream = stream.as_mut().ok_or(HttpFsError::ClosedChannel)?;
    let skipped = io::copy(&mut stream.by_ref().take(n), &mut io::sink())?;
    if skipped != n {
        return Err(HttpFsError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended after skipping {skipped} of {n} bytes"),
        )));
    }
    Ok(())
}

/// Validates a response code against the request shape.
///
/// | code | plain request | range request |
/// |------|---------------|---------------|
/// | 200  | ok            | range mismatch |
/// | 206  | range mismatch | ok           |
/// | 404  | not found     | not found     |
/// | else | unexpected    | unexpected    |
fn check_response(code: u16, is_range_request: bool, uri: &Url) -> Result<()> {
    match code {
        200 if is_range_request => Err(HttpFsError::IncompatibleRangeResponse {
            code,
            message: format!("server returned the entire file instead of a subrange for {uri}"),
        }),
        206 if !is_range_request => Err(HttpFsError::IncompatibleRangeResponse {
            code,
            message: format!(
                "unexpected partial content response for a whole-file request to {uri}"
            ),
        }),
        200 | 206 => Ok(()),
        404 => Err(HttpFsError::FileNotFound(uri.to_string())),
        _ => Err(HttpFsError::UnexpectedStatus {
            code,
            message: format!("unexpected http response code {code} when requesting {uri}"),
        }),
    }
}

/// Reads the size from the `Content-Length` header, which must carry
/// exactly one parseable value.
fn content_length(response: &Response, uri: &Url) -> Result<u64> {
    let values: Vec<_> = response
        .headers()
        .get_all(header::CONTENT_LENGTH)
        .iter()
        .collect();
    if values.len() != 1 {
        return Err(HttpFsError::Io(io::Error::other(format!(
            "failed to get the size of the file at {uri}: expected one content-length value, found {}",
            values.len()
        ))));
    }
    values[0]
        .to_str()
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or_else(|| {
            HttpFsError::Io(io::Error::other(format!(
                "failed to get the size of the file at {uri}: unparseable content-length {:?}",
                values[0]
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_code_table() {
        let uri = Url::parse("http://example.com/file").unwrap();
        assert!(check_response(200, false, &uri).is_ok());
        assert!(check_response(206, true, &uri).is_ok());

        let err = check_response(200, true, &uri).unwrap_err();
        assert!(matches!(
            err,
            HttpFsError::IncompatibleRangeResponse { code: 200, .. }
        ));

        let err = check_response(206, false, &uri).unwrap_err();
        assert!(matches!(
            err,
            HttpFsError::IncompatibleRangeResponse { code: 206, .. }
        ));

        assert!(matches!(
            check_response(404, false, &uri).unwrap_err(),
            HttpFsError::FileNotFound(_)
        ));
        assert!(matches!(
            check_response(503, true, &uri).unwrap_err(),
            HttpFsError::UnexpectedStatus { code: 503, .. }
        ));
    }

    #[test]
    fn seek_offsets_reject_negative_targets() {
        assert_eq!(offset_from(100, -40).unwrap(), 60);
        assert_eq!(offset_from(100, 40).unwrap(), 140);
        assert!(offset_from(10, -11).is_err());
    }
}

use std::borrow::Cow;

use nom::{
    bytes::complete::{tag, take, take_while, take_while1},
    character::complete::{char, hex_digit1, space0, space1},
    error::{Error, ErrorKind},
    sequence::{terminated, tuple},
    IResult,
};
use spanlift_types::CapturedExchange;

/// HTTP/1.x request parsed out of a captured buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    /// HTTP method (e.g. `GET`, `POST`).
    pub method: &'a str,
    /// Request target, path plus optional query (e.g. `/idx/_search?size=1`).
    pub target: &'a str,
    /// Value of `Content-Length`, if present and numeric.
    pub content_length: Option<usize>,
    /// `Transfer-Encoding` ends in `chunked`.
    pub chunked: bool,
    /// Body as the client sent it: cut to `Content-Length`, or reassembled
    /// from chunks. `None` when the capture ended inside the headers.
    pub body: Option<Cow<'a, [u8]>>,
    truncated: bool,
}

impl<'a> HttpRequest<'a> {
    /// View this request as a [`CapturedExchange`].
    pub fn exchange(&self) -> CapturedExchange<'_> {
        let body = self.body.as_deref().unwrap_or_default();
        CapturedExchange::from_target(self.method, self.target, body)
    }

    /// True when the capture stopped before the end of the body: short of
    /// `Content-Length`, before the last chunk, or inside the headers.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Quick check: does this look like the start of an HTTP request?
pub fn looks_like_http_request(data: &[u8]) -> bool {
    const METHODS: &[&[u8]] = &[
        b"GET ",
        b"POST ",
        b"PUT ",
        b"DELETE ",
        b"PATCH ",
        b"HEAD ",
        b"OPTIONS ",
    ];
    METHODS.iter().any(|m| data.starts_with(m))
}

fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&c)
}

fn parse_request_line(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, method) = take_while1(|c: u8| c.is_ascii_uppercase())(input)?;
    let (input, _) = space1(input)?;
    let (input, target) = take_while1(|c: u8| c != b' ' && c != b'\r' && c != b'\n')(input)?;
    let (input, _) = space1(input)?;
    let (input, _version) = take_while1(|c: u8| c != b'\r' && c != b'\n')(input)?;
    let (input, _) = tag(b"\r\n")(input)?;
    Ok((input, (method, target)))
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, name) = take_while1(is_token_char)(input)?;
    let (input, _) = tuple((char(':'), space0))(input)?;
    let (input, value) = take_while(|c: u8| c != b'\r' && c != b'\n')(input)?;
    let (input, _) = tag(b"\r\n")(input)?;
    Ok((input, (name, value)))
}

/// Framing headers; everything else is skipped.
#[derive(Debug, Default)]
struct Framing {
    content_length: Option<usize>,
    chunked: bool,
}

/// Walks the header block. Returns the framing and the bytes after it, or
/// `None` if the terminating blank line was never reached.
fn parse_headers(mut input: &[u8]) -> (Framing, Option<&[u8]>) {
    let mut framing = Framing::default();

    loop {
        if let Some(body) = input.strip_prefix(b"\r\n") {
            return (framing, Some(body));
        }
        match parse_header(input) {
            Ok((rest, (name, value))) => {
                let value = std::str::from_utf8(value).ok().map(str::trim);
                if name.eq_ignore_ascii_case(b"content-length") {
                    framing.content_length = value.and_then(|v| v.parse().ok());
                } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
                    // Only the last coding decides the framing.
                    framing.chunked = value
                        .and_then(|v| v.rsplit(',').next())
                        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
                }
                input = rest;
            }
            // Truncated or malformed header
            Err(_) => return (framing, None),
        }
    }
}

/// Chunk size line: hex digits, optional `;extensions`, CRLF.
fn chunk_size(input: &[u8]) -> IResult<&[u8], usize> {
    let (rest, digits) = hex_digit1(input)?;
    let (rest, _extensions) = take_while(|c: u8| c != b'\r' && c != b'\n')(rest)?;
    let (rest, _) = tag(b"\r\n")(rest)?;
    let size = std::str::from_utf8(digits)
        .ok()
        .and_then(|d| usize::from_str_radix(d, 16).ok())
        .ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::HexDigit)))?;
    Ok((rest, size))
}

/// One non-final chunk's data, with its trailing CRLF consumed.
fn chunk(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, size) = chunk_size(input)?;
    terminated(take(size), tag(b"\r\n"))(input)
}

/// Reassemble a chunked body. Returns the data and whether the zero-size
/// last chunk was reached. A capture cut inside a chunk keeps the part of
/// that chunk it has.
fn dechunk(mut input: &[u8]) -> (Vec<u8>, bool) {
    let mut body = Vec::new();
    loop {
        let Ok((rest, size)) = chunk_size(input) else {
            return (body, false);
        };
        if size == 0 {
            // Trailers, if any, are not part of the body.
            return (body, true);
        }
        match chunk(input) {
            Ok((next, data)) => {
                body.extend_from_slice(data);
                input = next;
            }
            Err(_) => {
                body.extend_from_slice(&rest[..size.min(rest.len())]);
                return (body, false);
            }
        }
    }
}

/// Try to parse an HTTP/1.x request from raw bytes.
///
/// Returns `None` when the request line itself is missing or not UTF-8.
/// A capture that stops inside the headers still yields a request with no
/// body. `Transfer-Encoding: chunked` takes precedence over
/// `Content-Length`, as in RFC 9112.
pub fn parse_request(data: &[u8]) -> Option<HttpRequest<'_>> {
    let (rest, (method, target)) = parse_request_line(data).ok()?;
    let (framing, raw_body) = parse_headers(rest);

    let (body, truncated) = match raw_body {
        None => (None, true),
        Some(raw) if framing.chunked => {
            let (decoded, complete) = dechunk(raw);
            (Some(Cow::Owned(decoded)), !complete)
        }
        // Anything past Content-Length belongs to the next pipelined request.
        Some(raw) => match framing.content_length {
            Some(len) if len <= raw.len() => (Some(Cow::Borrowed(&raw[..len])), false),
            Some(_) => (Some(Cow::Borrowed(raw)), true),
            None => (Some(Cow::Borrowed(raw)), false),
        },
    };

    Some(HttpRequest {
        method: std::str::from_utf8(method).ok()?,
        target: std::str::from_utf8(target).ok()?,
        content_length: framing.content_length,
        chunked: framing.chunked,
        body,
        truncated,
    })
}

//! GraphQL over HTTP.
//!
//! A single endpoint (conventionally `/graphql`) serves every operation, so
//! the interesting facts live in the request itself:
//!
//! ```json
//! {
//!   "query": "mutation AddUser($n: String) { addUser(name: $n) { id } }",
//!   "operationName": "AddUser",
//!   "variables": {"n": "ada"}
//! }
//! ```
//!
//! `POST` carries that JSON object as the body; `GET` carries `query` and
//! `operationName` as URL parameters. The operation type comes from the
//! document's leading keyword (`query` when the `{ ... }` shorthand is used)
//! and is combined with the operation name when one is known, e.g.
//! `"mutation AddUser"`. GraphQL has no collection.

use serde_json::{Map, Value};
use spanlift_types::{CapturedExchange, ExtractionResult, Protocol};

use crate::error::ExtractError;
use crate::json;

/// GraphQL operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top-level operation definition found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition<'a> {
    pub kind: OperationKind,
    pub name: Option<&'a str>,
}

/// Recognition rule: a `graphql` endpoint hit with `POST`, or with `GET` and a
/// `query` URL parameter.
pub fn matches(exchange: &CapturedExchange<'_>) -> bool {
    if !is_graphql_endpoint(exchange) {
        return false;
    }
    if exchange.method_is("POST") {
        return true;
    }
    exchange.method_is("GET")
        && url::form_urlencoded::parse(exchange.query.as_bytes()).any(|(k, _)| k == "query")
}

fn is_graphql_endpoint(exchange: &CapturedExchange<'_>) -> bool {
    exchange
        .path_segments()
        .next_back()
        .is_some_and(|last| last.eq_ignore_ascii_case("graphql"))
}

/// Extract the operation name and canonical request payload.
///
/// Expects an exchange [`matches`] accepted; the dispatcher only calls it
/// for those. `GET` is read from the URL parameters, anything else from the
/// body.
pub fn parse(exchange: &CapturedExchange<'_>) -> Result<ExtractionResult, ExtractError> {
    if exchange.method_is("GET") {
        return parse_get(exchange.query);
    }
    if !exchange.has_body() {
        return Ok(ExtractionResult::default());
    }

    let value = json::parse(exchange.body).map_err(malformed)?;
    let Value::Object(request) = &value else {
        return Err(malformed("expected a JSON object"));
    };
    let document = match request.get("query") {
        Some(Value::String(q)) => q.as_str(),
        Some(_) => return Err(malformed("`query` is not a string")),
        None => return Err(malformed("missing `query` field")),
    };
    let operation_name = match request.get("operationName") {
        Some(Value::String(name)) => Some(name.as_str()),
        _ => None,
    };

    build_result(document, operation_name, &value)
}

fn parse_get(query_string: &str) -> Result<ExtractionResult, ExtractError> {
    let mut document = None;
    let mut operation_name = None;
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        match key.as_ref() {
            "query" if document.is_none() => document = Some(value.into_owned()),
            "operationName" if operation_name.is_none() => {
                operation_name = Some(value.into_owned())
            }
            _ => {}
        }
    }
    let Some(document) = document else {
        return Ok(ExtractionResult::default());
    };

    let mut request = Map::new();
    request.insert("query".to_string(), Value::String(document.clone()));
    if let Some(name) = &operation_name {
        request.insert("operationName".to_string(), Value::String(name.clone()));
    }

    build_result(&document, operation_name.as_deref(), &Value::Object(request))
}

fn build_result(
    document: &str,
    operation_name: Option<&str>,
    request: &Value,
) -> Result<ExtractionResult, ExtractError> {
    if document.trim().is_empty() {
        return Err(malformed("empty `query` document"));
    }
    let operation_name = operation_name.filter(|n| !n.is_empty());
    let ops = operations(document);
    let selected = select_operation(&ops, operation_name);

    let kind = selected.map_or(OperationKind::Query, |op| op.kind);
    let name = operation_name.or_else(|| selected.and_then(|op| op.name));
    let db_operation_name = match name {
        Some(name) => format!("{kind} {name}"),
        None => kind.to_string(),
    };

    let db_query_text = serde_json::to_string(request).map_err(malformed)?;

    Ok(ExtractionResult {
        protocol: Some(Protocol::GraphQl),
        db_query_text,
        db_operation_name,
        db_collection_name: String::new(),
    })
}

fn malformed(reason: impl std::fmt::Display) -> ExtractError {
    ExtractError::malformed(Protocol::GraphQl, reason)
}

/// Pick the operation named `operation_name`, or the first one.
pub fn select_operation<'d, 'o>(
    ops: &'o [OperationDefinition<'d>],
    operation_name: Option<&str>,
) -> Option<&'o OperationDefinition<'d>> {
    operation_name
        .and_then(|wanted| ops.iter().find(|op| op.name == Some(wanted)))
        .or_else(|| ops.first())
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index just past the string literal opening at `start`. Unterminated
/// strings run to the end of the line (or of the input, for block strings).
fn skip_string(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i..].starts_with(b"\\\"\"\"") {
                i += 4;
            } else if bytes[i..].starts_with(b"\"\"\"") {
                return i + 3;
            } else {
                i += 1;
            }
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |off| start + off)
}

/// Scan a document for its top-level operation definitions, in order.
///
/// Only the tokens that shape the outline are looked at: keywords and names
/// at brace depth zero, braces, parentheses, and `@`. Strings, comments,
/// selection sets, and fragment definitions are skipped. Malformed or
/// truncated documents produce whatever prefix could be recognized.
pub fn operations(document: &str) -> Vec<OperationDefinition<'_>> {
    let bytes = document.as_bytes();
    let mut ops = Vec::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut pending: Option<OperationDefinition<'_>> = None;
    let mut name_allowed = false;
    let mut in_fragment = false;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'#' => {
                i = skip_comment(bytes, i);
                continue;
            }
            b'{' => {
                if depth == 0 && parens == 0 {
                    if in_fragment {
                        in_fragment = false;
                    } else {
                        ops.push(pending.take().unwrap_or(OperationDefinition {
                            kind: OperationKind::Query,
                            name: None,
                        }));
                    }
                    name_allowed = false;
                }
                depth += 1;
            }
            b'}' => depth = depth.saturating_sub(1),
            b'(' => {
                parens += 1;
                name_allowed = false;
            }
            b')' => parens = parens.saturating_sub(1),
            b'@' => name_allowed = false,
            b if is_name_start(b) => {
                let start = i;
                while i < bytes.len() && is_name_char(bytes[i]) {
                    i += 1;
                }
                if depth == 0 && parens == 0 {
                    let word = &document[start..i];
                    if pending.is_some() || in_fragment {
                        if name_allowed {
                            if let Some(op) = pending.as_mut() {
                                op.name = Some(word);
                            }
                            name_allowed = false;
                        }
                    } else if word == "fragment" {
                        in_fragment = true;
                    } else if let Some(kind) = OperationKind::from_keyword(word) {
                        pending = Some(OperationDefinition { kind, name: None });
                        name_allowed = true;
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    ops
}

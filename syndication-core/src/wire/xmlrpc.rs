//! XML-RPC values and the `methodCall` / `methodResponse` codec.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

pub type RpcStruct = BTreeMap<String, RpcValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Int(i64),
    Bool(bool),
    String(String),
    Double(f64),
    /// Raw `dateTime.iso8601` text, e.g. `20240101T10:00:00`.
    DateTime(String),
    Base64(Vec<u8>),
    Struct(RpcStruct),
    Array(Vec<RpcValue>),
    Nil,
}

impl RpcValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::String(s) | RpcValue::DateTime(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; numeric strings count, as WordPress returns ids as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RpcValue::Int(i) => Some(*i),
            RpcValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_struct(&self) -> Option<&RpcStruct> {
        match self {
            RpcValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RpcValue]> {
        match self {
            RpcValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.as_struct().and_then(|s| s.get(key))
    }

    /// Loose truthiness: false, 0, empty strings and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            RpcValue::Int(i) => *i != 0,
            RpcValue::Bool(b) => *b,
            RpcValue::String(s) => !s.is_empty() && s != "0",
            RpcValue::Double(d) => *d != 0.0,
            RpcValue::DateTime(s) => !s.is_empty(),
            RpcValue::Base64(b) => !b.is_empty(),
            RpcValue::Struct(s) => !s.is_empty(),
            RpcValue::Array(a) => !a.is_empty(),
            RpcValue::Nil => false,
        }
    }
}

impl From<&str> for RpcValue {
    fn from(s: &str) -> Self {
        RpcValue::String(s.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(s: String) -> Self {
        RpcValue::String(s)
    }
}

impl From<i64> for RpcValue {
    fn from(i: i64) -> Self {
        RpcValue::Int(i)
    }
}

impl From<bool> for RpcValue {
    fn from(b: bool) -> Self {
        RpcValue::Bool(b)
    }
}

impl From<Vec<RpcValue>> for RpcValue {
    fn from(items: Vec<RpcValue>) -> Self {
        RpcValue::Array(items)
    }
}

impl From<RpcStruct> for RpcValue {
    fn from(members: RpcStruct) -> Self {
        RpcValue::Struct(members)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcDecodeError {
    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },
    #[error("malformed XML-RPC response: {0}")]
    Malformed(String),
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_value(out: &mut String, value: &RpcValue) {
    out.push_str("<value>");
    match value {
        RpcValue::Int(i) => {
            let _ = write!(out, "<int>{i}</int>");
        }
        RpcValue::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        RpcValue::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s));
        }
        RpcValue::Double(d) => {
            let _ = write!(out, "<double>{d}</double>");
        }
        RpcValue::DateTime(s) => {
            let _ = write!(out, "<dateTime.iso8601>{}</dateTime.iso8601>", escape(s));
        }
        RpcValue::Base64(bytes) => {
            let _ = write!(out, "<base64>{}</base64>", STANDARD.encode(bytes));
        }
        RpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        RpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        RpcValue::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Encodes a `methodCall` document.
pub fn encode_call(method: &str, params: &[RpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    let _ = write!(out, "<methodName>{}</methodName><params>", escape(method));
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn elements<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, name: &str) -> Option<roxmltree::Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn text_of(node: roxmltree::Node) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn decode_value(value: roxmltree::Node) -> Result<RpcValue, RpcDecodeError> {
    let Some(typed) = elements(value).next() else {
        // An untyped <value> is a string.
        return Ok(RpcValue::String(text_of(value)));
    };
    let raw = text_of(typed);
    match typed.tag_name().name() {
        "int" | "i4" | "i8" => raw
            .trim()
            .parse()
            .map(RpcValue::Int)
            .map_err(|_| RpcDecodeError::Malformed(format!("invalid int '{raw}'"))),
        "boolean" => match raw.trim() {
            "1" | "true" => Ok(RpcValue::Bool(true)),
            "0" | "false" => Ok(RpcValue::Bool(false)),
            other => Err(RpcDecodeError::Malformed(format!("invalid boolean '{other}'"))),
        },
        "string" => Ok(RpcValue::String(raw)),
        "double" => raw
            .trim()
            .parse()
            .map(RpcValue::Double)
            .map_err(|_| RpcDecodeError::Malformed(format!("invalid double '{raw}'"))),
        "dateTime.iso8601" => Ok(RpcValue::DateTime(raw.trim().to_string())),
        "base64" => {
            let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map(RpcValue::Base64)
                .map_err(|e| RpcDecodeError::Malformed(format!("invalid base64: {e}")))
        }
        "struct" => {
            let mut members = RpcStruct::new();
            for member in elements(typed).filter(|n| n.tag_name().name() == "member") {
                let name = child(member, "name")
                    .map(text_of)
                    .ok_or_else(|| RpcDecodeError::Malformed("struct member without name".into()))?;
                let inner = child(member, "value")
                    .ok_or_else(|| RpcDecodeError::Malformed(format!("member '{name}' without value")))?;
                members.insert(name, decode_value(inner)?);
            }
            Ok(RpcValue::Struct(members))
        }
        "array" => {
            let Some(data) = child(typed, "data") else {
                return Ok(RpcValue::Array(Vec::new()));
            };
            elements(data)
                .filter(|n| n.tag_name().name() == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(RpcValue::Array)
        }
        "nil" => Ok(RpcValue::Nil),
        other => Err(RpcDecodeError::Malformed(format!("unknown value type '{other}'"))),
    }
}

/// Decodes a `methodResponse` document into its single return value.
pub fn decode_response(xml: &str) -> Result<RpcValue, RpcDecodeError> {
    let doc = roxmltree::Document::parse(xml.trim_start())
        .map_err(|e| RpcDecodeError::Malformed(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(RpcDecodeError::Malformed(format!(
            "expected methodResponse, got '{}'",
            root.tag_name().name()
        )));
    }

    if let Some(fault) = child(root, "fault") {
        let value = child(fault, "value")
            .ok_or_else(|| RpcDecodeError::Malformed("fault without value".into()))
            .and_then(decode_value)?;
        let code = value.get("faultCode").and_then(RpcValue::as_i64).unwrap_or(0);
        let message = value
            .get("faultString")
            .and_then(RpcValue::as_str)
            .unwrap_or("unknown fault")
            .to_string();
        return Err(RpcDecodeError::Fault { code, message });
    }

    let value = child(root, "params")
        .and_then(|params| child(params, "param"))
        .and_then(|param| child(param, "value"))
        .ok_or_else(|| RpcDecodeError::Malformed("response without params".into()))?;
    decode_value(value)
}

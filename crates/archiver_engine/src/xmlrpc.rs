//! XML-RPC request encoding and response decoding.
//!
//! Covers the standard XML-RPC value types plus the common `i8` and `nil`
//! extensions. Whitespace between structural elements is ignored; text inside
//! `<string>` and untyped `<value>` elements is preserved byte for byte.

use std::collections::BTreeMap;
use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;
use quick_xml::events::{BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    DateTime(String),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Nil => "nil",
        }
    }

    pub fn into_string(self) -> Result<String, RpcError> {
        match self {
            Value::String(text) => Ok(text),
            other => Err(RpcError::UnexpectedType {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn into_string_list(self) -> Result<Vec<String>, RpcError> {
        match self {
            Value::Array(items) => items.into_iter().map(Value::into_string).collect(),
            other => Err(RpcError::UnexpectedType {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, RpcError> {
        match self {
            Value::Base64(bytes) => Ok(bytes),
            other => Err(RpcError::UnexpectedType {
                expected: "base64",
                found: other.type_name(),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RpcError {
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("fault {code}: {message}")]
    Fault { code: i64, message: String },
    #[error("expected {expected}, got {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
}

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(v) if i32::try_from(*v).is_ok() => {
            let _ = write!(out, "<int>{v}</int>");
        }
        Value::Int(v) => {
            let _ = write!(out, "<i8>{v}</i8>");
        }
        Value::Bool(v) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*v));
        }
        Value::Double(v) => {
            let _ = write!(out, "<double>{v}</double>");
        }
        Value::String(v) => {
            let _ = write!(out, "<string>{}</string>", escape(v.as_str()));
        }
        Value::DateTime(v) => {
            let _ = write!(
                out,
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                escape(v.as_str())
            );
        }
        Value::Base64(v) => {
            let _ = write!(out, "<base64>{}</base64>", STANDARD.encode(v));
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Decodes a `<methodResponse>`. A `<fault>` becomes [`RpcError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, RpcError> {
    let mut parser = ResponseParser::new(xml);
    parser.expect_start("methodResponse")?;
    let value = match parser.next_tag()? {
        Tag::Start(name) if name == "params" => {
            parser.expect_start("param")?;
            let value = parser.expect_value()?;
            parser.expect_end("param")?;
            parser.expect_end("params")?;
            value
        }
        Tag::Start(name) if name == "fault" => {
            let fault = parser.expect_value()?;
            return Err(fault_from(fault));
        }
        other => {
            return Err(RpcError::Malformed(format!(
                "expected <params> or <fault>, found {other:?}"
            )))
        }
    };
    parser.expect_end("methodResponse")?;
    Ok(value)
}

fn fault_from(value: Value) -> RpcError {
    let Value::Struct(mut members) = value else {
        return RpcError::Malformed("fault is not a struct".to_string());
    };
    let code = match members.remove("faultCode") {
        Some(Value::Int(code)) => code,
        _ => return RpcError::Malformed("fault without integer faultCode".to_string()),
    };
    let message = match members.remove("faultString") {
        Some(Value::String(message)) => message,
        _ => String::new(),
    };
    RpcError::Fault { code, message }
}

#[derive(Debug, PartialEq, Eq)]
enum Tag {
    Start(String),
    End(String),
    Empty(String),
}

struct ResponseParser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> ResponseParser<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            reader: Reader::from_str(xml),
        }
    }

    fn next_event(&mut self) -> Result<Event<'a>, RpcError> {
        let event = self.reader.read_event();
        event.map_err(|err| {
            RpcError::Malformed(format!("at byte {}: {err}", self.reader.buffer_position()))
        })
    }

    /// Next structural tag, skipping whitespace, comments and declarations.
    fn next_tag(&mut self) -> Result<Tag, RpcError> {
        loop {
            match self.next_event()? {
                Event::Start(e) => return Ok(Tag::Start(tag_name(e.name()))),
                Event::End(e) => return Ok(Tag::End(tag_name(e.name()))),
                Event::Empty(e) => return Ok(Tag::Empty(tag_name(e.name()))),
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                Event::Text(_) | Event::CData(_) => {
                    return Err(RpcError::Malformed(
                        "unexpected text between elements".to_string(),
                    ))
                }
                Event::Eof => {
                    return Err(RpcError::Malformed("unexpected end of document".to_string()))
                }
                _ => continue,
            }
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next_tag()? {
            Tag::Start(found) if found == name => Ok(()),
            other => Err(RpcError::Malformed(format!(
                "expected <{name}>, found {other:?}"
            ))),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next_tag()? {
            Tag::End(found) if found == name => Ok(()),
            other => Err(RpcError::Malformed(format!(
                "expected </{name}>, found {other:?}"
            ))),
        }
    }

    fn expect_value(&mut self) -> Result<Value, RpcError> {
        match self.next_tag()? {
            Tag::Start(name) if name == "value" => self.value_body(),
            Tag::Empty(name) if name == "value" => Ok(Value::String(String::new())),
            other => Err(RpcError::Malformed(format!(
                "expected <value>, found {other:?}"
            ))),
        }
    }

    /// Parses what follows `<value>` up to and including `</value>`.
    fn value_body(&mut self) -> Result<Value, RpcError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&unescape_text(&t)?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::Start(e) => {
                    ensure_blank(&text)?;
                    let tag = tag_name(e.name());
                    let value = self.typed_value(&tag)?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                Event::Empty(e) => {
                    ensure_blank(&text)?;
                    let value = empty_typed_value(&tag_name(e.name()))?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                Event::End(e) => {
                    let name = tag_name(e.name());
                    if name == "value" {
                        return Ok(Value::String(text));
                    }
                    return Err(RpcError::Malformed(format!(
                        "unexpected </{name}> inside <value>"
                    )));
                }
                Event::Eof => {
                    return Err(RpcError::Malformed("unterminated <value>".to_string()))
                }
                _ => continue,
            }
        }
    }

    fn typed_value(&mut self, tag: &str) -> Result<Value, RpcError> {
        match tag {
            "string" => self.text_until(tag).map(Value::String),
            "int" | "i4" | "i8" => {
                let raw = self.text_until(tag)?;
                raw.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|err| RpcError::Malformed(format!("bad <{tag}> {raw:?}: {err}")))
            }
            "boolean" => match self.text_until(tag)?.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                other => Err(RpcError::Malformed(format!("bad <boolean> {other:?}"))),
            },
            "double" => {
                let raw = self.text_until(tag)?;
                raw.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|err| RpcError::Malformed(format!("bad <double> {raw:?}: {err}")))
            }
            "dateTime.iso8601" => self
                .text_until(tag)
                .map(|raw| Value::DateTime(raw.trim().to_string())),
            "base64" => {
                let raw = self.text_until(tag)?;
                let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map(Value::Base64)
                    .map_err(|err| RpcError::Malformed(format!("bad <base64>: {err}")))
            }
            "nil" => {
                self.expect_end("nil")?;
                Ok(Value::Nil)
            }
            "array" => self.array_body(),
            "struct" => self.struct_body(),
            other => Err(RpcError::Malformed(format!("unknown value type <{other}>"))),
        }
    }

    fn text_until(&mut self, tag: &str) -> Result<String, RpcError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&unescape_text(&t)?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(e) if tag_name(e.name()) == tag => return Ok(text),
                Event::Comment(_) => continue,
                other => {
                    return Err(RpcError::Malformed(format!(
                        "unexpected {other:?} inside <{tag}>"
                    )))
                }
            }
        }
    }

    fn array_body(&mut self) -> Result<Value, RpcError> {
        match self.next_tag()? {
            Tag::Empty(name) if name == "data" => {
                self.expect_end("array")?;
                return Ok(Value::Array(Vec::new()));
            }
            Tag::Start(name) if name == "data" => {}
            other => {
                return Err(RpcError::Malformed(format!(
                    "expected <data>, found {other:?}"
                )))
            }
        }

        let mut items = Vec::new();
        loop {
            match self.next_tag()? {
                Tag::Start(name) if name == "value" => items.push(self.value_body()?),
                Tag::Empty(name) if name == "value" => items.push(Value::String(String::new())),
                Tag::End(name) if name == "data" => break,
                other => {
                    return Err(RpcError::Malformed(format!(
                        "unexpected {other:?} inside <data>"
                    )))
                }
            }
        }
        self.expect_end("array")?;
        Ok(Value::Array(items))
    }

    fn struct_body(&mut self) -> Result<Value, RpcError> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_tag()? {
                Tag::Start(name) if name == "member" => {
                    self.expect_start("name")?;
                    let member = self.text_until("name")?.trim().to_string();
                    let value = self.expect_value()?;
                    self.expect_end("member")?;
                    members.insert(member, value);
                }
                Tag::End(name) if name == "struct" => break,
                other => {
                    return Err(RpcError::Malformed(format!(
                        "unexpected {other:?} inside <struct>"
                    )))
                }
            }
        }
        Ok(Value::Struct(members))
    }
}

fn empty_typed_value(tag: &str) -> Result<Value, RpcError> {
    match tag {
        "string" => Ok(Value::String(String::new())),
        "nil" => Ok(Value::Nil),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        "base64" => Ok(Value::Base64(Vec::new())),
        other => Err(RpcError::Malformed(format!("empty <{other}/> has no value"))),
    }
}

fn ensure_blank(text: &str) -> Result<(), RpcError> {
    if text.trim().is_empty() {
        Ok(())
    } else {
        Err(RpcError::Malformed("mixed content inside <value>".to_string()))
    }
}

fn unescape_text(text: &BytesText<'_>) -> Result<String, RpcError> {
    text.unescape()
        .map(|cow| cow.into_owned())
        .map_err(|err| RpcError::Malformed(err.to_string()))
}

fn tag_name(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

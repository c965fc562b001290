//! Markup → raw tree conversion.
//!
//! Produces the ambiguous shape the normaliser in `billserve-core` expects:
//!
//! - the root element becomes a one-key mapping `{ name: value }`;
//! - an element with neither attributes nor children is its text, or `null`
//!   when empty;
//! - otherwise it is a mapping of child name → value, with attributes under
//!   `@name` and any text under `#text`;
//! - repeated sibling names collect into a sequence, a single sibling does
//!   not.

use quick_xml::{Reader, events::Event};
use serde_json::{Map, Value};

use crate::{Error, Result};

const TEXT_KEY: &str = "#text";

#[derive(Default)]
struct Element {
  name:     String,
  children: Map<String, Value>,
  text:     String,
}

impl Element {
  fn open(name: &[u8], attributes: quick_xml::events::attributes::Attributes<'_>) -> Result<Self> {
    let mut element = Self { name: String::from_utf8_lossy(name).into_owned(), ..Self::default() };
    for attr in attributes {
      let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
      let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
      let value = attr.unescape_value().map_err(|e| Error::Xml(e.to_string()))?;
      element.children.insert(key, Value::String(value.into_owned()));
    }
    Ok(element)
  }

  fn into_value(self) -> (String, Value) {
    let value = match (self.children.is_empty(), self.text.is_empty()) {
      (true, true) => Value::Null,
      (true, false) => Value::String(self.text),
      (false, _) => {
        let mut map = self.children;
        if !self.text.is_empty() {
          map.insert(TEXT_KEY.to_owned(), Value::String(self.text));
        }
        Value::Object(map)
      }
    };
    (self.name, value)
  }

  /// Add a closed child, turning a repeated name into a sequence.
  fn push_child(&mut self, name: String, value: Value) {
    match self.children.get_mut(&name) {
      None => {
        self.children.insert(name, value);
      }
      Some(Value::Array(items)) => items.push(value),
      Some(existing) => {
        let first = existing.take();
        *existing = Value::Array(vec![first, value]);
      }
    }
  }
}

/// Parse a whole document into a raw tree.
pub fn parse_document(xml: &[u8]) -> Result<Value> {
  let mut reader = Reader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut stack: Vec<Element> = Vec::new();
  let mut root: Option<(String, Value)> = None;
  let mut buf = Vec::new();

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => {
        stack.push(Element::open(e.name().as_ref(), e.attributes())?);
      }
      Ok(Event::Empty(ref e)) => {
        let (name, value) = Element::open(e.name().as_ref(), e.attributes())?.into_value();
        close(&mut stack, &mut root, name, value)?;
      }
      Ok(Event::Text(ref e)) => {
        let text = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&text);
        }
      }
      Ok(Event::CData(e)) => {
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
        }
      }
      Ok(Event::End(_)) => {
        let Some(element) = stack.pop() else {
          return Err(Error::Xml("closing tag without an open element".into()));
        };
        let (name, value) = element.into_value();
        close(&mut stack, &mut root, name, value)?;
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(Error::Xml(e.to_string())),
      _ => {}
    }
    buf.clear();
  }

  if !stack.is_empty() {
    return Err(Error::Xml("document ended inside an element".into()));
  }
  let (name, value) = root.ok_or_else(|| Error::Xml("document has no root element".into()))?;
  Ok(Value::Object(Map::from_iter([(name, value)])))
}

fn close(
  stack: &mut [Element],
  root: &mut Option<(String, Value)>,
  name: String,
  value: Value,
) -> Result<()> {
  match stack.last_mut() {
    Some(parent) => parent.push_child(name, value),
    None if root.is_none() => *root = Some((name, value)),
    None => return Err(Error::Xml("more than one root element".into())),
  }
  Ok(())
}

//! Prototype exchange document.
//!
//! The decompiler's prototype API only accepts an injection marker through its
//! serialized form, so attaching one means saving the prototype to a document,
//! adding an `<inject>` element, and restoring the prototype from the result.
//! This module provides the [`Element`] tree, its XML text form (via
//! `quick-xml`), and the prototype encoding:
//!
//! ```xml
//! <prototype model="__stdcall" dotdotdot="false">
//!   <returnsym flags="1"><type id="3" name="int"/><register name="eax" size="4"/></returnsym>
//!   <internallist>
//!     <param name="a" flags="1"><type id="3" name="int"/><stack offset="4" size="4"/></param>
//!   </internallist>
//!   <inject>alloca_probe</inject>
//! </prototype>
//! ```

use std::str::FromStr;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use typebridge_core::{ConventionRegistry, DocumentError, TypeId};
use typebridge_registry::TypeCache;

use crate::proto::{FuncProto, ParamFlags, ProtoParam, Storage};

// ============================================================================
// Element tree
// ============================================================================

/// One element of an exchange document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Text content.
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // === Builder Methods ===

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    // === Queries ===

    /// Attribute value, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, failing with `MissingAttribute`.
    pub fn require(&self, key: &str) -> Result<&str, DocumentError> {
        self.attribute(key)
            .ok_or_else(|| DocumentError::MissingAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
            })
    }

    /// Parsed attribute value.
    pub fn parse_attribute<T: FromStr>(&self, key: &str) -> Result<T, DocumentError> {
        let value = self.require(key)?;
        value.parse().map_err(|_| DocumentError::InvalidAttribute {
            element: self.name.clone(),
            attribute: key.to_string(),
            value: value.to_string(),
        })
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Fail with `UnexpectedElement` unless this element has the given tag.
    pub fn expect(&self, name: &str) -> Result<(), DocumentError> {
        if self.name == name {
            Ok(())
        } else {
            Err(DocumentError::UnexpectedElement {
                expected: name.to_string(),
                found: self.name.clone(),
            })
        }
    }

    // ==========================================================================
    // XML text form
    // ==========================================================================

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, DocumentError> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| DocumentError::Xml(e.to_string()))?
            {
                Event::Start(ref start) => stack.push(element_from_start(start)?),
                Event::Empty(ref start) => {
                    let element = element_from_start(start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(ref text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| DocumentError::Xml(e.to_string()))?;
                        // Indentation between elements is not content.
                        if !text.trim().is_empty() {
                            current.text.push_str(&text);
                        }
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocumentError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocumentError::Xml("unclosed element".to_string()));
        }
        root.ok_or(DocumentError::Empty)
    }

    /// Serialize to XML text.
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        self.write(&mut writer)
            .map_err(|e| DocumentError::Xml(e.to_string()))?;
        String::from_utf8(writer.into_inner()).map_err(|e| DocumentError::Xml(e.to_string()))
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> quick_xml::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

// ============================================================================
// Prototype encoding
// ============================================================================

impl FuncProto {
    /// Save the prototype to a `<prototype>` element.
    pub fn save_document(&self, cache: &TypeCache) -> Element {
        let inputs = self
            .inputs
            .iter()
            .fold(Element::new("internallist"), |list, p| {
                list.with_child(save_slot(
                    Element::new("param").with_attribute("name", &p.name),
                    p,
                    cache,
                ))
            });

        let mut root = Element::new("prototype")
            .with_attribute("model", &self.model.name)
            .with_attribute("dotdotdot", self.dotdotdot)
            .with_child(save_slot(Element::new("returnsym"), &self.output, cache))
            .with_child(inputs);
        if let Some(inject) = &self.inject {
            root = root.with_child(Element::new("inject").with_text(inject.as_str()));
        }
        root
    }

    /// Replace this prototype with the one stored in a `<prototype>` element.
    ///
    /// Nothing is changed if the document is rejected.
    pub fn restore_document(
        &mut self,
        element: &Element,
        registry: &ConventionRegistry,
        cache: &TypeCache,
    ) -> Result<(), DocumentError> {
        element.expect("prototype")?;

        let model_name = element.require("model")?;
        let model = registry
            .get_model(model_name)
            .ok_or_else(|| DocumentError::UnknownModel(model_name.to_string()))?;
        let dotdotdot = element.parse_attribute::<bool>("dotdotdot")?;

        let returnsym = required_child(element, "returnsym")?;
        let output = restore_slot(returnsym, String::new(), cache)?;

        let mut inputs = Vec::new();
        for param in &required_child(element, "internallist")?.children {
            param.expect("param")?;
            let name = param.require("name")?.to_string();
            inputs.push(restore_slot(param, name, cache)?);
        }

        let inject = element.child("inject").map(|e| e.text.clone());

        *self = FuncProto {
            model,
            output,
            inputs,
            dotdotdot,
            inject,
        };
        Ok(())
    }
}

fn required_child<'a>(element: &'a Element, name: &str) -> Result<&'a Element, DocumentError> {
    element
        .child(name)
        .ok_or_else(|| DocumentError::UnexpectedElement {
            expected: name.to_string(),
            found: element
                .children
                .first()
                .map_or_else(|| format!("/{}", element.name), |c| c.name.clone()),
        })
}

fn save_slot(element: Element, slot: &ProtoParam, cache: &TypeCache) -> Element {
    let element = element
        .with_attribute("flags", slot.flags.bits())
        .with_child(
            Element::new("type")
                .with_attribute("id", slot.ty.index())
                .with_attribute("name", cache.name_of(slot.ty)),
        );
    match &slot.storage {
        Storage::Unassigned => element,
        Storage::Register { name, size } => element.with_child(
            Element::new("register")
                .with_attribute("name", name)
                .with_attribute("size", size),
        ),
        Storage::Stack { offset, size } => element.with_child(
            Element::new("stack")
                .with_attribute("offset", offset)
                .with_attribute("size", size),
        ),
    }
}

fn restore_slot(element: &Element, name: String, cache: &TypeCache) -> Result<ProtoParam, DocumentError> {
    let flags = ParamFlags::from_bits_truncate(element.parse_attribute::<u32>("flags")?);

    let type_element = required_child(element, "type")?;
    let raw = type_element.parse_attribute::<u32>("id")?;
    let ty = TypeId::new(raw);
    if cache.get(ty).is_none() {
        return Err(DocumentError::UnknownTypeId(raw));
    }

    let storage = if let Some(register) = element.child("register") {
        Storage::Register {
            name: register.require("name")?.to_string(),
            size: register.parse_attribute("size")?,
        }
    } else if let Some(stack) = element.child("stack") {
        Storage::Stack {
            offset: stack.parse_attribute("offset")?,
            size: stack.parse_attribute("size")?,
        }
    } else {
        Storage::Unassigned
    };

    Ok(ProtoParam {
        name,
        ty,
        storage,
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use typebridge_core::{Datatype, FuncSignature};

    #[test]
    fn parse_nested_document() {
        let root = Element::parse(
            r#"<a x="1"><b/><c y="two &amp; three">text</c></a>"#,
        )
        .unwrap();

        assert_eq!(root.name, "a");
        assert_eq!(root.attribute("x"), Some("1"));
        assert_eq!(root.children.len(), 2);
        let c = root.child("c").unwrap();
        assert_eq!(c.attribute("y"), Some("two & three"));
        assert_eq!(c.text, "text");
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let element = Element::new("prototype")
            .with_attribute("model", "__cdecl")
            .with_child(Element::new("inject").with_text("a<b"))
            .with_child(Element::new("empty"));

        let xml = element.to_xml().unwrap();
        assert!(xml.starts_with("<prototype model=\"__cdecl\">"));
        assert_eq!(Element::parse(&xml).unwrap(), element);
    }

    #[test]
    fn text_keeps_surrounding_spaces() {
        let element =
            Element::new("prototype").with_child(Element::new("inject").with_text(" chkstk "));
        let parsed = Element::parse(&element.to_xml().unwrap()).unwrap();
        assert_eq!(parsed.child("inject").unwrap().text, " chkstk ");
    }

    #[test]
    fn indentation_is_not_text() {
        let root = Element::parse("<a>\n  <b>  x  </b>\n  <c/>\n</a>\n").unwrap();
        assert_eq!(root.text, "");
        assert_eq!(root.child("b").unwrap().text, "  x  ");
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Element::parse(""), Err(DocumentError::Empty));
        assert!(matches!(Element::parse("<a><b></a>"), Err(DocumentError::Xml(_))));
        assert!(matches!(Element::parse("<a>"), Err(DocumentError::Xml(_))));
    }

    #[test]
    fn attribute_errors() {
        let e = Element::new("stack").with_attribute("offset", "x");
        assert_eq!(
            e.parse_attribute::<i64>("offset"),
            Err(DocumentError::InvalidAttribute {
                element: "stack".into(),
                attribute: "offset".into(),
                value: "x".into(),
            })
        );
        assert_eq!(
            e.require("size"),
            Err(DocumentError::MissingAttribute {
                element: "stack".into(),
                attribute: "size".into(),
            })
        );
    }

    fn sample() -> (TypeCache, ConventionRegistry, FuncProto) {
        let mut cache = TypeCache::new();
        let int = cache.intern(Datatype::int("int", 4));
        let registry = ConventionRegistry::x86();
        let sig = FuncSignature {
            model: registry.model_or_default("__fastcall"),
            output: int,
            inputs: vec![int, int, int],
            dotdotdot: true,
        };
        let mut proto = FuncProto::from_signature(&sig, &cache);
        proto.inputs[0].name = "a".into();
        proto.inputs[1].flags |= ParamFlags::NAME_LOCK;
        (cache, registry, proto)
    }

    #[test]
    fn prototype_survives_text_round_trip() {
        let (cache, registry, mut proto) = sample();
        proto.inject = Some("alloca_probe".into());

        let xml = proto.save_document(&cache).to_xml().unwrap();
        let mut restored = FuncProto::from_signature(
            &FuncSignature {
                model: registry.default_model().clone(),
                output: TypeId::new(0),
                inputs: Vec::new(),
                dotdotdot: false,
            },
            &cache,
        );
        restored
            .restore_document(&Element::parse(&xml).unwrap(), &registry, &cache)
            .unwrap();
        assert_eq!(restored, proto);
    }

    #[test]
    fn restore_rejects_unknown_model_and_type() {
        let (cache, registry, mut proto) = sample();
        let before = proto.clone();

        let mut doc = proto.save_document(&cache);
        doc.attributes[0].1 = "__vectorcall".into();
        assert_eq!(
            proto.restore_document(&doc, &registry, &cache),
            Err(DocumentError::UnknownModel("__vectorcall".into()))
        );

        let mut doc = proto.save_document(&cache);
        doc.children[0].children[0].attributes[0].1 = "99".into();
        assert_eq!(
            proto.restore_document(&doc, &registry, &cache),
            Err(DocumentError::UnknownTypeId(99))
        );
        assert_eq!(proto, before);
    }

    #[test]
    fn restore_rejects_wrong_root() {
        let (cache, registry, mut proto) = sample();
        assert_eq!(
            proto.restore_document(&Element::new("function"), &registry, &cache),
            Err(DocumentError::UnexpectedElement {
                expected: "prototype".into(),
                found: "function".into(),
            })
        );
    }
}

//! Object resolvers turn an evaluated value into the run that replaces a
//! placeholder.

use crate::error::{Result, StampError};
use crate::wml::media::{png_dimensions, sniff_image, MediaSink};
use crate::wml::run::text_run;
use crate::xml::namespaces::{A, PIC, R, W, WP};
use crate::xml::{XAttribute, XName, XmlDocument, XmlNodeData};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::expression::json_type_name;

/// Renders values of the types it accepts as a detached run.
pub trait ObjectResolver: Send + Sync {
    /// Higher priorities are asked first.
    fn priority(&self) -> i32 {
        0
    }

    fn can_resolve(&self, value: &Value) -> bool;

    fn resolve(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        expression: &str,
        value: &Value,
    ) -> Result<NodeId>;
}

/// Resolvers ordered by descending priority, ending in a fallback that
/// accepts every value.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ObjectResolver>>,
    fallback: FallbackResolver,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            fallback: FallbackResolver,
        }
    }

    /// Image, string and (when `replace_null_values`) null resolvers.
    pub fn standard(replace_null_values: bool) -> Self {
        let mut chain = Self::new();
        chain.add(Box::new(ImageResolver));
        chain.add(Box::new(StringResolver));
        if replace_null_values {
            chain.add(Box::new(NullResolver));
        }
        chain
    }

    /// Inserts `resolver` after every resolver of equal or higher priority.
    pub fn add(&mut self, resolver: Box<dyn ObjectResolver>) {
        let position = self
            .resolvers
            .iter()
            .position(|r| r.priority() < resolver.priority())
            .unwrap_or(self.resolvers.len());
        self.resolvers.insert(position, resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn resolve(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        expression: &str,
        value: &Value,
    ) -> Result<NodeId> {
        let resolver: &dyn ObjectResolver = self
            .resolvers
            .iter()
            .map(|r| r.as_ref())
            .find(|r| r.can_resolve(value))
            .unwrap_or(&self.fallback);
        resolver.resolve(doc, media, expression, value)
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard(true)
    }
}

pub struct StringResolver;

impl ObjectResolver for StringResolver {
    fn can_resolve(&self, value: &Value) -> bool {
        value.is_string()
    }

    fn resolve(
        &self,
        doc: &mut XmlDocument,
        _media: &mut MediaSink<'_>,
        _expression: &str,
        value: &Value,
    ) -> Result<NodeId> {
        Ok(text_run(doc, value.as_str().unwrap_or_default()))
    }
}

/// `null` as empty text. Registered only when null values are to be
/// replaced; otherwise `null` reaches no resolver but the fallback's
/// rejection.
pub struct NullResolver;

impl ObjectResolver for NullResolver {
    fn priority(&self) -> i32 {
        -10
    }

    fn can_resolve(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn resolve(
        &self,
        doc: &mut XmlDocument,
        _media: &mut MediaSink<'_>,
        _expression: &str,
        _value: &Value,
    ) -> Result<NodeId> {
        Ok(text_run(doc, ""))
    }
}

/// Numbers and booleans as their JSON text, containers as compact JSON.
/// `null` is refused so it surfaces as an unresolved expression.
pub struct FallbackResolver;

impl ObjectResolver for FallbackResolver {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn can_resolve(&self, _value: &Value) -> bool {
        true
    }

    fn resolve(
        &self,
        doc: &mut XmlDocument,
        _media: &mut MediaSink<'_>,
        expression: &str,
        value: &Value,
    ) -> Result<NodeId> {
        let text = match value {
            Value::Null => {
                return Err(StampError::UnresolvedExpression {
                    expression: expression.to_string(),
                    context_type: json_type_name(value).to_string(),
                    reason: "value is null".to_string(),
                })
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(text_run(doc, &text))
    }
}

const IMAGE_KEY: &str = "$image";
const EMU_PER_PIXEL: u64 = 9525;
const DEFAULT_IMAGE_PIXELS: u64 = 100;

/// `{"$image": "<base64>", "width"?: px, "height"?: px, "altText"?: text}`
/// rendered as an inline picture.
pub struct ImageResolver;

impl ImageResolver {
    fn size(bytes: &[u8], value: &Value) -> (u64, u64) {
        let requested = |key: &str| value.get(key).and_then(Value::as_u64);
        let natural = png_dimensions(bytes).map(|(w, h)| (u64::from(w), u64::from(h)));
        match (requested("width"), requested("height"), natural) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((nw, nh))) if nw > 0 => (w, w * nh / nw),
            (None, Some(h), Some((nw, nh))) if nh > 0 => (h * nw / nh, h),
            (Some(w), None, _) => (w, w),
            (None, Some(h), _) => (h, h),
            (None, None, Some(size)) => size,
            (None, None, None) => (DEFAULT_IMAGE_PIXELS, DEFAULT_IMAGE_PIXELS),
        }
    }
}

impl ObjectResolver for ImageResolver {
    fn priority(&self) -> i32 {
        10
    }

    fn can_resolve(&self, value: &Value) -> bool {
        value.get(IMAGE_KEY).is_some_and(Value::is_string)
    }

    fn resolve(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        expression: &str,
        value: &Value,
    ) -> Result<NodeId> {
        let unresolved = |reason: String| StampError::UnresolvedExpression {
            expression: expression.to_string(),
            context_type: json_type_name(value).to_string(),
            reason,
        };
        let encoded = value
            .get(IMAGE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| unresolved(format!("image data is not base64: {e}")))?;
        let (extension, content_type) =
            sniff_image(&bytes).ok_or_else(|| unresolved("unrecognised image format".to_string()))?;

        let (width, height) = Self::size(&bytes, value);
        let alt_text = value
            .get("altText")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let rel_id = media.add_image(bytes, extension, content_type);
        debug!(expression, rel_id = %rel_id, width, height, "rendered image");

        let drawing = Drawing {
            rel_id: &rel_id,
            name: format!("image.{extension}"),
            alt_text: &alt_text,
            cx: width * EMU_PER_PIXEL,
            cy: height * EMU_PER_PIXEL,
            doc_pr_id: next_drawing_id(doc),
        };
        Ok(drawing.build(doc))
    }
}

/// Next free `wp:docPr` id in the tree.
fn next_drawing_id(doc: &XmlDocument) -> u64 {
    let Some(root) = doc.root() else {
        return 1;
    };
    let id_name = XName::local("id");
    doc.descendants(root)
        .filter(|&d| doc.is(d, WP::NS, "docPr"))
        .filter_map(|d| doc.attribute(d, &id_name)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

struct Drawing<'a> {
    rel_id: &'a str,
    name: String,
    alt_text: &'a str,
    cx: u64,
    cy: u64,
    doc_pr_id: u64,
}

fn element(doc: &mut XmlDocument, parent: NodeId, name: XName, attrs: &[(&str, &str)]) -> NodeId {
    let attributes = attrs
        .iter()
        .map(|(n, v)| XAttribute::new(XName::local(n), v))
        .collect();
    doc.add_child(parent, XmlNodeData::element_with_attrs(name, attributes))
}

impl Drawing<'_> {
    fn build(&self, doc: &mut XmlDocument) -> NodeId {
        let cx = self.cx.to_string();
        let cy = self.cy.to_string();
        let id = self.doc_pr_id.to_string();

        let run = doc.new_detached(XmlNodeData::element(W::r()));
        let drawing = element(doc, run, W::drawing(), &[]);
        let inline = element(
            doc,
            drawing,
            WP::inline(),
            &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        );
        element(doc, inline, WP::extent(), &[("cx", &cx), ("cy", &cy)]);
        element(
            doc,
            inline,
            WP::docPr(),
            &[("id", &id), ("name", &self.name), ("descr", self.alt_text)],
        );
        let frame = element(doc, inline, WP::cNvGraphicFramePr(), &[]);
        element(doc, frame, A::graphicFrameLocks(), &[("noChangeAspect", "1")]);

        let graphic = element(doc, inline, A::graphic(), &[]);
        let data = element(
            doc,
            graphic,
            A::graphicData(),
            &[("uri", PIC::NS)],
        );
        let pic = element(doc, data, PIC::pic(), &[]);
        let nv = element(doc, pic, PIC::nvPicPr(), &[]);
        element(doc, nv, PIC::cNvPr(), &[("id", "0"), ("name", &self.name)]);
        element(doc, nv, PIC::cNvPicPr(), &[]);

        let fill = element(doc, pic, PIC::blipFill(), &[]);
        let blip = element(doc, fill, A::blip(), &[]);
        doc.set_attribute(blip, &R::embed(), self.rel_id);
        let stretch = element(doc, fill, A::stretch(), &[]);
        element(doc, stretch, A::fillRect(), &[]);

        let shape = element(doc, pic, PIC::spPr(), &[]);
        let xfrm = element(doc, shape, A::xfrm(), &[]);
        element(doc, xfrm, A::off(), &[("x", "0"), ("y", "0")]);
        element(doc, xfrm, A::ext(), &[("cx", &cx), ("cy", &cy)]);
        let geometry = element(doc, shape, A::prstGeom(), &[("prst", "rect")]);
        element(doc, geometry, A::avLst(), &[]);
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::OoxmlPackage;
    use crate::wml::media::relationship_references;
    use crate::wml::run::run_text;
    use serde_json::json;

    struct Shouting;

    impl ObjectResolver for Shouting {
        fn priority(&self) -> i32 {
            5
        }

        fn can_resolve(&self, value: &Value) -> bool {
            value.is_string()
        }

        fn resolve(
            &self,
            doc: &mut XmlDocument,
            _media: &mut MediaSink<'_>,
            _expression: &str,
            value: &Value,
        ) -> Result<NodeId> {
            Ok(text_run(doc, &value.as_str().unwrap_or_default().to_uppercase()))
        }
    }

    fn render(chain: &ResolverChain, value: Value) -> Result<String> {
        let mut doc = XmlDocument::new();
        let mut package = OoxmlPackage::new();
        let mut media = MediaSink::new(&mut package, "word/document.xml");
        let run = chain.resolve(&mut doc, &mut media, "x", &value)?;
        Ok(run_text(&doc, run))
    }

    #[test]
    fn renders_scalars_and_containers() {
        let chain = ResolverChain::standard(true);
        assert_eq!(render(&chain, json!("text")).unwrap(), "text");
        assert_eq!(render(&chain, json!(42)).unwrap(), "42");
        assert_eq!(render(&chain, json!(true)).unwrap(), "true");
        assert_eq!(render(&chain, json!([1, 2])).unwrap(), "[1,2]");
        assert_eq!(render(&chain, Value::Null).unwrap(), "");
    }

    #[test]
    fn null_is_unresolved_without_null_resolver() {
        let chain = ResolverChain::standard(false);
        let err = render(&chain, Value::Null).unwrap_err();
        assert!(matches!(err, StampError::UnresolvedExpression { .. }));
    }

    #[test]
    fn higher_priority_resolver_wins() {
        let mut chain = ResolverChain::standard(true);
        chain.add(Box::new(Shouting));
        assert_eq!(render(&chain, json!("quiet")).unwrap(), "QUIET");
        assert_eq!(chain.len(), 5);
    }

    #[test]
    fn image_value_becomes_inline_drawing() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR".to_vec();
        png.extend_from_slice(&20u32.to_be_bytes());
        png.extend_from_slice(&10u32.to_be_bytes());
        let value = json!({"$image": STANDARD.encode(&png), "width": 40, "altText": "logo"});

        let mut doc = XmlDocument::new();
        let mut package = OoxmlPackage::new();
        let run = {
            let mut media = MediaSink::new(&mut package, "word/document.xml");
            ResolverChain::standard(true)
                .resolve(&mut doc, &mut media, "logo", &value)
                .unwrap()
        };

        let refs = relationship_references(&doc, run);
        assert_eq!(refs.len(), 1);
        let target = package
            .relationship_target("word/document.xml", &refs[0].2)
            .unwrap();
        assert_eq!(package.get_part(&target), Some(png.as_slice()));

        let extent = doc.descendants(run).find(|&d| doc.is(d, WP::NS, "extent")).unwrap();
        assert_eq!(doc.attribute(extent, &XName::local("cx")), Some("381000"));
        assert_eq!(doc.attribute(extent, &XName::local("cy")), Some("190500"));
    }

    #[test]
    fn bad_image_data_is_unresolved() {
        let chain = ResolverChain::standard(true);
        let err = render(&chain, json!({"$image": "not base64!"})).unwrap_err();
        assert!(matches!(err, StampError::UnresolvedExpression { ref expression, .. } if expression == "x"));
    }
}

#![allow(non_snake_case)]

use super::xname::XName;

pub mod W {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    pub fn document() -> XName { XName::new(NS, "document") }
    pub fn body() -> XName { XName::new(NS, "body") }
    pub fn p() -> XName { XName::new(NS, "p") }
    pub fn pPr() -> XName { XName::new(NS, "pPr") }
    pub fn r() -> XName { XName::new(NS, "r") }
    pub fn rPr() -> XName { XName::new(NS, "rPr") }
    pub fn t() -> XName { XName::new(NS, "t") }
    pub fn tab() -> XName { XName::new(NS, "tab") }
    pub fn br() -> XName { XName::new(NS, "br") }
    pub fn drawing() -> XName { XName::new(NS, "drawing") }
    pub fn tbl() -> XName { XName::new(NS, "tbl") }
    pub fn tr() -> XName { XName::new(NS, "tr") }
    pub fn tc() -> XName { XName::new(NS, "tc") }
    pub fn sectPr() -> XName { XName::new(NS, "sectPr") }
    pub fn proofErr() -> XName { XName::new(NS, "proofErr") }
    pub fn comments() -> XName { XName::new(NS, "comments") }
    pub fn comment() -> XName { XName::new(NS, "comment") }
    pub fn commentRangeStart() -> XName { XName::new(NS, "commentRangeStart") }
    pub fn commentRangeEnd() -> XName { XName::new(NS, "commentRangeEnd") }
    pub fn commentReference() -> XName { XName::new(NS, "commentReference") }
    pub fn id() -> XName { XName::new(NS, "id") }
}

pub mod R {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    pub fn embed() -> XName { XName::new(NS, "embed") }
    pub fn id() -> XName { XName::new(NS, "id") }
    pub fn link() -> XName { XName::new(NS, "link") }
}

pub mod WP {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";

    pub fn inline() -> XName { XName::new(NS, "inline") }
    pub fn extent() -> XName { XName::new(NS, "extent") }
    pub fn docPr() -> XName { XName::new(NS, "docPr") }
    pub fn cNvGraphicFramePr() -> XName { XName::new(NS, "cNvGraphicFramePr") }
}

pub mod A {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

    pub fn graphic() -> XName { XName::new(NS, "graphic") }
    pub fn graphicData() -> XName { XName::new(NS, "graphicData") }
    pub fn graphicFrameLocks() -> XName { XName::new(NS, "graphicFrameLocks") }
    pub fn blip() -> XName { XName::new(NS, "blip") }
    pub fn stretch() -> XName { XName::new(NS, "stretch") }
    pub fn fillRect() -> XName { XName::new(NS, "fillRect") }
    pub fn xfrm() -> XName { XName::new(NS, "xfrm") }
    pub fn off() -> XName { XName::new(NS, "off") }
    pub fn ext() -> XName { XName::new(NS, "ext") }
    pub fn prstGeom() -> XName { XName::new(NS, "prstGeom") }
    pub fn avLst() -> XName { XName::new(NS, "avLst") }
}

pub mod PIC {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

    pub fn pic() -> XName { XName::new(NS, "pic") }
    pub fn nvPicPr() -> XName { XName::new(NS, "nvPicPr") }
    pub fn cNvPr() -> XName { XName::new(NS, "cNvPr") }
    pub fn cNvPicPr() -> XName { XName::new(NS, "cNvPicPr") }
    pub fn blipFill() -> XName { XName::new(NS, "blipFill") }
    pub fn spPr() -> XName { XName::new(NS, "spPr") }
}

pub mod XML {
    use super::XName;
    pub const NS: &str = "http://www.w3.org/XML/1998/namespace";

    pub fn space() -> XName { XName::new(NS, "space") }
}

pub mod XMLNS {
    use super::XName;
    pub const NS: &str = "http://www.w3.org/2000/xmlns/";

    /// `xmlns:{prefix}` declaration attribute name.
    pub fn prefix(prefix: &str) -> XName { XName::new(NS, prefix) }
}

/// Package relationship parts (`*.rels`).
pub mod PKG_REL {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

    pub fn relationships() -> XName { XName::new(NS, "Relationships") }
    pub fn relationship() -> XName { XName::new(NS, "Relationship") }
}

/// `[Content_Types].xml`.
pub mod CT {
    use super::XName;
    pub const NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

    pub fn types() -> XName { XName::new(NS, "Types") }
    pub fn default() -> XName { XName::new(NS, "Default") }
    pub fn override_() -> XName { XName::new(NS, "Override") }
}

//! Vector tasks: `svg` (standalone files) and `sprite` (icon symbols).
//!
//! Both run the same document rewrite: the XML is parsed with `roxmltree`
//! and written back with `xmlwriter`, element for element. What goes:
//!
//! - comments, processing instructions, the XML declaration and DTD
//! - `<metadata>` and anything in a foreign namespace (editor data, RDF)
//! - indentation and insignificant whitespace
//! - excess precision in geometry (`d`, `points`, `viewBox`, coordinates),
//!   re-serialized through `svgtypes` at three decimals
//!
//! Everything else is written as found. Paint is never resolved, so
//! `currentColor` and inherited fills keep working, and `<text>`, `<title>`
//! and `viewBox` survive. Icons under `images.icons_dir` belong to the sprite
//! alone; `svg` never writes them as standalone files.

use super::sources::expand;
use super::{TaskContext, TaskError, TaskReport, url_path, write_output};
use roxmltree::{Attribute, Document, Node, ParsingOptions};
use std::collections::HashSet;
use std::path::Path;
use svgtypes::{NumberListParser, PathParser, PathSegment};
use xmlwriter::{Indent, Options, XmlWriter};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Single-number attributes rounded when they hold a plain number.
const NUMERIC: &[&str] = &[
    "x", "y", "width", "height", "cx", "cy", "r", "rx", "ry", "x1", "y1", "x2", "y2",
    "stroke-width",
];

/// Root attributes a `<symbol>` replaces with its own.
const ROOT_ONLY: &[&str] = &["width", "height", "viewBox", "x", "y", "version", "id"];

/// Elements whose whitespace is rendered.
const TEXT_CONTENT: &[&str] = &["text", "tspan", "textPath"];

fn writer() -> XmlWriter {
    XmlWriter::new(Options {
        use_single_quote: false,
        indent: Indent::None,
        attributes_indent: Indent::None,
    })
}

/// At most three decimals, no trailing zeros, no negative zero.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{value:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        s => s.to_string(),
    }
}

fn format_number_list(value: &str) -> Option<String> {
    let numbers = NumberListParser::from(value)
        .map(|n| n.ok().map(format_number))
        .collect::<Option<Vec<_>>>()?;
    Some(numbers.join(" "))
}

/// Path data with rounded coordinates. `None` if `d` does not parse.
pub fn format_path(d: &str) -> Option<String> {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let mut out = String::with_capacity(d.len());
    for segment in PathParser::from(d) {
        let (command, abs, args) = match segment.ok()? {
            PathSegment::MoveTo { abs, x, y } => ('M', abs, vec![x, y]),
            PathSegment::LineTo { abs, x, y } => ('L', abs, vec![x, y]),
            PathSegment::HorizontalLineTo { abs, x } => ('H', abs, vec![x]),
            PathSegment::VerticalLineTo { abs, y } => ('V', abs, vec![y]),
            PathSegment::CurveTo { abs, x1, y1, x2, y2, x, y } => {
                ('C', abs, vec![x1, y1, x2, y2, x, y])
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => ('S', abs, vec![x2, y2, x, y]),
            PathSegment::Quadratic { abs, x1, y1, x, y } => ('Q', abs, vec![x1, y1, x, y]),
            PathSegment::SmoothQuadratic { abs, x, y } => ('T', abs, vec![x, y]),
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => (
                'A',
                abs,
                vec![rx, ry, x_axis_rotation, flag(large_arc), flag(sweep), x, y],
            ),
            PathSegment::ClosePath { abs } => ('Z', abs, Vec::new()),
        };
        out.push(if abs {
            command
        } else {
            command.to_ascii_lowercase()
        });
        let args: Vec<String> = args.into_iter().map(format_number).collect();
        out.push_str(&args.join(" "));
    }
    Some(out)
}

fn optimize_value(name: &str, value: &str) -> String {
    let optimized = match name {
        "d" => format_path(value),
        "viewBox" | "points" => format_number_list(value),
        n if NUMERIC.contains(&n) => value.trim().parse::<f64>().ok().map(format_number),
        _ => None,
    };
    optimized.unwrap_or_else(|| value.to_string())
}

fn escape_text(text: &str) -> String {
    // xmlwriter escapes `<` in text and quotes in attributes; the rest is ours.
    text.replace('&', "&amp;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;")
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Serialized attribute name, `None` for foreign namespaces.
fn attribute_name(attr: &Attribute) -> Option<String> {
    match attr.namespace() {
        None => Some(attr.name().to_string()),
        Some(XLINK_NS) => Some(format!("xlink:{}", attr.name())),
        Some(XML_NS) => Some(format!("xml:{}", attr.name())),
        Some(_) => None,
    }
}

/// Id namespacing for icons merged into one sprite document.
struct IdPrefix<'a> {
    prefix: &'a str,
    ids: HashSet<&'a str>,
}

impl<'a> IdPrefix<'a> {
    fn none() -> Self {
        Self {
            prefix: "",
            ids: HashSet::new(),
        }
    }

    fn for_document(prefix: &'a str, doc: &'a Document<'_>) -> Self {
        let ids = doc.descendants().filter_map(|n| n.attribute("id")).collect();
        Self { prefix, ids }
    }

    fn apply(&self, name: &str, value: &str) -> String {
        if self.ids.is_empty() {
            return value.to_string();
        }
        match name {
            "id" if self.ids.contains(value) => format!("{}{value}", self.prefix),
            "href" | "xlink:href" => match value.strip_prefix('#') {
                Some(id) if self.ids.contains(id) => format!("#{}{id}", self.prefix),
                _ => value.to_string(),
            },
            _ => self.ids.iter().fold(value.to_string(), |out, id| {
                out.replace(&format!("url(#{id})"), &format!("url(#{}{id})", self.prefix))
            }),
        }
    }
}

fn write_attributes(w: &mut XmlWriter, node: Node, ids: &IdPrefix, skip: &[&str]) {
    for attr in node.attributes() {
        let Some(name) = attribute_name(&attr) else {
            continue;
        };
        if skip.contains(&name.as_str()) {
            continue;
        }
        let value = ids.apply(&name, &optimize_value(&name, attr.value()));
        w.write_attribute(&name, &escape_attr(&value));
    }
}

fn write_children(w: &mut XmlWriter, node: Node, ids: &IdPrefix) {
    let keeps_space = TEXT_CONTENT.contains(&node.tag_name().name());
    for child in node.children() {
        if child.is_element() {
            write_element(w, child, ids);
        } else if child.is_text() {
            let text = collapse_whitespace(child.text().unwrap_or_default());
            let text = if keeps_space { text.as_str() } else { text.trim() };
            if !text.is_empty() {
                w.write_text(&escape_text(text));
            }
        }
    }
}

fn write_element(w: &mut XmlWriter, node: Node, ids: &IdPrefix) {
    let name = node.tag_name();
    if name.namespace() != Some(SVG_NS) || name.name() == "metadata" {
        return;
    }
    w.start_element(name.name());
    write_attributes(w, node, ids, &[]);
    write_children(w, node, ids);
    w.end_element();
}

fn uses_xlink(doc: &Document) -> bool {
    doc.descendants()
        .any(|n| n.attributes().any(|a| a.namespace() == Some(XLINK_NS)))
}

fn read(path: &Path) -> Result<String, TaskError> {
    std::fs::read_to_string(path).map_err(TaskError::io(path))
}

fn parse<'a>(path: &Path, text: &'a str) -> Result<Document<'a>, TaskError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options).map_err(|e| TaskError::compile(path, e))?;
    if !doc.root_element().has_tag_name((SVG_NS, "svg")) {
        return Err(TaskError::compile(path, "root element is not <svg>"));
    }
    Ok(doc)
}

/// Rewrite one SVG document without changing what it renders.
pub fn optimize_file(path: &Path) -> Result<String, TaskError> {
    let text = read(path)?;
    let doc = parse(path, &text)?;
    let root = doc.root_element();
    let ids = IdPrefix::none();

    let mut w = writer();
    w.start_element("svg");
    w.write_attribute("xmlns", SVG_NS);
    if uses_xlink(&doc) {
        w.write_attribute("xmlns:xlink", XLINK_NS);
    }
    write_attributes(&mut w, root, &ids, &[]);
    write_children(&mut w, root, &ids);
    Ok(w.end_document())
}

/// The icon's `viewBox`, or one spanning its numeric width and height.
fn icon_view_box(root: Node) -> Option<String> {
    if let Some(view_box) = root.attribute("viewBox") {
        return format_number_list(view_box);
    }
    let size = |name: &str| {
        root.attribute(name)?
            .trim()
            .trim_end_matches("px")
            .parse::<f64>()
            .ok()
    };
    Some(format!(
        "0 0 {} {}",
        format_number(size("width")?),
        format_number(size("height")?)
    ))
}

/// Append one icon as a `<symbol>`: the root's presentation attributes move
/// onto the symbol and every id is prefixed with the icon name.
fn write_symbol(w: &mut XmlWriter, path: &Path) -> Result<(), TaskError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = read(path)?;
    let doc = parse(path, &text)?;
    let root = doc.root_element();
    let view_box = icon_view_box(root)
        .ok_or_else(|| TaskError::compile(path, "icon has no viewBox and no numeric size"))?;

    let prefix = format!("{name}-");
    let ids = IdPrefix::for_document(&prefix, &doc);
    w.start_element("symbol");
    w.write_attribute("id", &escape_attr(&name));
    w.write_attribute("viewBox", &view_box);
    write_attributes(w, root, &ids, ROOT_ONLY);
    write_children(w, root, &ids);
    w.end_element();
    Ok(())
}

/// Optimize every standalone SVG in the image directory.
pub fn optimize_standalone(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let images = &project.config.images;
    let icons = format!("{}/**", url_path(&images.icons_dir));
    let files = expand(&project.image_source(), &["**/*.svg"], &[icons])?;
    let build = project.image_build();

    let mut report = TaskReport::default();
    for file in &files {
        let optimized = optimize_file(&file.path)?;
        write_output(&build.join(&file.relative), optimized)?;
        report.written.push(images.dir.join(&file.relative));
    }
    Ok(report)
}

/// Combine the icon SVGs into one inline sprite.
///
/// A missing or empty icons directory is not an error; nothing is written.
pub fn build_sprite(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let images = &project.config.images;
    let icons = expand(
        &project.image_source().join(&images.icons_dir),
        &["*.svg"],
        &[] as &[&str],
    )?;
    if icons.is_empty() {
        return Ok(TaskReport::default().note("no icons, sprite skipped"));
    }

    let mut w = writer();
    w.start_element("svg");
    w.write_attribute("xmlns", SVG_NS);
    w.write_attribute("xmlns:xlink", XLINK_NS);
    for icon in &icons {
        write_symbol(&mut w, &icon.path)?;
    }
    write_output(&project.image_build().join(&images.sprite), w.end_document())?;

    Ok(TaskReport {
        written: vec![images.dir.join(&images.sprite)],
        notes: vec![format!("{} icons", icons.len())],
    })
}

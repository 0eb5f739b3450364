//! Extraction of file writes from the model's XML output.
//!
//! The model is asked for one document whose root holds `<file>` elements,
//! each with a path, a change description and the full content. Output may be
//! cut off by the token limit and arrive over several turns, and the model
//! does not always escape code correctly. The scanner therefore:
//!
//! - uses `quick_xml` only to find element boundaries outside fields; field
//!   values are cut from the raw input up to their literal closing tag, so
//!   markup, a lone `<` or a bare `&` inside `<content>` survives verbatim
//! - treats a `<` that does not open a well-formed tag as text
//! - unescapes field text itself, keeping the raw text when unescaping fails
//! - reports truncation (`NeedMore`) separately from broken nesting
//!   (`Malformed`)

use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use tracing::{debug, warn};

use super::types::{FileData, ParseResult, ParseStatus};

const FILE_TAG: &str = "file";
const PATH_TAGS: &[&str] = &["path", "file_path", "filepath", "relative_path"];
const CHANGES_TAGS: &[&str] = &["changes", "description", "desc", "change_description"];
const CONTENT_TAGS: &[&str] = &["content", "contents", "code", "file_content"];

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Path,
    Changes,
    Content,
}

impl FieldKind {
    fn from_tag(tag: &str) -> Option<Self> {
        if PATH_TAGS.contains(&tag) {
            Some(Self::Path)
        } else if CHANGES_TAGS.contains(&tag) {
            Some(Self::Changes)
        } else if CONTENT_TAGS.contains(&tag) {
            Some(Self::Content)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct PartialFile {
    path: Option<String>,
    changes: Option<String>,
    content: Option<String>,
}

impl PartialFile {
    fn set(&mut self, kind: FieldKind, value: String) {
        match kind {
            FieldKind::Path => self.path = Some(value.trim().to_string()),
            FieldKind::Changes => self.changes = Some(value.trim().to_string()),
            FieldKind::Content => self.content = Some(strip_leading_newline(&value).to_string()),
        }
    }

    fn finish(self) -> Option<FileData> {
        let path = self.path.filter(|p| !p.is_empty())?;
        Some(FileData {
            path,
            content: self.content.unwrap_or_default(),
            changes: self.changes.unwrap_or_default(),
        })
    }
}

enum Outcome {
    /// Input fully consumed without error.
    Complete { root_closed: bool },
    /// Input ended inside markup.
    Truncated { inside_file: bool },
    Malformed(String),
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn strip_leading_newline(value: &str) -> &str {
    value
        .strip_prefix("\r\n")
        .or_else(|| value.strip_prefix('\n'))
        .unwrap_or(value)
}

fn unescape_lenient(text: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape(text) {
        Ok(unescaped) => unescaped,
        Err(e) => {
            debug!("Keeping raw text, unescape failed: {}", e);
            Cow::Borrowed(text)
        }
    }
}

/// Decode a raw field slice: CDATA sections are kept verbatim, everything
/// else has XML entities resolved.
pub fn decode_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find(CDATA_OPEN) {
        out.push_str(&unescape_lenient(&rest[..open]));
        let after_open = &rest[open + CDATA_OPEN.len()..];
        match after_open.find(CDATA_CLOSE) {
            Some(close) => {
                out.push_str(&after_open[..close]);
                rest = &after_open[close + CDATA_CLOSE.len()..];
            }
            None => {
                out.push_str(after_open);
                rest = "";
            }
        }
    }
    out.push_str(&unescape_lenient(rest));

    out
}

fn open_reader(text: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;
    reader
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Length of a `<tag ...>` or `</tag>` token at the start of `text`.
fn tag_len(text: &str, opener: &str, tag: &str) -> Option<usize> {
    let after_name = text.strip_prefix(opener)?.strip_prefix(tag)?;
    match after_name.chars().next()? {
        '>' | '/' => {}
        c if c.is_whitespace() => {}
        _ => return None,
    }
    let close = after_name.find('>')?;
    Some(text.len() - after_name.len() + close + 1)
}

/// Find the closing tag of a field whose text starts at `from`.
///
/// Returns the offsets of the closing tag and of the byte after it, or `None`
/// if it has not arrived yet. Field text is code, so it is searched as raw
/// text: CDATA sections are skipped and same-named elements are balanced.
fn find_field_end(doc: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let mut pos = from;
    let mut depth = 0usize;

    loop {
        let lt = pos + doc.get(pos..)?.find('<')?;
        let rest = &doc[lt..];

        if rest.starts_with(CDATA_OPEN) {
            pos = lt + rest.find(CDATA_CLOSE)? + CDATA_CLOSE.len();
        } else if let Some(len) = tag_len(rest, "</", tag) {
            if depth == 0 {
                return Some((lt, lt + len));
            }
            depth -= 1;
            pos = lt + len;
        } else if let Some(len) = tag_len(rest, "<", tag) {
            if !rest[..len].ends_with("/>") {
                depth += 1;
            }
            pos = lt + len;
        } else {
            pos = lt + 1;
        }
    }
}

struct Scanner<'a> {
    doc: &'a str,
    files: Vec<FileData>,
    current: Option<PartialFile>,
    /// Open non-field elements, outermost first
    stack: Vec<String>,
    /// Stack depth at which the first `<file>` opened
    file_depth: Option<usize>,
}

impl<'a> Scanner<'a> {
    fn new(doc: &'a str) -> Self {
        Self {
            doc,
            files: Vec::new(),
            current: None,
            stack: Vec::new(),
            file_depth: None,
        }
    }

    fn inside_file(&self) -> bool {
        self.current.is_some()
    }

    /// Whether closing an element at `after` ends the document.
    fn root_closed(&self, after: usize) -> bool {
        match self.file_depth {
            // Zero for rootless files, which never close a document
            Some(depth) => self.stack.len() < depth,
            // An element closing before any <file> is preamble if files follow
            None => {
                self.stack.is_empty()
                    && !self
                        .doc
                        .get(after..)
                        .is_some_and(|rest| rest.contains("<file"))
            }
        }
    }

    fn run(&mut self) -> Outcome {
        let doc = self.doc;
        let mut offset = 0;
        let mut reader = open_reader(doc);

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(quick_xml::Error::Syntax(e)) => {
                    debug!("Response ends inside markup: {}", e);
                    return Outcome::Truncated {
                        inside_file: self.inside_file(),
                    };
                }
                Err(e) => return Outcome::Malformed(e.to_string()),
            };
            let after = offset + reader.buffer_position() as usize;

            match event {
                Event::Start(e) => {
                    let name = tag_name(e.name().as_ref());
                    let lt = after - e.len() - 2;
                    let raw = doc.get(lt + 1..after - 1).unwrap_or_default();

                    if !is_xml_name(&name) || raw.contains('<') {
                        // A lone `<` in text; resume right after it
                        offset = lt + 1;
                        reader = open_reader(doc.get(offset..).unwrap_or_default());
                        continue;
                    }

                    let parent_is_file = self.stack.last().map(String::as_str) == Some(FILE_TAG);
                    if let (true, Some(file), Some(kind)) =
                        (parent_is_file, self.current.as_mut(), FieldKind::from_tag(&name))
                    {
                        let Some((end, resume)) = find_field_end(doc, after, &name) else {
                            return Outcome::Truncated { inside_file: true };
                        };
                        file.set(kind, decode_field(doc.get(after..end).unwrap_or_default()));
                        offset = resume;
                        reader = open_reader(doc.get(offset..).unwrap_or_default());
                        continue;
                    }

                    if name == FILE_TAG && self.current.is_none() {
                        self.current = Some(PartialFile::default());
                        self.file_depth.get_or_insert(self.stack.len());
                    }
                    self.stack.push(name);
                }
                Event::Empty(e) => {
                    let name = tag_name(e.name().as_ref());
                    let parent_is_file = self.stack.last().map(String::as_str) == Some(FILE_TAG);
                    if let (true, Some(file), Some(kind)) =
                        (parent_is_file, self.current.as_mut(), FieldKind::from_tag(&name))
                    {
                        file.set(kind, String::new());
                    }
                }
                Event::End(e) => {
                    let name = tag_name(e.name().as_ref());
                    match self.stack.last() {
                        Some(top) if *top == name => {}
                        Some(top) => {
                            return Outcome::Malformed(format!(
                                "expected </{}>, found </{}>",
                                top, name
                            ))
                        }
                        // Stray closing tag in surrounding prose.
                        None => continue,
                    }
                    self.stack.pop();

                    let closes_file = name == FILE_TAG
                        && self.current.is_some()
                        && !self.stack.iter().any(|t| t == FILE_TAG);
                    if closes_file {
                        if let Some(partial) = self.current.take() {
                            match partial.finish() {
                                Some(file) => self.files.push(file),
                                None => warn!("Skipping <file> element without a path"),
                            }
                        }
                    }

                    if name != FILE_TAG && self.root_closed(after) {
                        return Outcome::Complete { root_closed: true };
                    }
                }
                Event::Eof => {
                    return if self.inside_file() || !self.stack.is_empty() {
                        Outcome::Truncated {
                            inside_file: self.inside_file(),
                        }
                    } else {
                        Outcome::Complete { root_closed: false }
                    };
                }
                _ => {}
            }
        }
    }
}

/// Parse the concatenation of every chunk received so far.
///
/// With `force_parse` the parser gives up waiting for more input: complete
/// `<file>` elements are returned and a trailing incomplete one is dropped.
pub fn parse(chunks: &[String], force_parse: bool) -> ParseResult {
    let doc = chunks.concat();
    let mut scanner = Scanner::new(&doc);
    let outcome = scanner.run();
    let files = scanner.files;

    match outcome {
        Outcome::Complete { root_closed } => ParseResult {
            finished: root_closed,
            files: Some(files),
            status: ParseStatus::Complete,
        },
        Outcome::Truncated { inside_file } => {
            if force_parse {
                if inside_file {
                    debug!("Discarding incomplete trailing <file> element");
                }
                ParseResult {
                    finished: false,
                    files: Some(files),
                    status: ParseStatus::NeedMore,
                }
            } else {
                ParseResult {
                    finished: false,
                    files: if inside_file { None } else { Some(files) },
                    status: ParseStatus::NeedMore,
                }
            }
        }
        Outcome::Malformed(reason) => {
            warn!("Malformed response markup: {}", reason);
            ParseResult {
                finished: false,
                files: None,
                status: ParseStatus::Malformed,
            }
        }
    }
}

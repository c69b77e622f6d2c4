#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use smart_pdf_md::engine::{ConversionResult, ConvertRequest, DepCheck, Engine};
use smart_pdf_md::error::{EngineFailure, ErrorKind};
use smart_pdf_md::slice::PageRange;
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

/// A line long enough to make its page textual under default thresholds.
pub fn prose() -> String {
    "lorem ipsum dolor sit amet ".repeat(10)
}

/// Writes a PDF with one page per entry; `""` is a blank page. Lines within
/// an entry become separate text objects.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = Vec::new();
        for (i, line) in text.lines().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new(
                "Td",
                vec![40.into(), (780 - 14 * i as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

pub fn blank_pdf(path: &Path, pages: usize) {
    write_pdf(path, &vec![""; pages]);
}

pub fn textual_pdf(path: &Path, pages: usize) {
    let line = prose();
    write_pdf(path, &vec![line.as_str(); pages]);
}

pub fn not_a_pdf(path: &Path) {
    std::fs::write(path, b"this is not a pdf at all").unwrap();
}

pub type Calls = Rc<RefCell<Vec<(String, Option<PageRange>)>>>;

/// Records every invocation and appends a line to `<stem>.md` on success.
pub struct Recorder {
    pub name: String,
    pub calls: Calls,
    /// Fail any slice spanning more pages than this.
    pub fail_if_wider: Option<u32>,
    /// Fail any slice starting at or after this page.
    pub fail_from: Option<u32>,
    /// Fail any document whose file name contains this.
    pub fail_on_name: Option<String>,
    pub fail_kind: ErrorKind,
}

impl Recorder {
    pub fn new(name: &str, calls: &Calls) -> Self {
        Self {
            name: name.to_string(),
            calls: calls.clone(),
            fail_if_wider: None,
            fail_from: None,
            fail_on_name: None,
            fail_kind: ErrorKind::EngineFailed,
        }
    }

    fn fails(&self, req: &ConvertRequest) -> bool {
        if let Some(needle) = &self.fail_on_name {
            if req.input_pdf.to_string_lossy().contains(needle.as_str()) {
                return true;
            }
        }
        match req.range {
            Some(r) => {
                self.fail_if_wider.is_some_and(|w| r.pages() > w)
                    || self.fail_from.is_some_and(|s| r.start >= s)
            }
            None => false,
        }
    }
}

impl Engine for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, req: &ConvertRequest) -> ConversionResult {
        self.calls.borrow_mut().push((self.name.clone(), req.range));
        if self.fails(req) {
            return ConversionResult::failure(EngineFailure::new(self.fail_kind, "simulated"));
        }
        let mut fh = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(req.output_path("md"))
            .unwrap();
        writeln!(fh, "{} {:?}", self.name, req.range).unwrap();
        ConversionResult::success(req.range.map(|r| r.pages()).unwrap_or(0))
    }

    fn doctor(&self) -> DepCheck {
        DepCheck {
            engine: self.name.clone(),
            ok: true,
            detail: "fake".into(),
        }
    }
}

pub struct Panicker;

impl Engine for Panicker {
    fn name(&self) -> &str {
        "panicker"
    }

    fn convert(&self, _req: &ConvertRequest) -> ConversionResult {
        panic!("engine blew up");
    }

    fn doctor(&self) -> DepCheck {
        DepCheck {
            engine: "panicker".into(),
            ok: true,
            detail: "fake".into(),
        }
    }
}

pub fn new_calls() -> Calls {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn ranges(calls: &Calls) -> Vec<PageRange> {
    calls.borrow().iter().filter_map(|(_, r)| *r).collect()
}

pub fn names(calls: &Calls) -> Vec<String> {
    calls.borrow().iter().map(|(n, _)| n.clone()).collect()
}

//! Extractor behaviour against scripted readers and real files on disk.

use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use shared::config::ExtractionLimits;
use tempfile::tempdir;
use text_extraction::{
    error::Result, DocumentReader, ExtractionError, Extractor, FileReader, OpenedDocument,
    PagedSource, TextUnit,
};

struct FakePages {
    pages: usize,
}

impl PagedSource for FakePages {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn text_for_pages(&mut self, pages: Range<usize>) -> Result<String> {
        Ok(format!("pages {}-{}", pages.start + 1, pages.end))
    }
}

#[derive(Default)]
struct CountingReader {
    pages: usize,
    opens: AtomicUsize,
}

impl DocumentReader for CountingReader {
    fn open(&self, _storage_ref: &str) -> Result<OpenedDocument> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(OpenedDocument::Paginated(Box::new(FakePages { pages: self.pages })))
    }
}

fn limits() -> ExtractionLimits {
    ExtractionLimits {
        pages_per_chunk: 20,
        max_pages: 500,
        max_chunks: 25,
        max_text_chars: 100_000,
    }
}

fn counting(pages: usize) -> (Arc<CountingReader>, Extractor) {
    let reader = Arc::new(CountingReader {
        pages,
        ..Default::default()
    });
    let extractor = Extractor::new(reader.clone(), limits());
    (reader, extractor)
}

#[tokio::test]
async fn short_document_is_one_unit() {
    let (reader, extractor) = counting(20);
    let unit = extractor.extract("doc.pdf").await.unwrap();
    assert_eq!(unit, TextUnit::Single("pages 1-20".into()));
    assert_eq!(reader.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn long_document_is_chunked_with_a_single_open() {
    let (reader, extractor) = counting(45);
    let unit = extractor.extract("doc.pdf").await.unwrap();
    assert_eq!(
        unit,
        TextUnit::Chunks(vec![
            "pages 1-20".into(),
            "pages 21-40".into(),
            "pages 41-45".into(),
        ])
    );
    assert_eq!(reader.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn page_cap_rejects_before_reading_text() {
    let (_, extractor) = counting(501);
    let err = extractor.extract("doc.pdf").await.unwrap_err();
    assert!(matches!(err, ExtractionError::TooManyPages { pages: 501, max: 500 }));
    assert!(err.is_guardrail());
}

#[tokio::test]
async fn chunk_cap_is_a_guardrail() {
    let reader = Arc::new(CountingReader {
        pages: 100,
        ..Default::default()
    });
    let extractor = Extractor::new(
        reader,
        ExtractionLimits {
            pages_per_chunk: 10,
            max_chunks: 5,
            ..limits()
        },
    );
    let err = extractor.extract("doc.pdf").await.unwrap_err();
    assert!(matches!(err, ExtractionError::TooManyChunks { chunks: 10, max: 5 }));
    assert!(err.is_guardrail());
}

#[tokio::test]
async fn long_text_file_is_truncated_not_rejected() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("big.txt"), "a".repeat(150)).unwrap();
    let extractor = Extractor::new(
        Arc::new(FileReader::new(dir.path())),
        ExtractionLimits {
            max_text_chars: 100,
            ..limits()
        },
    );
    match extractor.extract("big.txt").await.unwrap() {
        TextUnit::Single(text) => assert_eq!(text.len(), 100),
        other => panic!("unexpected unit: {other:?}"),
    }
}

#[tokio::test]
async fn blank_text_file_extracts_as_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("blank.txt"), "  \n\n ").unwrap();
    let extractor = Extractor::new(Arc::new(FileReader::new(dir.path())), limits());
    let unit = extractor.extract("blank.txt").await.unwrap();
    assert!(unit.has_no_text());
}

#[tokio::test]
async fn missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let extractor = Extractor::new(Arc::new(FileReader::new(dir.path())), limits());
    let err = extractor.extract("gone.txt").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Io(_)));
    assert!(!err.is_guardrail());
}

#[tokio::test]
async fn docx_paragraphs_become_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.docx");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file("word/document.xml", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?><w:document><w:body><w:p><w:r><w:t>Internal memo</w:t></w:r></w:p><w:p><w:r><w:t>Do not share</w:t></w:r></w:p></w:body></w:document>"#,
    )
    .unwrap();
    zip.finish().unwrap();

    let extractor = Extractor::new(Arc::new(FileReader::new(dir.path())), limits());
    let unit = extractor.extract("memo.docx").await.unwrap();
    assert_eq!(unit, TextUnit::Single("Internal memo\nDo not share\n".into()));
}

fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(
        dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
    );
    let resources_id = doc.add_object(dictionary! { "Font" => dictionary! { "F1" => font_id } });
    let mut kids: Vec<Object> = Vec::with_capacity(pages);
    for n in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }
    let tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(tree));
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save test pdf");
}

#[tokio::test]
async fn pdf_chunks_follow_page_tree() {
    let dir = tempdir().unwrap();
    write_pdf(&dir.path().join("short.pdf"), 3);
    write_pdf(&dir.path().join("long.pdf"), 7);
    let extractor = Extractor::new(
        Arc::new(FileReader::new(dir.path())),
        ExtractionLimits {
            pages_per_chunk: 3,
            ..limits()
        },
    );

    assert_eq!(extractor.extract("short.pdf").await.unwrap().unit_count(), 1);
    assert_eq!(extractor.extract("long.pdf").await.unwrap().unit_count(), 3);
}

//! EPUB 3 writer. Consumes a completed `Book` and writes mimetype, container,
//! OPF, nested nav (optional NCX), title page, optional visible TOC page,
//! stylesheet, and one XHTML file per chapter.

use crate::model::Book;
use crate::render::{self, RenderError};
use std::io::{Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";

const BOOK_CSS: &[u8] = b"body { font-family: Times, \"Times New Roman\", serif; }\nh1 { text-align: center; }\ncode { font-family: monospace; white-space: pre-wrap; display: block; margin: 1em 2em; }\n";

/// Errors from the EPUB writer.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book has no authors.")]
    EmptyAuthors,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Cannot write EPUB: chapter '{chapter}' has no body (incomplete generation; rerun with --resume).")]
    MissingBody { chapter: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// One chapter file to emit, flattened from the section tree.
struct FlatChapter {
    file: String,
    html: String,
}

/// One nav entry: a leaf section links to its file; a grouped section labels
/// its subsections.
struct NavEntry {
    title: String,
    href: Option<String>,
    children: Vec<(String, String)>,
}

/// Write a completed [Book](crate::model::Book) to an EPUB 3 file.
///
/// Set `include_ncx` to also emit toc.ncx for legacy readers. Set
/// `include_toc_page` to insert a visible table-of-contents page after the
/// title page. Output is intended to pass epubcheck.
pub fn write_epub(
    book: &Book,
    path: &Path,
    include_ncx: bool,
    include_toc_page: bool,
) -> Result<(), EpubError> {
    validate_book(book)?;
    let (chapters, nav) = flatten_chapters(book)?;

    let path = path.to_path_buf();
    let file = std::fs::File::create(&path).map_err(|e| EpubError::CreateFile {
        path: path.clone(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype must be the first entry and stored uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(book, &chapters, include_ncx, include_toc_page, &mut zip, options_deflate)?;
    write_nav_xhtml(&nav, &mut zip, options_deflate)?;
    if include_ncx {
        write_ncx(book, &nav, &mut zip, options_deflate)?;
    }
    write_title_page(book, &mut zip, options_deflate)?;
    if include_toc_page {
        write_toc_page_xhtml(&nav, &mut zip, options_deflate)?;
    }

    zip.start_file(format!("{}style/book.css", OEBPS_PREFIX), options_deflate)?;
    zip.write_all(BOOK_CSS)?;

    for ch in &chapters {
        zip.start_file(format!("{}{}", OEBPS_PREFIX, ch.file), options_deflate)?;
        zip.write_all(chapter_xhtml(&ch.html).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn validate_book(book: &Book) -> Result<(), EpubError> {
    if book.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if book.authors.iter().all(|a| a.trim().is_empty()) {
        return Err(EpubError::EmptyAuthors);
    }
    if book.sections.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

/// Flatten the section tree into chapter files plus the nav structure.
/// Chapter filenames are index-prefixed slugs so duplicates cannot collide.
fn flatten_chapters(book: &Book) -> Result<(Vec<FlatChapter>, Vec<NavEntry>), EpubError> {
    let mut chapters = Vec::new();
    let mut nav = Vec::new();
    let mut n = 0u32;
    for section in &book.sections {
        if section.subsections.is_empty() {
            let body = section.body.as_deref().ok_or_else(|| EpubError::MissingBody {
                chapter: section.title.clone(),
            })?;
            n += 1;
            let file = chapter_file(n, &section.title);
            let html = render::chapter_content(&section.title, None, body)?;
            nav.push(NavEntry {
                title: section.title.clone(),
                href: Some(file.clone()),
                children: Vec::new(),
            });
            chapters.push(FlatChapter { file, html });
        } else {
            let mut children = Vec::new();
            for (i, sub) in section.subsections.iter().enumerate() {
                let body = sub.body.as_deref().ok_or_else(|| EpubError::MissingBody {
                    chapter: format!("{} / {}", section.title, sub.title),
                })?;
                n += 1;
                let file = chapter_file(n, &sub.title);
                let html = render::chapter_content(&section.title, Some((&sub.title, i)), body)?;
                children.push((sub.title.clone(), file.clone()));
                chapters.push(FlatChapter { file, html });
            }
            nav.push(NavEntry {
                title: section.title.clone(),
                href: None,
                children,
            });
        }
    }
    Ok((chapters, nav))
}

fn chapter_file(n: u32, title: &str) -> String {
    let slug = render::chapter_filename(title);
    let slug = if slug.is_empty() { "chapter".to_string() } else { slug };
    format!("{:02}-{}.xhtml", n, slug)
}

fn identifier(book: &Book) -> String {
    let slug = render::chapter_filename(&book.title);
    let slug = if slug.is_empty() { "book".to_string() } else { slug };
    format!("urn:bookforge:{}", slug)
}

fn write_opf(
    book: &Book,
    chapters: &[FlatChapter],
    include_ncx: bool,
    include_toc_page: bool,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let id = xml_escape(&identifier(book));
    let title = xml_escape(&book.title);
    let language = xml_escape(&book.language);
    let subject = xml_escape(&book.topic);

    let mut creators = String::new();
    for author in book.authors.iter().filter(|a| !a.trim().is_empty()) {
        creators.push_str(&format!("    <dc:creator>{}</dc:creator>\n", xml_escape(author)));
    }

    let mut manifest = String::from(
        r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
  <item id="css" href="style/book.css" media-type="text/css"/>
  <item id="title-page" href="title.xhtml" media-type="application/xhtml+xml"/>
"#,
    );
    if include_ncx {
        manifest.push_str(
            r#"  <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
        );
    }
    if include_toc_page {
        manifest.push_str(
            r#"  <item id="toc-page" href="toc.xhtml" media-type="application/xhtml+xml"/>
"#,
        );
    }
    for (i, ch) in chapters.iter().enumerate() {
        manifest.push_str(&format!(
            "  <item id=\"chapter-{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            i + 1,
            ch.file
        ));
    }

    // Spine: title page, optional toc page, then chapters in TOC order.
    let mut spine = String::from(r#"  <itemref idref="title-page"/>"#);
    if include_toc_page {
        spine.push_str("\n  <itemref idref=\"toc-page\"/>");
    }
    for (i, _) in chapters.iter().enumerate() {
        spine.push_str(&format!("\n  <itemref idref=\"chapter-{}\"/>", i + 1));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0"
  xmlns:dc="http://purl.org/dc/elements/1.1/">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
{creators}    <dc:language>{language}</dc:language>
    <dc:subject>{subject}</dc:subject>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}
  </spine>
</package>
"#,
        id = id,
        title = title,
        creators = creators,
        language = language,
        subject = subject,
        manifest = manifest,
        spine = spine
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

/// Nested nav list shared by nav.xhtml and the visible TOC page.
fn nav_list(nav: &[NavEntry]) -> String {
    let mut items = String::new();
    for entry in nav {
        let label = render::escape_text(&entry.title);
        match &entry.href {
            Some(href) => {
                items.push_str(&format!("    <li><a href=\"{}\">{}</a></li>\n", href, label));
            }
            None => {
                items.push_str(&format!("    <li><span>{}</span>\n      <ol>\n", label));
                for (title, href) in &entry.children {
                    items.push_str(&format!(
                        "        <li><a href=\"{}\">{}</a></li>\n",
                        href,
                        render::escape_text(title)
                    ));
                }
                items.push_str("      </ol>\n    </li>\n");
            }
        }
    }
    items
}

fn write_nav_xhtml(
    nav: &[NavEntry],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let doc = format!(
        r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <meta charset="UTF-8"/>
  <title>Table of Contents</title>
</head>
<body>
  <nav epub:type="toc">
    <h1>Contents</h1>
    <ol>
{}    </ol>
  </nav>
</body>
</html>
"#,
        nav_list(nav)
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(doc.as_bytes())?;
    Ok(())
}

/// Visible table-of-contents page for the reading spine, after the title page.
fn write_toc_page_xhtml(
    nav: &[NavEntry],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let doc = format!(
        r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>Table of Contents</title>
  <link rel="stylesheet" type="text/css" href="style/book.css"/>
</head>
<body>
  <h1>Table of Contents</h1>
  <ol>
{}  </ol>
</body>
</html>
"#,
        nav_list(nav)
    );
    zip.start_file(format!("{}toc.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(doc.as_bytes())?;
    Ok(())
}

fn write_ncx(
    book: &Book,
    nav: &[NavEntry],
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    let mut order = 0u32;
    for entry in nav {
        order += 1;
        let section_order = order;
        let label = xml_escape(&entry.title);
        // NCX requires a content src; a grouped section points at its first subsection.
        let src = entry
            .href
            .clone()
            .or_else(|| entry.children.first().map(|(_, href)| href.clone()))
            .unwrap_or_default();
        nav_points.push_str(&format!(
            "    <navPoint id=\"navpoint-{o}\" playOrder=\"{o}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{}\"/>\n",
            label,
            src,
            o = section_order
        ));
        for (title, href) in &entry.children {
            order += 1;
            nav_points.push_str(&format!(
                "      <navPoint id=\"navpoint-{o}\" playOrder=\"{o}\">\n        <navLabel><text>{}</text></navLabel>\n        <content src=\"{}\"/>\n      </navPoint>\n",
                xml_escape(title),
                href,
                o = order
            ));
        }
        nav_points.push_str("    </navPoint>\n");
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
        xml_escape(&identifier(book)),
        xml_escape(&book.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

/// Title page: book title plus authors, standing in for a cover.
fn write_title_page(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let title = render::escape_text(&book.title);
    let authors = book
        .authors
        .iter()
        .filter(|a| !a.trim().is_empty())
        .map(|a| render::escape_text(a))
        .collect::<Vec<_>>()
        .join(", ");
    let doc = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style/book.css"/>
</head>
<body>
  <div style="text-align: center; margin-top: 3em;">
    <h1 style="font-size: 1.5em;">{title}</h1>
    <p style="margin-top: 1em;">{authors}</p>
  </div>
</body>
</html>
"#,
        title = title,
        authors = authors
    );
    zip.start_file(format!("{}title.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(doc.as_bytes())?;
    Ok(())
}

fn chapter_xhtml(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta charset="UTF-8"/>
  <title>Chapter</title>
  <link rel="stylesheet" type="text/css" href="style/book.css"/>
</head>
<body>
{}
</body>
</html>
"#,
        content
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Section, Subsection};
    use std::io::Read;
    use zip::read::ZipArchive;

    fn minimal_book() -> Book {
        Book {
            title: "Test Book".to_string(),
            topic: "testing".to_string(),
            authors: vec!["Test Author".to_string()],
            language: "en".to_string(),
            toc: None,
            sections: vec![Section {
                title: "Chapter One".to_string(),
                body: Some("First paragraph.\n\nSecond paragraph.".to_string()),
                subsections: Vec::new(),
            }],
        }
    }

    fn nested_book() -> Book {
        let mut book = minimal_book();
        book.sections.push(Section {
            title: "Chapter Two".to_string(),
            body: None,
            subsections: vec![
                Subsection {
                    title: "Part A".to_string(),
                    body: Some("Alpha.".to_string()),
                },
                Subsection {
                    title: "Part B".to_string(),
                    body: Some("Beta.".to_string()),
                },
            ],
        });
        book
    }

    fn read_entry(zip: &mut ZipArchive<std::fs::File>, name: &str) -> String {
        let mut s = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn validate_rejects_empty_title() {
        let mut book = minimal_book();
        book.title.clear();
        let path = std::env::temp_dir().join("bookforge_epub_void.epub");
        assert!(matches!(
            write_epub(&book, &path, false, true),
            Err(EpubError::EmptyTitle)
        ));
    }

    #[test]
    fn validate_rejects_blank_authors() {
        let mut book = minimal_book();
        book.authors = vec!["  ".to_string()];
        let path = std::env::temp_dir().join("bookforge_epub_void.epub");
        assert!(matches!(
            write_epub(&book, &path, false, true),
            Err(EpubError::EmptyAuthors)
        ));
    }

    #[test]
    fn validate_rejects_no_sections() {
        let mut book = minimal_book();
        book.sections.clear();
        let path = std::env::temp_dir().join("bookforge_epub_void.epub");
        assert!(matches!(
            write_epub(&book, &path, false, true),
            Err(EpubError::NoChapters)
        ));
    }

    #[test]
    fn missing_body_is_rejected_with_chapter_name() {
        let mut book = minimal_book();
        book.sections[0].body = None;
        let path = std::env::temp_dir().join("bookforge_epub_void.epub");
        match write_epub(&book, &path, false, true) {
            Err(EpubError::MissingBody { chapter }) => assert_eq!(chapter, "Chapter One"),
            other => panic!("expected MissingBody, got {:?}", other.err()),
        }
    }

    #[test]
    fn write_epub_produces_expected_entries() {
        let book = minimal_book();
        let path = std::env::temp_dir().join("bookforge_epub_test_basic.epub");
        write_epub(&book, &path, false, true).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let zip = ZipArchive::new(file).unwrap();
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        assert!(names.contains(&"mimetype".to_string()));
        assert!(names.contains(&"META-INF/container.xml".to_string()));
        assert!(names.contains(&"OEBPS/content.opf".to_string()));
        assert!(names.contains(&"OEBPS/nav.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/title.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/toc.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/style/book.css".to_string()));
        assert!(names.contains(&"OEBPS/01-chapter_one.xhtml".to_string()));
        assert!(!names.iter().any(|n| n == "OEBPS/toc.ncx"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_epub_with_ncx_includes_toc_ncx() {
        let book = nested_book();
        let path = std::env::temp_dir().join("bookforge_epub_test_ncx.epub");
        write_epub(&book, &path, true, true).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let ncx = read_entry(&mut zip, "OEBPS/toc.ncx");
        assert!(ncx.contains("navpoint-1"));
        // Grouped section points at its first subsection file.
        assert!(ncx.contains("02-part_a.xhtml"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_epub_without_toc_page_omits_toc_xhtml() {
        let book = minimal_book();
        let path = std::env::temp_dir().join("bookforge_epub_test_no_toc.epub");
        write_epub(&book, &path, false, false).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        assert!(!names.iter().any(|n| n == "OEBPS/toc.xhtml"));
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(!opf.contains("toc-page"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn opf_carries_metadata() {
        let mut book = nested_book();
        book.authors = vec!["A. One".to_string(), "B. Two".to_string()];
        book.language = "fr".to_string();
        let path = std::env::temp_dir().join("bookforge_epub_test_opf.epub");
        write_epub(&book, &path, false, true).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Test Book</dc:title>"));
        assert!(opf.contains("<dc:creator>A. One</dc:creator>"));
        assert!(opf.contains("<dc:creator>B. Two</dc:creator>"));
        assert!(opf.contains("<dc:language>fr</dc:language>"));
        assert!(opf.contains("<dc:subject>testing</dc:subject>"));
        assert!(opf.contains("version=\"3.0\""));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn nav_nests_subsections_under_section_label() {
        let book = nested_book();
        let path = std::env::temp_dir().join("bookforge_epub_test_nav.epub");
        write_epub(&book, &path, false, true).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let nav = read_entry(&mut zip, "OEBPS/nav.xhtml");
        assert!(nav.contains("<span>Chapter Two</span>"));
        assert!(nav.contains("02-part_a.xhtml"));
        assert!(nav.contains("03-part_b.xhtml"));
        assert!(nav.contains("01-chapter_one.xhtml"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn first_subsection_chapter_carries_section_heading() {
        let book = nested_book();
        let path = std::env::temp_dir().join("bookforge_epub_test_headers.epub");
        write_epub(&book, &path, false, true).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let first = read_entry(&mut zip, "OEBPS/02-part_a.xhtml");
        assert!(first.contains("<h1>Chapter Two</h1>"));
        assert!(first.contains("<h2>Part A</h2>"));
        let second = read_entry(&mut zip, "OEBPS/03-part_b.xhtml");
        assert!(!second.contains("<h1>"));
        assert!(second.contains("<h2>Part B</h2>"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unbalanced_code_fences_surface_as_render_error() {
        let mut book = minimal_book();
        book.sections[0].body = Some("bad ``` fence".to_string());
        let path = std::env::temp_dir().join("bookforge_epub_test_fence.epub");
        assert!(matches!(
            write_epub(&book, &path, false, true),
            Err(EpubError::Render(_))
        ));
    }
}

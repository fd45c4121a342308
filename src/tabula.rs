//! Table detection through the tabula-java runtime
//!
//! Each detection is one `java -jar tabula.jar` process writing JSON to
//! stdout.

use crate::document::SourceDocument;
use crate::options::ExtractionOptions;
use crate::table::Table;
use crate::tables::TableDetector;
use crate::PdfError;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// How to launch tabula
#[derive(Debug, Clone)]
pub struct TabulaConfig {
    /// Java executable
    pub java: PathBuf,
    /// tabula-java standalone jar
    pub jar: PathBuf,
    /// Options passed to the JVM before `-jar`
    pub java_options: Vec<String>,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: PathBuf::from("tabula.jar"),
            java_options: vec!["-Dfile.encoding=UTF8".into(), "-Xmx4g".into()],
        }
    }
}

/// A table in tabula's JSON output
#[derive(Deserialize, Debug)]
struct JsonTable {
    #[serde(default)]
    extraction_method: String,
    data: Vec<Vec<JsonCell>>,
}

/// A single cell in tabula's JSON output
#[derive(Deserialize, Debug)]
struct JsonCell {
    text: String,
}

/// A page handed to tabula: the staged file and a 1-indexed page number
#[derive(Debug, Clone)]
pub struct TabulaPage {
    pdf: PathBuf,
    number: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TabulaDetector {
    config: TabulaConfig,
}

impl TabulaDetector {
    pub fn new(config: TabulaConfig) -> Self {
        Self { config }
    }

    /// Output of `java -version`
    pub fn java_version(&self) -> Result<String, PdfError> {
        let output = Command::new(&self.config.java)
            .arg("-version")
            .output()
            .map_err(|e| {
                PdfError::Tabula(format!(
                    "cannot run {}: {}",
                    self.config.java.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(PdfError::Tabula(format!(
                "{} -version exited with {}",
                self.config.java.display(),
                output.status
            )));
        }
        // The JVM prints its version on stderr
        let mut version = String::from_utf8_lossy(&output.stderr).into_owned();
        version.push_str(&String::from_utf8_lossy(&output.stdout));
        Ok(version.trim().to_string())
    }

    fn command(&self, pdf: &Path, page: u32, options: ExtractionOptions) -> Command {
        let mut cmd = Command::new(&self.config.java);
        cmd.args(&self.config.java_options)
            .arg("-jar")
            .arg(&self.config.jar)
            .args(["--pages", &page.to_string(), "--format", "JSON"]);
        if options.lattice {
            cmd.arg("--lattice");
        }
        if options.stream {
            cmd.arg("--stream");
        }
        if options.guess {
            cmd.arg("--guess");
        }
        cmd.arg(pdf);
        cmd
    }
}

impl TableDetector for TabulaDetector {
    type Page = TabulaPage;

    fn prepare(&self) -> Result<(), PdfError> {
        if !self.config.jar.is_file() {
            return Err(PdfError::Tabula(format!(
                "tabula jar not found at {}",
                self.config.jar.display()
            )));
        }
        info!("Java version: {}", self.java_version()?);
        Ok(())
    }

    fn load_page(&self, source: &SourceDocument, page: u32) -> Result<TabulaPage, PdfError> {
        if page > source.page_count() {
            return Err(PdfError::PageOutOfRange {
                page,
                page_count: source.page_count(),
            });
        }
        Ok(TabulaPage {
            pdf: source.path().to_path_buf(),
            number: page,
        })
    }

    fn detect(&self, page: &TabulaPage, options: ExtractionOptions) -> Result<Vec<Table>, PdfError> {
        let output = self
            .command(&page.pdf, page.number, options)
            .output()
            .map_err(|e| PdfError::Tabula(format!("cannot launch tabula: {}", e)))?;
        if !output.status.success() {
            return Err(PdfError::Tabula(format!(
                "tabula exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_tables(&output.stdout, page.number)
    }
}

/// Convert tabula's JSON table list into tables for `page`
pub fn parse_tables(json: &[u8], page: u32) -> Result<Vec<Table>, PdfError> {
    let tables: Vec<JsonTable> = serde_json::from_slice(json)
        .map_err(|e| PdfError::Tabula(format!("malformed tabula output: {}", e)))?;

    Ok(tables
        .into_iter()
        .map(|table| {
            debug!(
                "page {}: {} table with {} rows",
                page,
                table.extraction_method,
                table.data.len()
            );
            if table.data.is_empty() {
                return Table::headerless(page, Vec::new());
            }
            let grid = table
                .data
                .into_iter()
                .map(|row| row.into_iter().map(|cell| cell.text.replace('\r', " ")).collect())
                .collect();
            Table::from_grid(page, grid)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "extraction_method": "lattice",
            "page_number": 2,
            "top": 100.5, "left": 50.0, "width": 300.0, "height": 80.0,
            "right": 350.0, "bottom": 180.5,
            "data": [
                [{"top": 100.5, "left": 50.0, "width": 150.0, "height": 20.0, "text": "Item"},
                 {"top": 100.5, "left": 200.0, "width": 150.0, "height": 20.0, "text": "Amount"}],
                [{"top": 120.5, "left": 50.0, "width": 150.0, "height": 20.0, "text": "Cement\rbags"},
                 {"top": 120.5, "left": 200.0, "width": 150.0, "height": 20.0, "text": "40"}]
            ]
        },
        {
            "extraction_method": "lattice",
            "page_number": 2,
            "top": 0, "left": 0, "width": 0, "height": 0, "right": 0, "bottom": 0,
            "data": []
        }
    ]"#;

    #[test]
    fn test_parse_tables() {
        let tables = parse_tables(SAMPLE.as_bytes(), 2).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].page, 2);
        assert_eq!(tables[0].header.as_deref().unwrap(), &["Item", "Amount"]);
        assert_eq!(tables[0].rows, vec![vec!["Cement bags".to_string(), "40".to_string()]]);
        assert!(tables[1].is_empty());
        assert_eq!(tables[1].header, None);
    }

    #[test]
    fn test_parse_tables_malformed() {
        assert!(matches!(
            parse_tables(b"Error: no such file", 1),
            Err(PdfError::Tabula(_))
        ));
    }

    #[test]
    fn test_command_flags() {
        let detector = TabulaDetector::default();
        let cmd = detector.command(
            Path::new("/tmp/in.pdf"),
            3,
            ExtractionOptions::new(false, true, false),
        );
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-Dfile.encoding=UTF8",
                "-Xmx4g",
                "-jar",
                "tabula.jar",
                "--pages",
                "3",
                "--format",
                "JSON",
                "--stream",
                "/tmp/in.pdf"
            ]
        );
    }

    /// One-page PDF with an empty content stream
    fn one_page_pdf(dir: &Path) -> SourceDocument {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join("site.pdf");
        doc.save(&path).unwrap();
        SourceDocument::open(&path).unwrap()
    }

    /// Detector whose "java" is `sh` running `script`; the tabula arguments
    /// become the script's positional parameters
    fn shell_detector(dir: &Path, script: &str) -> TabulaDetector {
        let script_path = dir.join("tabula.sh");
        std::fs::write(&script_path, script).unwrap();
        TabulaDetector::new(TabulaConfig {
            java: PathBuf::from("sh"),
            jar: PathBuf::from("tabula.jar"),
            java_options: vec![script_path.to_string_lossy().into_owned()],
        })
    }

    #[test]
    fn test_detect_missing_java() {
        let dir = tempfile::tempdir().unwrap();
        let source = one_page_pdf(dir.path());
        let detector = TabulaDetector::new(TabulaConfig {
            java: PathBuf::from("/nonexistent/bin/java"),
            ..TabulaConfig::default()
        });

        let page = detector.load_page(&source, 1).unwrap();
        let err = detector.detect(&page, ExtractionOptions::default()).unwrap_err();
        assert!(matches!(err, PdfError::Tabula(ref msg) if msg.starts_with("cannot launch tabula")));
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_failing_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let source = one_page_pdf(dir.path());
        let detector = shell_detector(dir.path(), "echo 'Error: page 1 unreadable' >&2\nexit 1\n");

        let page = detector.load_page(&source, 1).unwrap();
        let err = detector.detect(&page, ExtractionOptions::default()).unwrap_err();
        match err {
            PdfError::Tabula(msg) => assert!(msg.contains("page 1 unreadable"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_parses_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let source = one_page_pdf(dir.path());
        // Answers with a table only when called with the staged file and page 1
        let script = format!(
            "case \"$*\" in\n  *'--pages 1 '*'{}') ;;\n  *) exit 3 ;;\nesac\necho '{}'\n",
            source.path().display(),
            r#"[{"extraction_method":"stream","data":[[{"text":"Item"},{"text":"Qty"}],[{"text":"Sand"},{"text":"12"}]]}]"#
        );
        let detector = shell_detector(dir.path(), &script);

        let page = detector.load_page(&source, 1).unwrap();
        let tables = detector
            .detect(&page, ExtractionOptions::new(false, true, true))
            .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 1);
        assert_eq!(tables[0].header.as_deref().unwrap(), &["Item", "Qty"]);
        assert_eq!(tables[0].rows, vec![vec!["Sand".to_string(), "12".to_string()]]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tabula_gives_page_no_tables() {
        use crate::fallback::extract_page_tables;
        use crate::options::FallbackPolicy;

        let dir = tempfile::tempdir().unwrap();
        let source = one_page_pdf(dir.path());
        let detector = shell_detector(dir.path(), "exit 1\n");
        let tables = extract_page_tables(
            &detector,
            &source,
            1,
            FallbackPolicy::ThreeTier(ExtractionOptions::default()),
        );
        assert!(tables.is_empty());
    }

    #[test]
    fn test_load_page_past_end() {
        let dir = tempfile::tempdir().unwrap();
        let source = one_page_pdf(dir.path());
        assert!(matches!(
            TabulaDetector::default().load_page(&source, 2),
            Err(PdfError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }

    #[test]
    fn test_prepare_requires_jar() {
        let detector = TabulaDetector::new(TabulaConfig {
            jar: PathBuf::from("/nonexistent/tabula.jar"),
            ..TabulaConfig::default()
        });
        assert!(matches!(detector.prepare(), Err(PdfError::Tabula(_))));
    }
}

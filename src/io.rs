use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::panic;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use phylotree::tree::Tree;

use crate::distances::TreeDistances;
use crate::error::{panic_message, Result, TreeDistError};

/// Column names of the result table.
pub const HEADER: [&str; 5] = ["id", "rf", "norm_rf", "weighted_rf", "branch_score"];

/// Source of parsed trees for the batch pipeline.
///
/// Implementations are shared by every worker, so they must be `Send + Sync`.
pub trait TreeLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Tree>;
}

/// Loads one Newick tree per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewickLoader;

impl TreeLoader for NewickLoader {
    fn load(&self, path: &Path) -> Result<Tree> {
        let content = fs::read_to_string(path).map_err(|source| TreeDistError::ReadTree {
            path: path.to_path_buf(),
            source,
        })?;
        parse_newick(path, &content)
    }
}

/// Parse a Newick string read from `path` (the path is only used in errors).
///
/// `phylotree` panics on some degenerate inputs (`A;`, `();`); those panics
/// are reported as [`TreeDistError::Parse`] like any other syntax error.
pub fn parse_newick(path: &Path, content: &str) -> Result<Tree> {
    let newick = clean_newick(content);
    let parse_err = |reason| TreeDistError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    match panic::catch_unwind(|| Tree::from_newick(&newick)) {
        Ok(Ok(tree)) => Ok(tree),
        Ok(Err(e)) => Err(parse_err(e.to_string())),
        Err(payload) => Err(parse_err(format!(
            "parser panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Strip BEAST annotations and insignificant whitespace from Newick strings.
///
/// BEAST writes annotations like `:[&rate=0.123]2.45` where 2.45 is the actual
/// branch length. The `[&...]` blocks are removed, branch lengths are kept.
/// Whitespace outside quoted labels is dropped, otherwise `(A, B)` would yield
/// a tip named " B" and multi-line files would break branch lengths.
fn clean_newick(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut quote: Option<char> = None;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            result.push(ch);
        } else if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if in_annotation || ch.is_whitespace() {
            continue;
        } else {
            if ch == '"' || ch == '\'' {
                quote = Some(ch);
            }
            result.push(ch);
        }
    }

    result
}

/// Destination of the result table.
enum Sink {
    Stdout(BufWriter<io::Stdout>),
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Sink::Stdout(w) => w,
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Sink::Stdout(mut w) => w.flush(),
            Sink::Plain(mut w) => w.flush(),
            Sink::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

/// CSV sink for comparison results.
///
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, rows go to stdout (uncompressed).
pub struct ResultWriter {
    sink: Sink,
    path: PathBuf,
    rows: usize,
}

impl ResultWriter {
    /// Open the sink and write the header row.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let output_err = |source| TreeDistError::Output {
            path: p.to_path_buf(),
            source,
        };

        let sink = if p.as_os_str() == "-" {
            Sink::Stdout(BufWriter::new(io::stdout()))
        } else if p.to_string_lossy().ends_with(".gz") {
            let f = File::create(p).map_err(output_err)?;
            Sink::Gzip(BufWriter::new(GzEncoder::new(f, Compression::default())))
        } else {
            Sink::Plain(BufWriter::new(File::create(p).map_err(output_err)?))
        };

        let mut writer = ResultWriter {
            sink,
            path: p.to_path_buf(),
            rows: 0,
        };
        writer.write_record(&HEADER)?;
        Ok(writer)
    }

    /// Append one result row.
    pub fn write_row(&mut self, id: &str, distances: &TreeDistances) -> Result<()> {
        let fields = [
            id.to_string(),
            distances.rf.to_string(),
            distances.norm_rf.to_string(),
            distances.weighted_rf.to_string(),
            distances.branch_score.to_string(),
        ];
        self.write_record(&fields)?;
        self.rows += 1;
        Ok(())
    }

    fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let line = fields
            .iter()
            .map(|f| csv_field(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.sink.writer(), "{line}").map_err(|source| TreeDistError::Output {
            path: self.path.clone(),
            source,
        })
    }

    /// Number of data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush buffered rows and, for `.gz` output, write the gzip trailer.
    pub fn finish(self) -> Result<usize> {
        let ResultWriter { sink, path, rows } = self;
        sink.finish()
            .map_err(|source| TreeDistError::Output { path, source })?;
        Ok(rows)
    }
}

/// Quote a field if it contains a separator, a quote or a line break.
fn csv_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

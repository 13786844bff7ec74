//! Shader header inlining.
//!
//! Some shader compilers run at load time with no include search path, so
//! the headers a shader needs are pasted into it ahead of the build. The
//! shader is scanned for `#include "<header>"` markers, which are then
//! replaced in file order with the header text.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::util::fs::write_atomic;

/// Error while inlining shader headers.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("header path {} has no file name", .0.display())]
    Nameless(PathBuf),
}

/// A header to inline: the name used in markers and its contents.
struct Header {
    name: String,
    contents: Vec<u8>,
}

/// A marker found in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marker {
    /// Index into the header list
    header: usize,
    /// Byte offset of the marker's first character
    start: usize,
    /// Byte offset just past the marker line, newline included
    end: usize,
}

/// Replace the include markers in `shader` with the headers' contents.
///
/// Each header is matched by file name at its first occurrence. Replacement
/// follows the order markers appear in the file, not the order of
/// `headers`. The rest of a marker line is dropped. A shader without markers
/// is left untouched; otherwise it is rewritten in place.
///
/// Returns the number of markers replaced.
pub fn inline_headers(shader: &Path, headers: &[PathBuf]) -> Result<usize, PreprocessError> {
    let headers = headers
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .ok_or_else(|| PreprocessError::Nameless(path.clone()))?
                .to_string_lossy()
                .into_owned();
            let contents = read(path)?;
            Ok(Header { name, contents })
        })
        .collect::<Result<Vec<_>, PreprocessError>>()?;

    let source = read(shader)?;
    let markers = scan(&source, &headers);
    if markers.is_empty() {
        tracing::debug!("{} has no include markers", shader.display());
        return Ok(0);
    }

    let rewritten = splice(&source, &headers, &markers);
    write_atomic(shader, &rewritten).map_err(|source| PreprocessError::Write {
        path: shader.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "inlined {} header(s) into {}",
        markers.len(),
        shader.display()
    );
    Ok(markers.len())
}

fn read(path: &Path) -> Result<Vec<u8>, PreprocessError> {
    fs::read(path).map_err(|source| PreprocessError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Locate each header's marker, sorted by position.
///
/// Markers whose lines overlap an earlier marker are dropped.
fn scan(source: &[u8], headers: &[Header]) -> Vec<Marker> {
    let mut markers: Vec<Marker> = headers
        .iter()
        .enumerate()
        .filter_map(|(header, h)| {
            let needle = format!("#include \"{}\"", h.name);
            let start = find(source, needle.as_bytes())?;
            let end = source[start..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(source.len(), |i| start + i + 1);
            Some(Marker { header, start, end })
        })
        .collect();

    markers.sort_by_key(|m| m.start);
    markers.dedup_by(|later, earlier| later.start < earlier.end);
    markers
}

fn splice(source: &[u8], headers: &[Header], markers: &[Marker]) -> Vec<u8> {
    let extra: usize = markers
        .iter()
        .map(|m| headers[m.header].contents.len() + 2 * headers[m.header].name.len() + 32)
        .sum();
    let mut out = Vec::with_capacity(source.len() + extra);
    let mut pos = 0;

    for marker in markers {
        let header = &headers[marker.header];
        out.extend_from_slice(&source[pos..marker.start]);
        out.extend_from_slice(format!("// {} inlined below\n", header.name).as_bytes());
        out.extend_from_slice(&header.contents);
        out.extend_from_slice(format!("\n// end of {}\n", header.name).as_bytes());
        pos = marker.end;
    }

    out.extend_from_slice(&source[pos..]);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

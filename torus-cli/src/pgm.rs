//! Grid file I/O.
//!
//! Grids are stored as binary PGM (P5) images with maxval 255: a live
//! cell is a white pixel, a dead cell black. Filenames are derived from
//! the grid's dimensions and turn count (`<width>x<height>x<turn>.pgm`),
//! so a snapshot's name is deterministic.

use std::path::{Path, PathBuf};

use tracing::debug;

use torus_types::{Grid, GridError};

#[derive(Debug, thiserror::Error)]
pub enum PgmError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a P5 PGM file")]
    BadMagic,

    #[error("malformed PGM header: {0}")]
    BadHeader(String),

    #[error("expected {expected} pixel bytes, found {got}")]
    Truncated { expected: usize, got: usize },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Deterministic snapshot filename for a grid at a given turn.
pub fn snapshot_name(grid: &Grid, turn: u32) -> String {
    format!("{}x{}x{}.pgm", grid.width(), grid.height(), turn)
}

pub fn read_grid(path: &Path) -> Result<Grid, PgmError> {
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "reading grid");
    decode(&bytes)
}

pub fn write_grid(grid: &Grid, dir: &Path, turn: u32) -> Result<PathBuf, PgmError> {
    let path = dir.join(snapshot_name(grid, turn));
    std::fs::write(&path, encode(grid))?;
    debug!(path = %path.display(), "wrote grid snapshot");
    Ok(path)
}

fn encode(grid: &Grid) -> Vec<u8> {
    let header = format!("P5\n{} {}\n255\n", grid.width(), grid.height());
    let mut out = header.into_bytes();
    for y in 0..grid.height() {
        out.extend_from_slice(grid.row(y as i64));
    }
    out
}

fn decode(bytes: &[u8]) -> Result<Grid, PgmError> {
    let mut cursor = 0usize;

    let magic = next_token(bytes, &mut cursor).ok_or(PgmError::BadMagic)?;
    if magic != b"P5" {
        return Err(PgmError::BadMagic);
    }
    let width: usize = parse_token(bytes, &mut cursor, "width")?;
    let height: usize = parse_token(bytes, &mut cursor, "height")?;
    // Bound the untrusted dimensions before multiplying them.
    if width == 0 || height == 0 || width > u16::MAX as usize || height > u16::MAX as usize {
        return Err(PgmError::BadHeader(format!(
            "unsupported dimensions {width}x{height}"
        )));
    }
    let maxval: usize = parse_token(bytes, &mut cursor, "maxval")?;
    if maxval == 0 || maxval > 255 {
        return Err(PgmError::BadHeader(format!("unsupported maxval {maxval}")));
    }
    // Exactly one whitespace byte separates the header from pixel data.
    cursor += 1;

    let expected = width * height;
    let pixels = bytes.get(cursor..).unwrap_or_default();
    if pixels.len() < expected {
        return Err(PgmError::Truncated {
            expected,
            got: pixels.len(),
        });
    }
    let rows = pixels[..expected]
        .chunks(width)
        .map(|chunk| chunk.to_vec())
        .collect();
    Ok(Grid::from_rows(rows)?)
}

/// Returns the next whitespace-delimited token, skipping `#` comments.
fn next_token<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    while *cursor < bytes.len() {
        let b = bytes[*cursor];
        if b == b'#' {
            while *cursor < bytes.len() && bytes[*cursor] != b'\n' {
                *cursor += 1;
            }
        } else if b.is_ascii_whitespace() {
            *cursor += 1;
        } else {
            break;
        }
    }
    let start = *cursor;
    while *cursor < bytes.len() && !bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    (*cursor > start).then(|| &bytes[start..*cursor])
}

fn parse_token(bytes: &[u8], cursor: &mut usize, field: &str) -> Result<usize, PgmError> {
    let token = next_token(bytes, cursor)
        .ok_or_else(|| PgmError::BadHeader(format!("missing {field}")))?;
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PgmError::BadHeader(format!("invalid {field}")))
}

use crate::file::csv::error::FileError;
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::Path,
};
use tracing::debug;

/// RFC 1952: every gzip member starts with these two bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub type InputReader = Box<dyn Read + Send>;

/// Opens the load input: the file at `path`, or standard input when no
/// path is given. Gzip-compressed input is decompressed transparently.
pub fn open_input(path: Option<&Path>) -> Result<InputReader, FileError> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|source| FileError::Open {
                path: path.display().to_string(),
                source,
            })?;
            detect_compression(BufReader::new(file))
        }
        None => detect_compression(BufReader::new(io::stdin())),
    }
}

/// Peeks at the first two bytes of `reader` and wraps it in a gzip decoder
/// when they carry the gzip magic number.
pub fn detect_compression<R>(mut reader: R) -> Result<InputReader, FileError>
where
    R: Read + Send + 'static,
{
    let mut magic = [0u8; 2];
    let read = read_prefix(&mut reader, &mut magic)?;
    let restored = Cursor::new(magic[..read].to_vec()).chain(reader);

    if read == GZIP_MAGIC.len() && magic == GZIP_MAGIC {
        debug!("Gzip input detected");
        Ok(Box::new(MultiGzDecoder::new(restored)))
    } else {
        Ok(Box::new(restored))
    }
}

/// Fills `buf` unless the input ends first; returns the number of bytes read.
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::OwnedFd;

use bytes::BytesMut;

const CHUNK: usize = 8 * 1024;

/// Copies everything readable from `source` to `out` until end-of-stream,
/// byte for byte. Consumes the descriptor, so it is closed on return.
pub fn forward<W: Write>(source: OwnedFd, out: &mut W) -> io::Result<u64> {
    let mut reader = File::from(source);
    let mut buf = BytesMut::zeroed(CHUNK);
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf[..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        total += n as u64;
    }

    out.flush()?;
    Ok(total)
}

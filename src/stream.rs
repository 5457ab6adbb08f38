//! This module contains the byte stream abstraction consumed by the message
//! parsers, along with the few implementations this crate needs: an
//! in-memory buffer, a view of a shared stream starting at an offset (used
//! for message bodies), and a cache that makes any reader seekable.

use crate::error::Error;
use std::{
    io::{
        Read,
        SeekFrom,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

/// This is the set of operations the message codecs need from a byte
/// stream.
pub trait Stream: Send {
    /// Read up to `length` bytes from the current position.  Fewer bytes
    /// (possibly none) are returned at the end of the stream.
    fn read(
        &mut self,
        length: usize
    ) -> Result<Vec<u8>, Error>;

    /// Write the given bytes at the current position, returning how many
    /// were written.
    fn write(
        &mut self,
        data: &[u8]
    ) -> Result<usize, Error>;

    /// Move the current position, returning the new position.
    fn seek(
        &mut self,
        position: SeekFrom
    ) -> Result<u64, Error>;

    /// Return the current position.
    fn tell(&mut self) -> Result<u64, Error>;

    /// Return whether or not the current position is at the end of the
    /// stream.
    fn eof(&mut self) -> bool;

    fn is_readable(&self) -> bool;

    fn is_seekable(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn rewind(&mut self) -> Result<(), Error> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read everything from the current position to the end of the stream.
    fn contents(&mut self) -> Result<Vec<u8>, Error> {
        if !self.is_readable() {
            return Err(Error::StreamNotReadable);
        }
        let mut contents = Vec::new();
        loop {
            let chunk = self.read(8192)?;
            if chunk.is_empty() {
                break;
            }
            contents.extend(chunk);
        }
        Ok(contents)
    }
}

/// This is how a stream is shared between a message and the views of its
/// body.
pub type SharedStream = Arc<Mutex<dyn Stream>>;

// Streams keep no invariant across a panicking holder, so a poisoned lock
// is taken over.
pub(crate) fn lock(stream: &SharedStream) -> MutexGuard<'_, dyn Stream + 'static> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

fn invalid_seek(message: &'static str) -> Error {
    Error::Stream(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
}

fn seek_position(
    base: u64,
    length: u64,
    current: u64,
    position: SeekFrom,
) -> Result<u64, Error> {
    let target = match position {
        SeekFrom::Start(offset) => base.checked_add(offset),
        SeekFrom::End(delta) => offset_by(length, delta),
        SeekFrom::Current(delta) => offset_by(current, delta),
    };
    match target {
        Some(target) if target >= base => Ok(target),
        _ => Err(invalid_seek("invalid seek to a negative or overflowing position")),
    }
}

fn offset_by(
    origin: u64,
    delta: i64
) -> Option<u64> {
    if delta < 0 {
        origin.checked_sub(delta.unsigned_abs())
    } else {
        origin.checked_add(delta.unsigned_abs())
    }
}

/// This is a stream held entirely in memory.
#[derive(Clone, Debug)]
pub struct MemoryStream {
    buffer: Vec<u8>,
    position: usize,
    writable: bool,
}

impl MemoryStream {
    /// Create an empty stream which can be both read and written.
    #[must_use]
    pub fn new() -> Self {
        Self{
            buffer: Vec::new(),
            position: 0,
            writable: true,
        }
    }

    /// Create a stream which can be read, but not written, holding the
    /// given bytes.
    pub fn read_only<T>(data: T) -> Self
        where T: Into<Vec<u8>>
    {
        Self{
            buffer: data.into(),
            position: 0,
            writable: false,
        }
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(buffer: Vec<u8>) -> Self {
        Self{
            buffer,
            position: 0,
            writable: true,
        }
    }
}

impl From<&[u8]> for MemoryStream {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl From<&str> for MemoryStream {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes().to_vec())
    }
}

impl From<String> for MemoryStream {
    fn from(text: String) -> Self {
        Self::from(text.into_bytes())
    }
}

impl Stream for MemoryStream {
    fn read(
        &mut self,
        length: usize
    ) -> Result<Vec<u8>, Error> {
        let start = self.position.min(self.buffer.len());
        let end = start.saturating_add(length).min(self.buffer.len());
        self.position = end;
        Ok(self.buffer[start..end].to_vec())
    }

    fn write(
        &mut self,
        data: &[u8]
    ) -> Result<usize, Error> {
        if !self.writable {
            return Err(Error::StreamNotWritable);
        }
        let end = self.position.checked_add(data.len())
            .filter(|&end| end <= isize::MAX.unsigned_abs())
            .ok_or_else(|| invalid_seek("write past the largest possible position"))?;
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(data.len())
    }

    fn seek(
        &mut self,
        position: SeekFrom
    ) -> Result<u64, Error> {
        let target = seek_position(
            0,
            self.buffer.len() as u64,
            self.position as u64,
            position,
        )?;
        self.position = usize::try_from(target)
            .map_err(|_| invalid_seek("seek position does not fit in memory"))?;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64, Error> {
        Ok(self.position as u64)
    }

    fn eof(&mut self) -> bool {
        self.position >= self.buffer.len()
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

/// This is a view of a shared stream which begins at a fixed offset, so
/// that position zero of the view is the first byte following whatever came
/// before the offset.  Message bodies are views like this over the stream
/// the message was parsed from, which avoids copying the body into memory.
#[derive(Clone)]
pub struct RelativeStream {
    inner: SharedStream,
    offset: u64,
}

impl RelativeStream {
    #[must_use]
    pub fn new(
        inner: SharedStream,
        offset: u64,
    ) -> Self {
        Self{
            inner,
            offset,
        }
    }
}

impl std::fmt::Debug for RelativeStream {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>
    ) -> std::fmt::Result {
        f.debug_struct("RelativeStream")
            .field("offset", &self.offset)
            .finish()
    }
}

impl Stream for RelativeStream {
    fn read(
        &mut self,
        length: usize
    ) -> Result<Vec<u8>, Error> {
        let mut inner = lock(&self.inner);
        if inner.tell()? < self.offset {
            inner.seek(SeekFrom::Start(self.offset))?;
        }
        inner.read(length)
    }

    fn write(
        &mut self,
        data: &[u8]
    ) -> Result<usize, Error> {
        let mut inner = lock(&self.inner);
        if inner.tell()? < self.offset {
            inner.seek(SeekFrom::Start(self.offset))?;
        }
        inner.write(data)
    }

    fn seek(
        &mut self,
        position: SeekFrom
    ) -> Result<u64, Error> {
        let mut inner = lock(&self.inner);
        let position = match position {
            SeekFrom::Start(offset) => SeekFrom::Start(
                self.offset.checked_add(offset)
                    .ok_or_else(|| invalid_seek("invalid seek to an overflowing position"))?
            ),
            relative => relative,
        };
        let target = inner.seek(position)?;
        if target < self.offset {
            inner.seek(SeekFrom::Start(self.offset))?;
            return Err(invalid_seek("invalid seek to before the start of the stream"));
        }
        Ok(target - self.offset)
    }

    fn tell(&mut self) -> Result<u64, Error> {
        Ok(lock(&self.inner).tell()?.saturating_sub(self.offset))
    }

    fn eof(&mut self) -> bool {
        lock(&self.inner).eof()
    }

    fn is_readable(&self) -> bool {
        lock(&self.inner).is_readable()
    }

    fn is_seekable(&self) -> bool {
        lock(&self.inner).is_seekable()
    }

    fn is_writable(&self) -> bool {
        lock(&self.inner).is_writable()
    }
}

/// This is a stream which reads from a source that can only be read once,
/// from front to back, such as a socket or a pipe.  Everything read is kept
/// so that the stream can be rewound and read again.
pub struct CachingStream<R> {
    cache: Vec<u8>,
    position: usize,
    source: Option<R>,
}

impl<R> CachingStream<R>
    where R: Read + Send
{
    pub fn new(source: R) -> Self {
        Self{
            cache: Vec::new(),
            position: 0,
            source: Some(source),
        }
    }

    // Pull bytes from the source, a buffer at a time, until the cache holds
    // at least `needed` bytes or the source is exhausted.
    fn fill_to(
        &mut self,
        needed: usize
    ) -> Result<(), Error> {
        while self.cache.len() < needed {
            let source = match self.source.as_mut() {
                Some(source) => source,
                None => break,
            };
            let mut buffer = [0; 8192];
            let read = match source.read(&mut buffer) {
                Ok(read) => read,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(Error::Stream(error)),
            };
            if read == 0 {
                self.source = None;
            } else {
                self.cache.extend_from_slice(&buffer[..read]);
            }
        }
        Ok(())
    }

    fn fill_all(&mut self) -> Result<(), Error> {
        while self.source.is_some() {
            self.fill_to(self.cache.len().saturating_add(1))?;
        }
        Ok(())
    }
}

impl<R> Stream for CachingStream<R>
    where R: Read + Send
{
    fn read(
        &mut self,
        length: usize
    ) -> Result<Vec<u8>, Error> {
        self.fill_to(self.position.saturating_add(length))?;
        let start = self.position.min(self.cache.len());
        let end = start.saturating_add(length).min(self.cache.len());
        self.position = end;
        Ok(self.cache[start..end].to_vec())
    }

    fn write(
        &mut self,
        _data: &[u8]
    ) -> Result<usize, Error> {
        Err(Error::StreamNotWritable)
    }

    fn seek(
        &mut self,
        position: SeekFrom
    ) -> Result<u64, Error> {
        if let SeekFrom::End(_) = position {
            self.fill_all()?;
        }
        let target = seek_position(
            0,
            self.cache.len() as u64,
            self.position as u64,
            position,
        )?;
        let target = usize::try_from(target)
            .map_err(|_| invalid_seek("seek position does not fit in memory"))?;
        self.fill_to(target)?;
        self.position = target.min(self.cache.len());
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> Result<u64, Error> {
        Ok(self.position as u64)
    }

    fn eof(&mut self) -> bool {
        if self.position < self.cache.len() {
            return false;
        }
        // A source that fails here will fail again on the next read, which
        // is where the error gets reported.
        self.fill_to(self.position.saturating_add(1)).is_err()
            || self.position >= self.cache.len()
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        false
    }
}

// A stream which can't seek back is only known to be empty when it ends
// before anything was read from it.
fn has_no_bytes(stream: &mut dyn Stream) -> Result<bool, Error> {
    if !stream.is_seekable() {
        return Ok(stream.tell()? == 0 && stream.eof());
    }
    let position = stream.tell()?;
    let length = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(position))?;
    Ok(length == 0)
}

/// This is the body of a message: a stream shared by every copy of the
/// message.
#[derive(Clone)]
pub struct Body {
    stream: SharedStream,
}

impl Body {
    /// Create a body with nothing in it.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(MemoryStream::new())
    }

    pub fn new<S>(stream: S) -> Self
        where S: Stream + 'static
    {
        Self{
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Rewind the body and read all of it.  A body which isn't readable
    /// has no bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut stream = lock(&self.stream);
        if !stream.is_readable() {
            return Ok(Vec::new());
        }
        stream.rewind()?;
        stream.contents()
    }

    /// Read up to `length` bytes from the current position of the body.
    pub fn read(
        &self,
        length: usize
    ) -> Result<Vec<u8>, Error> {
        lock(&self.stream).read(length)
    }

    /// Write the given bytes at the current position of the body.
    pub fn write<T>(
        &self,
        data: T
    ) -> Result<usize, Error>
        where T: AsRef<[u8]>
    {
        lock(&self.stream).write(data.as_ref())
    }

    pub fn rewind(&self) -> Result<(), Error> {
        lock(&self.stream).rewind()
    }

    /// Return whether or not the body has no bytes.  The body is measured
    /// by seeking to its end, and is left at the position it had before.
    /// A body which isn't readable, or can't be measured, has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let mut stream = lock(&self.stream);
        if !stream.is_readable() {
            return true;
        }
        has_no_bytes(&mut *stream).unwrap_or(true)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Body {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>
    ) -> std::fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::new(MemoryStream::from(text))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::new(MemoryStream::from(text))
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Self::new(MemoryStream::from(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(MemoryStream::from(bytes))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn shared<S>(stream: S) -> SharedStream
        where S: Stream + 'static
    {
        Arc::new(Mutex::new(stream))
    }

    #[test]
    fn memory_stream_read_write_seek() {
        let mut stream = MemoryStream::new();
        assert_eq!(5, stream.write(b"Hello").unwrap());
        assert!(stream.eof());
        stream.rewind().unwrap();
        assert_eq!(b"He".to_vec(), stream.read(2).unwrap());
        assert_eq!(2, stream.tell().unwrap());
        assert_eq!(b"llo".to_vec(), stream.read(100).unwrap());
        assert!(stream.read(1).unwrap().is_empty());
        assert_eq!(1, stream.seek(SeekFrom::End(-4)).unwrap());
        assert_eq!(b"ello".to_vec(), stream.contents().unwrap());
        assert!(stream.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn memory_stream_overwrite_in_middle() {
        let mut stream = MemoryStream::from("Hello, World!");
        stream.seek(SeekFrom::Start(7)).unwrap();
        stream.write(b"Rusty!").unwrap();
        stream.rewind().unwrap();
        assert_eq!(b"Hello, Rusty!".to_vec(), stream.contents().unwrap());
    }

    #[test]
    fn read_only_memory_stream_rejects_writes() {
        let mut stream = MemoryStream::read_only("abc");
        assert!(!stream.is_writable());
        assert!(matches!(stream.write(b"x"), Err(Error::StreamNotWritable)));
    }

    #[test]
    fn relative_stream_hides_bytes_before_offset() {
        let inner = shared(MemoryStream::from("HEADER\r\n\r\nbody"));
        let mut view = RelativeStream::new(inner.clone(), 10);
        assert_eq!(b"body".to_vec(), view.contents().unwrap());
        assert_eq!(4, view.tell().unwrap());
        view.rewind().unwrap();
        assert_eq!(0, view.tell().unwrap());
        assert_eq!(10, lock(&inner).tell().unwrap());
        assert_eq!(b"bo".to_vec(), view.read(2).unwrap());
        assert!(view.seek(SeekFrom::Current(-5)).is_err());
        assert_eq!(0, view.tell().unwrap());
    }

    #[test]
    fn relative_stream_repositions_shared_stream() {
        let inner = shared(MemoryStream::from("skip-me|keep"));
        let mut view = RelativeStream::new(inner.clone(), 8);
        lock(&inner).rewind().unwrap();
        assert_eq!(b"keep".to_vec(), view.read(10).unwrap());
        assert!(view.eof());
    }

    #[test]
    fn memory_stream_rejects_overflowing_positions() {
        let mut stream = MemoryStream::from("abc");
        if stream.seek(SeekFrom::Start(u64::MAX)).is_ok() {
            assert!(stream.write(b"x").is_err());
        }
        stream.rewind().unwrap();
        assert_eq!(b"abc".to_vec(), stream.contents().unwrap());
    }

    #[test]
    fn relative_stream_rejects_overflowing_seek() {
        let inner = shared(MemoryStream::from("--body"));
        let mut view = RelativeStream::new(inner, 2);
        assert!(matches!(
            view.seek(SeekFrom::Start(u64::MAX)),
            Err(Error::Stream(error)) if error.kind() == std::io::ErrorKind::InvalidInput
        ));
        assert_eq!(b"body".to_vec(), view.read(4).unwrap());
    }

    #[test]
    fn caching_stream_fills_a_buffer_per_source_read() {
        struct CountingReader<'a> {
            data: &'a [u8],
            reads: Arc<Mutex<usize>>,
        }

        impl Read for CountingReader<'_> {
            fn read(
                &mut self,
                buffer: &mut [u8]
            ) -> std::io::Result<usize> {
                *self.reads.lock().unwrap() += 1;
                self.data.read(buffer)
            }
        }

        let reads = Arc::new(Mutex::new(0));
        let mut stream = CachingStream::new(CountingReader{
            data: b"GET / HTTP/1.1\r\n\r\n",
            reads: reads.clone(),
        });
        for _ in 0..10 {
            assert_eq!(1, stream.read(1).unwrap().len());
        }
        assert_eq!(1, *reads.lock().unwrap());
    }

    #[test]
    fn caching_stream_rewinds_one_shot_reader() {
        let source: &[u8] = b"one-shot data";
        let mut stream = CachingStream::new(source);
        assert_eq!(b"one".to_vec(), stream.read(3).unwrap());
        assert!(!stream.eof());
        stream.rewind().unwrap();
        assert_eq!(b"one-shot data".to_vec(), stream.contents().unwrap());
        assert!(stream.eof());
        assert_eq!(9, stream.seek(SeekFrom::End(-4)).unwrap());
        assert_eq!(b"data".to_vec(), stream.read(4).unwrap());
        assert!(matches!(stream.write(b"x"), Err(Error::StreamNotWritable)));
    }

    #[test]
    fn body_to_bytes_rewinds() {
        let body = Body::from("Hello, World!");
        assert_eq!(b"Hello".to_vec(), body.read(5).unwrap());
        assert_eq!(b"Hello, World!".to_vec(), body.to_bytes().unwrap());
        assert!(!body.is_empty());
        assert!(Body::empty().is_empty());
    }

    #[test]
    fn body_is_empty_keeps_position() {
        let inner = shared(MemoryStream::from("HEAD\r\n\r\ndata"));
        let body = Body::new(RelativeStream::new(inner.clone(), 8));
        assert!(!body.is_empty());
        assert_eq!(b"da".to_vec(), body.read(2).unwrap());
        assert!(!body.is_empty());
        assert_eq!(b"ta".to_vec(), body.read(4).unwrap());
        let tail = Body::new(RelativeStream::new(inner, 12));
        assert!(tail.is_empty());
    }

    #[test]
    fn cloned_body_shares_stream() {
        let body = Body::empty();
        let copy = body.clone();
        body.write("shared").unwrap();
        assert_eq!(b"shared".to_vec(), copy.to_bytes().unwrap());
    }

}

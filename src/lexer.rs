use crate::{
    codec::ParseOptions,
    error::Error,
    stream::Stream,
};
use std::io::SeekFrom;

// These are the two bytes which, together and in this order, terminate
// each line of the start line and header section of an HTTP message.
const CR: u8 = b'\r';
const LF: u8 = b'\n';

// A seekable stream is read this many bytes at a time, and whatever
// follows the end of a line is given back by seeking.
const CHUNK_SIZE: usize = 512;

/// This reads CRLF-terminated lines from a stream, leaving the stream
/// positioned immediately after the terminator of the last line read.
/// A stream which can't seek is read one byte at a time.
pub struct LineLexer<'a> {
    consumed: usize,
    options: &'a ParseOptions,
    stream: &'a mut dyn Stream,
}

impl<'a> LineLexer<'a> {
    pub fn new(
        stream: &'a mut dyn Stream,
        options: &'a ParseOptions,
    ) -> Self {
        Self{
            consumed: 0,
            options,
            stream,
        }
    }

    /// Return the total number of bytes consumed by all lines read so far,
    /// terminators included.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Read the next line, without its terminator.  An empty line is
    /// returned either for an immediate CRLF or at the end of the stream.
    ///
    /// # Errors
    ///
    /// * [`Error::MalformedLine`] if a carriage return is not immediately
    ///   followed by a line feed, or a line feed is not immediately preceded
    ///   by a carriage return.
    /// * [`Error::UnexpectedEndOfStream`] if the stream ends right after a
    ///   carriage return.
    /// * [`Error::LineTooLong`] and [`Error::MessageTooLong`] if the limits
    ///   in the parse options are exceeded.
    /// * [`Error::LineNotValidText`] if the line isn't valid UTF-8.
    pub fn next_line(&mut self) -> Result<String, Error> {
        let line = self.next_raw_line()?;
        String::from_utf8(line)
            .map_err(|error| Error::LineNotValidText(error.into_bytes()))
    }

    /// Read the next line like [`LineLexer::next_line`], except that a
    /// line which isn't valid UTF-8 is decoded as ISO-8859-1, so that the
    /// obsolete text (`obs-text`) allowed in header field values is kept
    /// rather than rejected.
    ///
    /// # Errors
    ///
    /// The same as [`LineLexer::next_line`], other than
    /// [`Error::LineNotValidText`].
    pub fn next_field_line(&mut self) -> Result<String, Error> {
        let line = self.next_raw_line()?;
        Ok(String::from_utf8(line).unwrap_or_else(|error| {
            tracing::debug!("decoding header line as ISO-8859-1");
            error.into_bytes().into_iter().map(char::from).collect()
        }))
    }

    fn next_raw_line(&mut self) -> Result<Vec<u8>, Error> {
        let chunk_size = if self.stream.is_seekable() { CHUNK_SIZE } else { 1 };
        let mut line = Vec::new();
        let mut chunk = Vec::new();
        let mut used = 0;
        let mut cr_found = false;
        let result = loop {
            if used == chunk.len() {
                chunk = self.stream.read(chunk_size)?;
                used = 0;
                if chunk.is_empty() {
                    break if cr_found {
                        Err(Error::UnexpectedEndOfStream)
                    } else {
                        Ok(())
                    };
                }
            }
            let byte = chunk[used];
            used += 1;
            if let Err(error) = self.count_byte() {
                break Err(error);
            }
            match (cr_found, byte) {
                (true, LF) => break Ok(()),
                (true, _) | (false, LF) => {
                    line.push(byte);
                    break Err(Error::MalformedLine(std::mem::take(&mut line)));
                },
                (false, CR) => cr_found = true,
                (false, _) => {
                    if let Some(limit) = self.options.line_limit {
                        if line.len() >= limit {
                            break Err(Error::LineTooLong(std::mem::take(&mut line)));
                        }
                    }
                    line.push(byte);
                },
            }
        };
        let unread = chunk.len() - used;
        if unread > 0 {
            let position = self.stream.tell()?;
            self.stream.seek(SeekFrom::Start(position.saturating_sub(unread as u64)))?;
        }
        result?;
        tracing::trace!(length = line.len(), "read line");
        Ok(line)
    }

    fn count_byte(&mut self) -> Result<(), Error> {
        self.consumed += 1;
        match self.options.header_section_limit {
            Some(limit) if self.consumed > limit => Err(Error::MessageTooLong),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::stream::MemoryStream;

    fn lines(
        input: &str,
        count: usize,
    ) -> Result<Vec<String>, Error> {
        let mut stream = MemoryStream::from(input);
        let options = ParseOptions::default();
        let mut lexer = LineLexer::new(&mut stream, &options);
        let lines = (0..count).map(|_| lexer.next_line()).collect();
        lines
    }

    #[test]
    fn lines_end_at_crlf() {
        assert_eq!(
            vec!["Host: x", "", ""],
            lines("Host: x\r\n\r\n", 3).unwrap()
        );
    }

    #[test]
    fn stream_positioned_after_terminator() {
        let mut stream = MemoryStream::from("first\r\nrest");
        let options = ParseOptions::default();
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert_eq!("first", lexer.next_line().unwrap());
        assert_eq!(7, lexer.consumed());
        assert_eq!(7, stream.tell().unwrap());
        assert_eq!(b"rest".to_vec(), stream.contents().unwrap());
    }

    #[test]
    fn last_line_without_terminator() {
        assert_eq!(vec!["Host: x", ""], lines("Host: x", 2).unwrap());
    }

    #[test]
    fn bare_line_feed() {
        assert!(matches!(
            lines("Host: x\n\r\n", 1),
            Err(Error::MalformedLine(line)) if line == b"Host: x\n"
        ));
    }

    #[test]
    fn carriage_return_without_line_feed() {
        assert!(matches!(
            lines("Host: x\ry\r\n", 1),
            Err(Error::MalformedLine(line)) if line == b"Host: xy"
        ));
    }

    #[test]
    fn carriage_return_at_end_of_stream() {
        assert!(matches!(
            lines("Host: x\r", 1),
            Err(Error::UnexpectedEndOfStream)
        ));
    }

    #[test]
    fn line_too_long() {
        let mut stream = MemoryStream::from("X".repeat(20) + "\r\n");
        let options = ParseOptions{
            line_limit: Some(10),
            ..ParseOptions::default()
        };
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert!(matches!(
            lexer.next_line(),
            Err(Error::LineTooLong(line)) if line == "X".repeat(10).as_bytes()
        ));
    }

    #[test]
    fn line_exactly_at_limit() {
        let mut stream = MemoryStream::from("X".repeat(10) + "\r\n");
        let options = ParseOptions{
            line_limit: Some(10),
            ..ParseOptions::default()
        };
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert_eq!("X".repeat(10), lexer.next_line().unwrap());
    }

    #[test]
    fn header_section_limit() {
        let mut stream = MemoryStream::from("abc\r\ndef\r\n");
        let options = ParseOptions{
            header_section_limit: Some(6),
            ..ParseOptions::default()
        };
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert_eq!("abc", lexer.next_line().unwrap());
        assert!(matches!(lexer.next_line(), Err(Error::MessageTooLong)));
    }

    #[test]
    fn field_line_keeps_obsolete_text() {
        let mut stream = MemoryStream::from(&b"X-Name: caf\xe9\r\nnext\r\n"[..]);
        let options = ParseOptions::default();
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert_eq!("X-Name: caf\u{e9}", lexer.next_field_line().unwrap());
        assert_eq!("next", lexer.next_line().unwrap());
    }

    #[test]
    fn lines_longer_than_a_chunk() {
        let long = "x".repeat(CHUNK_SIZE * 2 + 3);
        let input = format!("{}\r\nshort\r\n", long);
        assert_eq!(vec![long.as_str(), "short", ""], lines(&input, 3).unwrap());
    }

    #[test]
    fn line_not_valid_text() {
        let mut stream = MemoryStream::from(&b"caf\xe9\r\n"[..]);
        let options = ParseOptions::default();
        let mut lexer = LineLexer::new(&mut stream, &options);
        assert!(matches!(
            lexer.next_line(),
            Err(Error::LineNotValidText(line)) if line == b"caf\xe9"
        ));
    }

}

//! Request head reading, routing and query strings

use embedded_io_async::Read;

use super::ServerError;

/// Bytes of the request line kept; the rest of an overlong line is dropped.
pub const REQUEST_LINE_CAPACITY: usize = 256;
/// Query pairs kept; later pairs are ignored.
pub const MAX_QUERY_PAIRS: usize = 8;

pub const STYLESHEET_PATH: &str = "/static/style.css";
pub const CALIBRATION_PATH: &str = "/changedivisor";
pub const CALIBRATION_PARAM: &str = "ticksPerGallon";

const HEAD_TERMINATOR: &[u8; 4] = b"\r\n\r\n";
const READ_CHUNK: usize = 64;

/// The request line of an HTTP request. Headers are read and discarded.
pub struct RequestHead {
    line: heapless::Vec<u8, REQUEST_LINE_CAPACITY>,
}

impl RequestHead {
    /// Read a request head from `conn`, up to and including the blank line.
    ///
    /// Empty lines ahead of the request line are skipped. Anything the client
    /// sends after the blank line is left unread.
    pub async fn read<R: Read>(conn: &mut R) -> Result<Self, ServerError<R::Error>> {
        let mut line: heapless::Vec<u8, REQUEST_LINE_CAPACITY> = heapless::Vec::new();
        let mut in_request_line = true;
        let mut matched = 0;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = conn.read(&mut chunk).await.map_err(ServerError::Io)?;
            if n == 0 {
                return Err(ServerError::ConnectionClosed);
            }

            for &byte in &chunk[..n] {
                if in_request_line && line.is_empty() && matches!(byte, b'\r' | b'\n') {
                    continue;
                }
                if in_request_line {
                    match byte {
                        b'\n' => in_request_line = false,
                        b'\r' => {}
                        _ => {
                            let _ = line.push(byte);
                        }
                    }
                }

                matched = if byte == HEAD_TERMINATOR[matched] {
                    matched + 1
                } else if byte == b'\r' {
                    1
                } else {
                    0
                };
                if matched == HEAD_TERMINATOR.len() {
                    return Ok(Self { line });
                }
            }
        }
    }

    pub fn from_line(line: &str) -> Self {
        let mut bytes = heapless::Vec::new();
        for &byte in line.as_bytes().iter().take(REQUEST_LINE_CAPACITY) {
            let _ = bytes.push(byte);
        }
        Self { line: bytes }
    }

    /// The request line as text, cut at the first invalid UTF-8 byte.
    pub fn line(&self) -> &str {
        match core::str::from_utf8(&self.line) {
            Ok(line) => line,
            Err(err) => core::str::from_utf8(&self.line[..err.valid_up_to()]).unwrap_or(""),
        }
    }

    /// The request target, `/` when the line has none.
    pub fn target(&self) -> &str {
        self.line().split_whitespace().nth(1).unwrap_or("/")
    }
}

/// What a request asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Stylesheet,
    ChangeCalibration(QueryParams<'a>),
    Stats,
}

impl<'a> Route<'a> {
    /// Classify a request target. Unknown paths get the stats page.
    pub fn classify(target: &'a str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        match path {
            STYLESHEET_PATH => Self::Stylesheet,
            CALIBRATION_PATH => Self::ChangeCalibration(QueryParams::parse(query)),
            _ => Self::Stats,
        }
    }
}

/// Key/value pairs of a query string, in request order.
///
/// Values are taken verbatim (no percent-decoding). A key without `=` maps to
/// an empty value.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QueryParams<'a> {
    pairs: heapless::Vec<(&'a str, &'a str), MAX_QUERY_PAIRS>,
}

impl<'a> QueryParams<'a> {
    pub fn parse(query: &'a str) -> Self {
        let mut pairs = heapless::Vec::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let entry = pair.split_once('=').unwrap_or((pair, ""));
            if pairs.push(entry).is_err() {
                break;
            }
        }
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use embassy_futures::block_on;

    #[test]
    fn test_reads_request_line_and_skips_headers() {
        let mut conn = MockConnection::new(
            b"GET /changedivisor?ticksPerGallon=3032 HTTP/1.1\r\nHost: well.local\r\nAccept: */*\r\n\r\n",
        );
        let head = block_on(RequestHead::read(&mut conn)).unwrap();
        assert_eq!(head.line(), "GET /changedivisor?ticksPerGallon=3032 HTTP/1.1");
        assert_eq!(head.target(), "/changedivisor?ticksPerGallon=3032");
    }

    #[test]
    fn test_head_without_headers() {
        let mut conn = MockConnection::new(b"GET / HTTP/1.0\r\n\r\n");
        let head = block_on(RequestHead::read(&mut conn)).unwrap();
        assert_eq!(head.target(), "/");
    }

    #[test]
    fn test_stray_carriage_returns_do_not_end_head() {
        let mut conn = MockConnection::new(b"GET /a HTTP/1.0\r\nX: \r\r\n\r\n");
        let head = block_on(RequestHead::read(&mut conn)).unwrap();
        assert_eq!(head.target(), "/a");
    }

    #[test]
    fn test_leading_empty_lines_are_skipped() {
        let mut conn =
            MockConnection::new(b"\r\n\r\nGET /static/style.css HTTP/1.1\r\nHost: x\r\n\r\n");
        let head = block_on(RequestHead::read(&mut conn)).unwrap();
        assert_eq!(head.line(), "GET /static/style.css HTTP/1.1");
        assert_eq!(head.target(), "/static/style.css");

        let mut conn = MockConnection::new(b"\nGET /x HTTP/1.0\r\n\r\n");
        assert_eq!(block_on(RequestHead::read(&mut conn)).unwrap().target(), "/x");
    }

    #[test]
    fn test_connection_closed_before_blank_line() {
        let mut conn = MockConnection::new(b"GET / HTTP/1.0\r\nHost: x\r\n");
        assert!(matches!(
            block_on(RequestHead::read(&mut conn)),
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_overlong_request_line_is_truncated() {
        let mut request = alloc::vec::Vec::new();
        request.extend_from_slice(b"GET /");
        request.extend(core::iter::repeat_n(b'a', 1000));
        request.extend_from_slice(b" HTTP/1.0\r\n\r\n");

        let mut conn = MockConnection::new(&request);
        let head = block_on(RequestHead::read(&mut conn)).unwrap();
        assert_eq!(head.line().len(), REQUEST_LINE_CAPACITY);
        assert!(head.target().starts_with("/aaa"));
    }

    #[test]
    fn test_missing_target_defaults_to_root() {
        assert_eq!(RequestHead::from_line("GET").target(), "/");
        assert_eq!(RequestHead::from_line("").target(), "/");
    }

    #[test]
    fn test_classify_routes() {
        assert_eq!(Route::classify("/static/style.css"), Route::Stylesheet);
        assert_eq!(Route::classify("/"), Route::Stats);
        assert_eq!(Route::classify("/favicon.ico"), Route::Stats);
        assert_eq!(Route::classify("/static/style.css.bak"), Route::Stats);

        let Route::ChangeCalibration(params) = Route::classify("/changedivisor?ticksPerGallon=3032")
        else {
            panic!("expected calibration route");
        };
        assert_eq!(params.get(CALIBRATION_PARAM), Some("3032"));
    }

    #[test]
    fn test_query_params() {
        let params = QueryParams::parse("a=1&&b=&flag&a=2");
        assert_eq!(params.len(), 4);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some(""));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("missing"), None);

        assert!(QueryParams::parse("").is_empty());
    }

    #[test]
    fn test_query_params_cap() {
        let params = QueryParams::parse("a=1&b=2&c=3&d=4&e=5&f=6&g=7&h=8&i=9&j=10");
        assert_eq!(params.len(), MAX_QUERY_PAIRS);
        assert_eq!(params.get("i"), None);
    }
}

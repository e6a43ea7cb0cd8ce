#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers {
    use std::collections::VecDeque;
    use std::io::{self, Read};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use crate::error::{LoadError, Result};
    use crate::handoff::{Readiness, ReadyListener, Renderer};
    use crate::request::DisplayOptions;

    /// Reader that hands out its payload in fixed-size chunks
    pub struct ChunkedReader {
        payload: Vec<u8>,
        chunks: VecDeque<usize>,
        offset: usize,
        interrupt_next: bool,
    }

    impl ChunkedReader {
        pub fn new(payload: Vec<u8>, chunks: Vec<usize>) -> Self {
            Self {
                payload,
                chunks: chunks.into(),
                offset: 0,
                interrupt_next: false,
            }
        }

        /// Fail the first read with `ErrorKind::Interrupted`
        pub fn interrupt_first(mut self) -> Self {
            self.interrupt_next = true;
            self
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let Some(chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let remaining = self.payload.len() - self.offset;
            let n = chunk.min(buf.len()).min(remaining);
            buf[..n].copy_from_slice(&self.payload[self.offset..self.offset + n]);
            self.offset += n;
            Ok(n)
        }
    }

    /// What a [`RecordingRenderer`] was asked to display
    #[derive(Clone, Debug)]
    pub struct Displayed {
        pub bytes: Vec<u8>,
        pub password: Option<String>,
        pub options: DisplayOptions,
    }

    /// Renderer that records every call and answers with a fixed result
    pub struct RecordingRenderer {
        displayed: Vec<Displayed>,
        answer: std::result::Result<usize, String>,
    }

    impl RecordingRenderer {
        pub fn with_pages(page_count: usize) -> Self {
            Self {
                displayed: Vec::new(),
                answer: Ok(page_count),
            }
        }

        pub fn failing(reason: &str) -> Self {
            Self {
                displayed: Vec::new(),
                answer: Err(reason.to_string()),
            }
        }

        pub fn displayed(&self) -> &[Displayed] {
            &self.displayed
        }
    }

    impl Renderer for RecordingRenderer {
        fn display(
            &mut self,
            bytes: Vec<u8>,
            password: Option<&str>,
            options: &DisplayOptions,
        ) -> Result<usize> {
            self.displayed.push(Displayed {
                bytes,
                password: password.map(str::to_string),
                options: options.clone(),
            });
            self.answer.clone().map_err(LoadError::render)
        }
    }

    /// Listener that forwards its single signal into a channel
    pub fn recording_listener() -> (impl ReadyListener, flume::Receiver<Readiness>) {
        let (tx, rx) = flume::unbounded();
        let listener = move |readiness: Readiness| {
            let _ = tx.send(readiness);
        };
        (listener, rx)
    }

    /// Serve `payload` to the first client on a loopback port, in chunks
    pub fn serve_once(payload: Vec<u8>, chunk: usize) -> (u16, JoinHandle<()>) {
        use std::io::Write;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            for piece in payload.chunks(chunk.max(1)) {
                socket.write_all(piece).expect("write");
                socket.flush().expect("flush");
            }
        });
        (port, handle)
    }
}

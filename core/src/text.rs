//! Incremental UTF-8 decoding for byte streams.

/// Decodes a byte stream whose reads can split a multibyte character.
///
/// `push` decodes up to the last complete character and holds the partial
/// tail until the following read supplies the rest. Invalid sequences inside
/// a read become replacement characters without stopping the stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next read and get back everything decodable so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut decoded = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    decoded.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = consumed + err.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..valid_up_to],
                    ));
                    match err.error_len() {
                        // Truncated sequence at the end of the read: keep the
                        // tail for the next push.
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                        Some(len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        decoded
    }

    /// Flush at end-of-stream. An incomplete trailing sequence decodes to a
    /// replacement character.
    pub fn finish(&mut self) -> String {
        let decoded = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        decoded
    }
}

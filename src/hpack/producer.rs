use http::header::{HeaderName, HeaderValue};

use super::static_name_index;

/// A forward cursor over the headers to encode.
///
/// Callers drive it like a database cursor: call [`advance`] to move
/// onto the next header (including the first) before reading
/// [`name`]/[`value`]/[`static_hint`]; `advance` returning `false` means
/// the header set is exhausted and the other methods must not be
/// called again until the cursor is reset by the caller.
///
/// [`advance`]: HeaderProducer::advance
/// [`name`]: HeaderProducer::name
/// [`value`]: HeaderProducer::value
/// [`static_hint`]: HeaderProducer::static_hint
pub trait HeaderProducer {
    /// Advances to the next header. Returns `false` once exhausted.
    fn advance(&mut self) -> bool;

    /// The current header's name. Only valid after `advance` returned
    /// `true`.
    fn name(&self) -> &HeaderName;

    /// The current header's value. Only valid after `advance` returned
    /// `true`.
    fn value(&self) -> &HeaderValue;

    /// A wire index into the static table for the current header's
    /// name, if the producer already knows one. Returning `None` is
    /// always correct (if conservative) — the selector will fall back
    /// to a dynamic-table name lookup or a literal name.
    fn static_hint(&self) -> Option<usize>;
}

/// A [`HeaderProducer`] over a pre-materialized header list, for
/// callers that already have a `Vec` of headers and for this crate's
/// own tests.
pub struct VecHeaderProducer {
    headers: Vec<(HeaderName, HeaderValue)>,
    pos: Option<usize>,
}

impl VecHeaderProducer {
    pub fn new(headers: Vec<(HeaderName, HeaderValue)>) -> VecHeaderProducer {
        VecHeaderProducer { headers, pos: None }
    }

    /// Rewinds the cursor so the same header list can be driven through
    /// the producer contract again (e.g. once for
    /// `validate_max_header_list_size`, then again for the actual
    /// encode).
    pub fn reset(&mut self) {
        self.pos = None;
    }

    fn current(&self) -> &(HeaderName, HeaderValue) {
        &self.headers[self.pos.expect("name()/value() called before advance()")]
    }
}

impl HeaderProducer for VecHeaderProducer {
    fn advance(&mut self) -> bool {
        let next = match self.pos {
            None => 0,
            Some(p) => p + 1,
        };

        if next < self.headers.len() {
            self.pos = Some(next);
            true
        } else {
            false
        }
    }

    fn name(&self) -> &HeaderName {
        &self.current().0
    }

    fn value(&self) -> &HeaderValue {
        &self.current().1
    }

    fn static_hint(&self) -> Option<usize> {
        static_name_index(self.name())
    }
}

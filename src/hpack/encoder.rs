use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use tracing::trace;

use crate::error::EncoderError;

use super::primitive::{self, LiteralForm, Name};
use super::producer::HeaderProducer;
use super::table::DynamicTable;
use super::{entry_size, status_static_index, STATUS_STATIC_INDEX_200};

/// `:status` never appears through the producer contract (see
/// `HeaderProducer`), so its fixed byte length is hard-coded here for
/// `validate_max_header_list_size`.
const STATUS_PSEUDO_HEADER_NAME_LEN: usize = 7;

const UNBOUNDED_HEADER_LIST_SIZE: usize = usize::MAX;

type SensitivityPredicate = dyn Fn(&HeaderName, &HeaderValue) -> bool;

/// Encodes a stream of response headers into HPACK, one HTTP/2
/// connection's worth of state at a time.
///
/// Owns the dynamic table (and, through it, the entry pool) and the
/// per-header encoding-form decision. Not `Send`/`Sync`: a connection's
/// encoder is driven from a single thread, matching the single-writer
/// assumption of the HPACK dynamic table itself.
pub struct Encoder {
    table: DynamicTable,
    max_header_list_size: usize,
    is_sensitive: Option<Box<SensitivityPredicate>>,
    /// `true` when the previous `begin_encode_headers`/
    /// `continue_encode_headers` call advanced the producer onto a
    /// header it could not fit, so the next call must retry that same
    /// header rather than calling `advance` again.
    pending: bool,
}

impl Encoder {
    /// Creates an encoder whose dynamic table starts at
    /// `max_header_table_size` bytes (the peer's declared
    /// `SETTINGS_HEADER_TABLE_SIZE`) and with no sensitivity predicate
    /// (no header is ever treated as sensitive).
    pub fn new(max_header_table_size: usize) -> Encoder {
        Encoder {
            table: DynamicTable::new(max_header_table_size),
            max_header_list_size: UNBOUNDED_HEADER_LIST_SIZE,
            is_sensitive: None,
            pending: false,
        }
    }

    /// Like `new`, but with a sensitivity predicate: headers for which
    /// it returns `true` are always encoded as Literal Header Field
    /// Never Indexed and never enter the dynamic table.
    pub fn with_sensitivity<F>(max_header_table_size: usize, is_sensitive: F) -> Encoder
    where
        F: Fn(&HeaderName, &HeaderValue) -> bool + 'static,
    {
        Encoder {
            table: DynamicTable::new(max_header_table_size),
            max_header_list_size: UNBOUNDED_HEADER_LIST_SIZE,
            is_sensitive: Some(Box::new(is_sensitive)),
            pending: false,
        }
    }

    /// Changes the dynamic table's size cap, evicting from the oldest
    /// end as needed. Does not itself emit the HPACK "Dynamic Table
    /// Size Update" signal on the wire — see DESIGN.md.
    pub fn set_max_header_table_size(&mut self, size: usize) {
        self.table.set_max_size(size);
    }

    /// Changes the limit `validate_max_header_list_size` checks
    /// against. `usize::MAX` (the default) disables the check.
    pub fn set_max_header_list_size(&mut self, size: usize) {
        self.max_header_list_size = size;
    }

    /// Sums `name_len + value_len + 32` over `status` (if given) and
    /// every header the producer yields, rejecting the block before
    /// any dynamic-table mutation if the total exceeds the configured
    /// limit. Skips the walk entirely when no limit has been set.
    pub fn validate_max_header_list_size<P: HeaderProducer>(
        &self,
        status: Option<StatusCode>,
        producer: &mut P,
    ) -> Result<(), EncoderError> {
        if self.max_header_list_size == UNBOUNDED_HEADER_LIST_SIZE {
            return Ok(());
        }

        let mut total = 0usize;

        if let Some(status) = status {
            total += STATUS_PSEUDO_HEADER_NAME_LEN + status.as_str().len() + 32;
        }

        while producer.advance() {
            total += entry_size(producer.name(), producer.value());

            if total > self.max_header_list_size {
                return Err(EncoderError::HeaderListTooLarge {
                    limit: self.max_header_list_size,
                });
            }
        }

        Ok(())
    }

    /// Starts a new header block: encodes `status` (if given), then as
    /// many of the producer's headers as fit in `dst`.
    ///
    /// Returns `(bytes_written, complete)`. `complete == false` means
    /// the producer still has headers left (or the most recent one
    /// didn't fit); the caller should flush `dst` as a HEADERS or
    /// CONTINUATION frame and call `continue_encode_headers` for the
    /// rest. `throw_if_none_encoded` governs what happens if a single
    /// header is larger than all of `dst` and nothing else has been
    /// written yet: `true` raises `EncoderError::Full`, `false` returns
    /// `(0, false)` so the caller can retry with a larger buffer.
    pub fn begin_encode_headers<P: HeaderProducer>(
        &mut self,
        status: Option<StatusCode>,
        producer: &mut P,
        dst: &mut [u8],
        throw_if_none_encoded: bool,
    ) -> Result<(usize, bool), EncoderError> {
        self.pending = false;
        let mut pos = 0;
        let mut any_written = false;

        if let Some(status) = status {
            match self.encode_status(status, dst) {
                Some(n) => {
                    pos += n;
                    any_written = true;
                }
                None => return Err(EncoderError::Full),
            }
        }

        let (written, complete) = self.drive(producer, &mut dst[pos..], any_written, throw_if_none_encoded)?;
        Ok((pos + written, complete))
    }

    /// Continues a header block started by `begin_encode_headers` into
    /// a CONTINUATION frame. Always strict: if nothing fits, raises
    /// `EncoderError::Full` rather than looping forever on an
    /// oversized header.
    pub fn continue_encode_headers<P: HeaderProducer>(
        &mut self,
        producer: &mut P,
        dst: &mut [u8],
    ) -> Result<(usize, bool), EncoderError> {
        self.drive(producer, dst, false, true)
    }

    fn drive<P: HeaderProducer>(
        &mut self,
        producer: &mut P,
        dst: &mut [u8],
        mut any_written: bool,
        throw_if_none_encoded: bool,
    ) -> Result<(usize, bool), EncoderError> {
        let mut pos = 0;

        loop {
            if !self.pending {
                if !producer.advance() {
                    return Ok((pos, true));
                }
                self.pending = true;
            }

            let static_hint = producer.static_hint();

            match self.select_and_write(producer.name(), producer.value(), static_hint, &mut dst[pos..]) {
                Some(n) => {
                    pos += n;
                    any_written = true;
                    self.pending = false;
                }
                None if any_written => return Ok((pos, false)),
                None if throw_if_none_encoded => return Err(EncoderError::Full),
                None => return Ok((pos, false)),
            }
        }
    }

    fn encode_status(&mut self, status: StatusCode, dst: &mut [u8]) -> Option<usize> {
        if let Some(idx) = status_static_index(status.as_u16()) {
            return primitive::encode_indexed(idx, dst);
        }

        primitive::encode_literal(
            LiteralForm::WithoutIndexing,
            Name::Indexed(STATUS_STATIC_INDEX_200),
            status.as_str().as_bytes(),
            dst,
        )
    }

    /// The per-header encoding-form decision (spec §4.2): sensitive
    /// headers go Never Indexed; a disabled or too-small dynamic table
    /// forces Without Indexing; otherwise an exact dynamic-table hit is
    /// Indexed, and a miss is inserted via With Incremental Indexing.
    /// Whenever a name index is needed, the static table is always
    /// preferred over the dynamic table, since it is smaller and
    /// doesn't depend on peer synchronization.
    fn select_and_write(
        &mut self,
        name: &HeaderName,
        value: &HeaderValue,
        static_hint: Option<usize>,
        dst: &mut [u8],
    ) -> Option<usize> {
        let header_size = entry_size(name, value);
        let sensitive = self.is_sensitive.as_ref().map_or(false, |f| f(name, value));

        if sensitive {
            let name_idx = static_hint.or_else(|| self.table.lookup_name(name));
            let n = Self::write_literal(LiteralForm::NeverIndexed, name_idx, name, value, dst)?;
            trace!(?name_idx, "encoded sensitive header as never-indexed literal");
            return Some(n);
        }

        if self.table.max_size() == 0 {
            let n = Self::write_literal(LiteralForm::WithoutIndexing, static_hint, name, value, dst)?;
            return Some(n);
        }

        if header_size > self.table.max_size() {
            let name_idx = static_hint.or_else(|| self.table.lookup_name(name));
            let n = Self::write_literal(LiteralForm::WithoutIndexing, name_idx, name, value, dst)?;
            return Some(n);
        }

        if let Some(hit) = self.table.lookup_name_and_value(name, value) {
            let n = primitive::encode_indexed(hit.wire_index, dst)?;
            trace!(wire_index = hit.wire_index, "encoded as indexed header field");
            return Some(n);
        }

        let name_idx = static_hint.or_else(|| self.table.lookup_name(name));
        let n = Self::write_literal(LiteralForm::WithIndexing, name_idx, name, value, dst)?;

        self.table.ensure_capacity(header_size);
        self.table.insert(name.clone(), value.clone(), header_size);
        trace!(header_size, "inserted into dynamic table");

        Some(n)
    }

    fn write_literal(
        form: LiteralForm,
        name_idx: Option<usize>,
        name: &HeaderName,
        value: &HeaderValue,
        dst: &mut [u8],
    ) -> Option<usize> {
        let name_arg = match name_idx {
            Some(idx) => Name::Indexed(idx),
            None => Name::Literal(name.as_str().as_bytes()),
        };
        primitive::encode_literal(form, name_arg, value.as_bytes(), dst)
    }
}

impl Default for Encoder {
    fn default() -> Encoder {
        Encoder::new(4096)
    }
}

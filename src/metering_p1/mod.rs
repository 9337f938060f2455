use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::obis_utils::{CosemObjectFactory, ObisRegistry};

pub mod crc;
pub mod listener;
pub mod structs;
pub mod utils;

use crc::Crc16;
use listener::TelegramListener;
use structs::{RawCosem, Telegram};

/// Longest frame accepted before the parser gives up on it. Well above what DSMR 5 and
/// e-MUCS meters send, including the monthly peak history.
pub const MAX_TELEGRAM_LENGTH: usize = 8192;

/// Position of the parser in the telegram grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    WaitForStart,
    Header,
    Crlf,
    ObisId,
    ObisValue,
    ObisValueEnd,
    CrcValue,
}

impl ParserState {
    /* Bytes consumed in these states are part of the checksum */
    fn feeds_crc(&self) -> bool {
        matches!(
            self,
            ParserState::Header
                | ParserState::Crlf
                | ParserState::ObisId
                | ParserState::ObisValue
                | ParserState::ObisValueEnd
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FramingCorruption,
    ChecksumMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelegramError {
    #[error("Unexpected character {character:?} in state {state:?}")]
    FramingCorruption { state: ParserState, character: char },
    #[error("CRC mismatch, telegram says {transmitted:?} but computed {computed:04X}")]
    ChecksumMismatch { transmitted: String, computed: u16 },
}

impl TelegramError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TelegramError::FramingCorruption { .. } => ErrorKind::FramingCorruption,
            TelegramError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
        }
    }
}

/// Requests a parser reset from another thread. The parser drops its in-flight telegram
/// before it handles the next byte.
#[derive(Clone, Debug)]
pub struct ResetHandle {
    requested: Arc<AtomicBool>,
}

impl ResetHandle {
    pub fn reset(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

/// Streaming parser for P1 telegrams.
///
/// Bytes can be handed over in chunks of any size, a telegram may be split anywhere. Every
/// framed telegram ends in at most one listener call: `telegram_received` if it was complete
/// and its CRC matched, `on_error` otherwise. In test mode checksum errors are returned from
/// `parse` instead.
pub struct TelegramParser<L: TelegramListener, F: CosemObjectFactory = ObisRegistry> {
    listener: L,
    factory: F,
    state: ParserState,
    lenient: bool,
    test_mode: bool,
    crc: Crc16,
    corrupted: bool,
    header: String,
    obis_id: String,
    obis_value: String,
    values: Vec<String>,
    entries: Vec<RawCosem>,
    crc_text: String,
    raw_text: String,
    frame_len: usize,
    reset_requested: Arc<AtomicBool>,
}

impl<L: TelegramListener> TelegramParser<L> {
    /// Parser recognizing the DSMR / e-MUCS objects
    pub fn dsmr(listener: L) -> Self {
        return TelegramParser::new(listener, ObisRegistry::dsmr());
    }
}

impl<L: TelegramListener, F: CosemObjectFactory> TelegramParser<L, F> {
    pub fn new(listener: L, factory: F) -> Self {
        return TelegramParser {
            listener,
            factory,
            state: ParserState::WaitForStart,
            lenient: false,
            test_mode: false,
            crc: Crc16::new(),
            corrupted: false,
            header: String::new(),
            obis_id: String::new(),
            obis_value: String::new(),
            values: Vec::new(),
            entries: Vec::new(),
            crc_text: String::new(),
            raw_text: String::new(),
            frame_len: 0,
            reset_requested: Arc::new(AtomicBool::new(false)),
        };
    }

    pub fn state(&self) -> ParserState {
        return self.state;
    }

    pub fn listener(&self) -> &L {
        return &self.listener;
    }

    pub fn listener_mut(&mut self) -> &mut L {
        return &mut self.listener;
    }

    /// Lenient mode keeps the raw text and unknown objects and tries to stay in the grammar
    /// after an unexpected character instead of dropping the telegram right away.
    pub fn set_lenient_mode(&mut self, enabled: bool) {
        self.lenient = enabled;
    }

    /// In test mode a checksum mismatch is returned from `parse` instead of being reported
    /// to the listener.
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
    }

    pub fn reset_handle(&self) -> ResetHandle {
        return ResetHandle { requested: self.reset_requested.clone() };
    }

    /// Drops any partial telegram and waits for the next `/`
    pub fn reset(&mut self) {
        self.reset_requested.store(false, Ordering::Release);
        self.set_state(ParserState::WaitForStart);
    }

    /// Feeds the next chunk of the byte stream.
    ///
    /// Only fails in test mode, with the checksum error of the telegram that ended in this
    /// chunk. The rest of the chunk is not processed in that case.
    pub fn parse(&mut self, data: &[u8]) -> Result<(), TelegramError> {
        for &byte in data {
            if self.reset_requested.swap(false, Ordering::AcqRel) {
                debug!("Reset requested, dropping partial telegram");
                self.set_state(ParserState::WaitForStart);
            }
            self.process(byte)?;
        }
        Ok(())
    }

    fn process(&mut self, byte: u8) -> Result<(), TelegramError> {
        let c = byte as char;
        let previous = self.state;

        if self.state != ParserState::WaitForStart {
            self.frame_len += 1;
            if self.frame_len > MAX_TELEGRAM_LENGTH {
                self.framing_error(c);
                self.set_state(ParserState::WaitForStart);
            }
        }

        match self.state {
            ParserState::WaitForStart => {
                if c == '/' {
                    self.set_state(ParserState::Header);
                }
            }
            ParserState::Header => {
                if c == '\r' {
                    self.set_state(ParserState::Crlf);
                } else {
                    self.header.push(c);
                }
            }
            ParserState::Crlf => {
                if c.is_ascii_whitespace() {
                    // blank lines between header and data
                } else if c.is_ascii_digit() {
                    self.obis_id.push(c);
                    self.set_state(ParserState::ObisId);
                } else {
                    self.framing_error(c);
                    self.resync(c);
                }
            }
            ParserState::ObisId => {
                if c.is_ascii_whitespace() {
                    // ignored
                } else if is_obis_char(c) {
                    self.obis_id.push(c);
                } else if c == '(' {
                    self.set_state(ParserState::ObisValue);
                } else if c == '!' {
                    self.framing_error(c);
                    if self.lenient {
                        self.clear_object();
                        self.set_state(ParserState::CrcValue);
                    } else {
                        self.set_state(ParserState::WaitForStart);
                    }
                } else {
                    self.framing_error(c);
                    if self.lenient && c != '/' {
                        self.clear_object();
                    } else {
                        self.resync(c);
                    }
                }
            }
            ParserState::ObisValue => {
                if c == ')' {
                    let value = mem::take(&mut self.obis_value);
                    self.values.push(value);
                    self.set_state(ParserState::ObisValueEnd);
                } else {
                    self.obis_value.push(c);
                }
            }
            ParserState::ObisValueEnd => {
                if c.is_ascii_whitespace() {
                    // line breaks between objects
                } else if c.is_ascii_digit() {
                    self.store_object();
                    self.obis_id.push(c);
                    self.set_state(ParserState::ObisId);
                } else if c == '(' {
                    // another value group of the same object
                    self.set_state(ParserState::ObisValue);
                } else if c == '!' {
                    self.store_object();
                    self.set_state(ParserState::CrcValue);
                } else {
                    self.framing_error(c);
                    if !self.lenient || c == '/' {
                        self.resync(c);
                    }
                }
            }
            ParserState::CrcValue => {
                if c == '\r' || c == '/' {
                    if let Err(e) = self.finish_telegram() {
                        self.set_state(ParserState::WaitForStart);
                        return Err(e);
                    }
                    self.resync(c);
                } else {
                    self.crc_text.push(c);
                }
            }
        }

        /* The checksum runs from the opening '/' up to and including the closing '!' */
        if self.state.feeds_crc()
            || (self.state == ParserState::CrcValue && previous != ParserState::CrcValue)
        {
            self.crc.process_byte(byte);
        }

        if self.lenient && self.state != ParserState::WaitForStart {
            self.raw_text.push(c);
        }

        Ok(())
    }

    fn set_state(&mut self, new_state: ParserState) {
        match new_state {
            ParserState::WaitForStart => {
                self.clear_telegram();
            }
            ParserState::Header => {
                self.clear_telegram();
                self.crc.initialize();
            }
            _ => {}
        }
        self.state = new_state;
    }

    /* A '/' outside of a value is the start of the next telegram */
    fn resync(&mut self, c: char) {
        if c == '/' {
            self.set_state(ParserState::Header);
        } else {
            self.set_state(ParserState::WaitForStart);
        }
    }

    fn clear_object(&mut self) {
        self.obis_id.clear();
        self.obis_value.clear();
        self.values.clear();
    }

    fn clear_telegram(&mut self) {
        self.clear_object();
        self.header.clear();
        self.entries.clear();
        self.crc_text.clear();
        self.raw_text.clear();
        self.frame_len = 0;
        self.corrupted = false;
    }

    fn store_object(&mut self) {
        if !self.obis_id.is_empty() {
            self.entries.push(RawCosem {
                obis: self.obis_id.clone(),
                values: mem::take(&mut self.values),
            });
        }
        self.clear_object();
    }

    /* Reported once per telegram, whatever the mode */
    fn framing_error(&mut self, c: char) {
        if self.corrupted {
            return;
        }
        self.corrupted = true;
        warn!("Corrupted telegram, unexpected character {:?} in state {:?}", c, self.state);
        self.listener.on_error(TelegramError::FramingCorruption {
            state: self.state,
            character: c,
        });
    }

    fn finish_telegram(&mut self) -> Result<(), TelegramError> {
        self.store_object();

        if self.corrupted {
            debug!("Dropping telegram with {} objects after framing error", self.entries.len());
            return Ok(());
        }

        // DSMR 2.x meters do not send a CRC at all
        if !self.crc_text.is_empty() {
            let computed = self.crc.current_code();
            if utils::parse_crc_text(&self.crc_text) != Some(computed) {
                let error = TelegramError::ChecksumMismatch {
                    transmitted: self.crc_text.clone(),
                    computed,
                };
                warn!("{}", error);
                if self.test_mode {
                    return Err(error);
                }
                self.listener.on_error(error);
                return Ok(());
            }
        }

        let telegram = self.build_telegram();
        debug!(
            "Telegram from {} with {} objects ({} unknown)",
            telegram.header,
            telegram.objects.len(),
            telegram.unknown_objects.len()
        );
        self.listener.telegram_received(telegram);
        Ok(())
    }

    fn build_telegram(&mut self) -> Telegram {
        let mut objects = Vec::with_capacity(self.entries.len());
        let mut unknown_objects = Vec::new();

        for raw in self.entries.drain(..) {
            match self.factory.create(&raw) {
                Some(obj) => objects.push(obj),
                None if self.lenient => unknown_objects.push(raw),
                None => debug!("Ignoring unknown object {}", raw.obis),
            }
        }

        return Telegram {
            header: self.header.clone(),
            objects,
            raw_text: if self.lenient { self.raw_text.clone() } else { String::new() },
            unknown_objects,
        };
    }
}

fn is_obis_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ':' | '-' | '.' | '*')
}

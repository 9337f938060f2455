use log::debug;

use super::structs::Telegram;
use super::TelegramError;

/// What a parser hands out per telegram when listeners are channels
pub type TelegramEvent = Result<Telegram, TelegramError>;

/// Receives the outcome of every framed telegram.
///
/// Both methods are called synchronously from within `TelegramParser::parse` and receive
/// owned data.
pub trait TelegramListener {
    fn telegram_received(&mut self, telegram: Telegram);

    fn on_error(&mut self, error: TelegramError);
}

impl TelegramListener for std::sync::mpsc::Sender<TelegramEvent> {
    fn telegram_received(&mut self, telegram: Telegram) {
        if self.send(Ok(telegram)).is_err() {
            debug!("Telegram receiver is gone, dropping telegram");
        }
    }

    fn on_error(&mut self, error: TelegramError) {
        if self.send(Err(error)).is_err() {
            debug!("Telegram receiver is gone, dropping error");
        }
    }
}

#[cfg(feature = "reader")]
impl TelegramListener for tokio::sync::mpsc::UnboundedSender<TelegramEvent> {
    fn telegram_received(&mut self, telegram: Telegram) {
        if self.send(Ok(telegram)).is_err() {
            debug!("Telegram receiver is gone, dropping telegram");
        }
    }

    fn on_error(&mut self, error: TelegramError) {
        if self.send(Err(error)).is_err() {
            debug!("Telegram receiver is gone, dropping error");
        }
    }
}

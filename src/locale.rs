//! Static message tables for the front end

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ErrorKind;

/// Language of the user interface (not of the video)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiLanguage {
    #[default]
    Ru,
    En,
}

impl UiLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            UiLanguage::Ru => "ru",
            UiLanguage::En => "en",
        }
    }

    pub fn messages(&self) -> &'static Messages {
        match self {
            UiLanguage::Ru => &RU,
            UiLanguage::En => &EN,
        }
    }
}

impl fmt::Display for UiLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UiLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" => Ok(UiLanguage::Ru),
            "en" => Ok(UiLanguage::En),
            other => Err(format!("Unsupported interface language: {}", other)),
        }
    }
}

#[derive(Debug)]
pub struct Messages {
    pub preparing: &'static str,
    pub uploading: &'static str,
    pub awaiting: &'static str,
    pub done: &'static str,
    pub error_heading: &'static str,
    pub timeout: &'static str,
    pub generic_error: &'static str,
    pub no_file: &'static str,
    pub result: &'static str,
    pub language_label: &'static str,
    pub speakers: &'static str,
    pub text: &'static str,
    pub subtitles: &'static str,
    pub segments: &'static str,
    pub saved_to: &'static str,
}

impl Messages {
    /// User-facing message for a failed attempt. Timeouts get the localized
    /// explanation; other kinds keep the service or transport message.
    pub fn failure_text<'a>(&'a self, kind: ErrorKind, message: &'a str) -> &'a str {
        match kind {
            ErrorKind::Timeout => self.timeout,
            ErrorKind::ValidationError if message.is_empty() => self.no_file,
            _ if message.trim().is_empty() => self.generic_error,
            _ => message,
        }
    }
}

pub static RU: Messages = Messages {
    preparing: "Подготовка...",
    uploading: "Загрузка файла...",
    awaiting: "Обработка на сервере...",
    done: "Готово",
    error_heading: "Ошибка",
    timeout: "Загрузка прервана из-за таймаута. Попробуйте файл меньшего размера или подождите.",
    generic_error: "Произошла ошибка при загрузке файла",
    no_file: "Файл не выбран",
    result: "Результат",
    language_label: "Язык",
    speakers: "Спикеры",
    text: "Текст",
    subtitles: "Субтитры",
    segments: "Сегменты",
    saved_to: "Сохранено",
};

pub static EN: Messages = Messages {
    preparing: "Preparing...",
    uploading: "Uploading file...",
    awaiting: "Processing on server...",
    done: "Done",
    error_heading: "Error",
    timeout: "Upload aborted due to timeout. Try a smaller file or wait.",
    generic_error: "An error occurred while uploading the file",
    no_file: "No file selected",
    result: "Result",
    language_label: "Language",
    speakers: "Speakers",
    text: "Text",
    subtitles: "Subtitles",
    segments: "Segments",
    saved_to: "Saved",
};

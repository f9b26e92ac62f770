use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "audio")]
    Audio,
}

impl FormatKind {
    /// Anything that is not exactly `audio` is treated as video.
    pub fn from_form(value: &str) -> Self {
        match value {
            "audio" => FormatKind::Audio,
            _ => FormatKind::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Video => "video",
            FormatKind::Audio => "audio",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Video => "mp4",
            FormatKind::Audio => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FormatKind::Video => "video/mp4",
            FormatKind::Audio => "audio/mpeg",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque format identifier handed out by the backend. Accepted as either a
/// JSON string or number and always forwarded as text.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Itag(pub String);

impl<'de> Deserialize<'de> for Itag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Itag(text),
            Raw::Number(number) => Itag(number.to_string()),
        })
    }
}

impl fmt::Display for Itag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FormatRecord {
    pub itag: Itag,
    #[serde(rename = "type")]
    pub kind: FormatKind,
    pub resolution: String,
    pub size: String,
    #[serde(default)]
    pub fps: Option<f32>,
}

impl FormatRecord {
    pub fn label(&self) -> String {
        format!("{} ({}, {})", self.resolution, self.kind, self.size)
    }
}

/// Body of `POST /get_formats`. Either `error` is set, or `title` and
/// `formats` are.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FormatsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<FormatRecord>>,
}

impl FormatsResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

pub fn human_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(bytes) => format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)),
        None => "Unknown".to_string(),
    }
}

pub struct Selector;

impl Selector {
    pub fn for_download(itag: &str, kind: FormatKind) -> String {
        match kind {
            FormatKind::Audio => itag.to_string(),
            FormatKind::Video => {
                format!("{itag}[acodec!=none]/{itag}+ba[ext=m4a]/{itag}+ba")
            }
        }
    }
}

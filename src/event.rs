use serde::Serialize;

/// One line of the output protocol.
///
/// Every event is serialized as a single JSON object with a `"type"` discriminator:
///
/// ```json
/// {"type":"meta","language":"hi","probability":0.93}
/// {"type":"segment","start":0.0,"end":4.2,"text":" Good morning everyone."}
/// {"type":"error","message":"File not found"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// Emitted exactly once, before any segment.
    Meta { language: String, probability: f32 },

    /// One contiguous span of recognized speech. Times are seconds from the start of the file.
    Segment { start: f64, end: f64, text: String },

    /// Terminal failure. Nothing follows it.
    Error { message: String },
}

impl Event {
    pub fn meta(language: impl Into<String>, probability: f32) -> Self {
        Self::Meta {
            language: language.into(),
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

use serde_json::Value;

/// Control request from the display.
///
/// Values are raw and unclamped; the handler validates them. Fields that were
/// absent or could not be coerced to an integer are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlCommand {
    /// Altimeter setting, hundredths of inHg
    pub qnh: Option<i64>,
    /// Display brightness, percent
    pub brightness: Option<i64>,
}

impl ControlCommand {
    /// Extracts the known keys from a JSON document, ignoring everything else
    pub fn from_value(value: &Value) -> Self {
        ControlCommand {
            qnh: value.get("qnh").and_then(coerce_int),
            brightness: value.get("brightness").and_then(coerce_int),
        }
    }

    /// Whether the command asks for nothing
    pub fn is_empty(&self) -> bool {
        self.qnh.is_none() && self.brightness.is_none()
    }
}

/// Text messages the display sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// The display finished loading
    Ready,
    /// The display asks the server to close the connection
    Close,
    Command(ControlCommand),
}

impl InboundMessage {
    /// Parses one line from the display.
    ///
    /// JSON may be sent bare or behind a `json` prefix. Returns `None` for
    /// anything unrecognised, including malformed JSON.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "ready" => return Some(InboundMessage::Ready),
            "close" => return Some(InboundMessage::Close),
            _ => {}
        }

        let body = text.strip_prefix("json").unwrap_or(text);
        let value: Value = serde_json::from_str(body).ok()?;
        Some(InboundMessage::Command(ControlCommand::from_value(&value)))
    }
}

/// Best-effort integer coercion: floats truncate, numeric strings parse
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn truncate(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

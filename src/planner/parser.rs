use std::collections::BTreeMap;

use thiserror::Error;

use crate::planner::state::{ParamValue, ParsedAction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Turns a free-text model reply into an action.
///
/// The first non-empty line (lowercased) names the action. Every later line
/// shaped `key: value` becomes a parameter; lines without a `:` or with an
/// empty key are skipped.
pub fn parse(text: &str) -> Result<ParsedAction, ParseError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let function_name = lines.next().ok_or(ParseError::EmptyResponse)?.to_lowercase();

    let mut parameters = BTreeMap::new();
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            tracing::trace!(line, "skipping line without separator");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        parameters.insert(key.to_string(), coerce_value(value.trim()));
    }

    Ok(ParsedAction {
        function_name,
        parameters,
    })
}

/// Values containing `.` are tried as floats, everything else as integers;
/// whatever fails to parse stays text.
pub fn coerce_value(raw: &str) -> ParamValue {
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return ParamValue::Float(f);
        }
    } else if let Ok(i) = raw.parse::<i64>() {
        return ParamValue::Int(i);
    }
    ParamValue::Text(raw.to_string())
}

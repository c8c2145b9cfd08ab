use std::collections::HashMap;

use tera::{Tera, Value};
use time::{
    OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339,
    macros::format_description,
};

pub(super) fn register(tera: &mut Tera) {
    tera.register_filter("human_date", human_date);
}

/// Formats an RFC 3339 timestamp as `02 Jan 2006 at 15:04` in UTC.
fn human_date(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("`human_date` expects an RFC 3339 string"))?;

    let instant = OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|err| tera::Error::msg(format!("`human_date` could not parse `{raw}`: {err}")))?
        .to_offset(UtcOffset::UTC);

    let formatted = instant
        .format(format_description!(
            "[day] [month repr:short] [year] at [hour]:[minute]"
        ))
        .map_err(|err| tera::Error::msg(format!("`human_date` could not format: {err}")))?;

    Ok(Value::String(formatted))
}

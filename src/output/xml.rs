use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::errors::{MftError, Result};
use crate::models::OutputRow;

fn io_invalid(err: impl ToString) -> MftError {
    MftError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        err.to_string(),
    ))
}

/// `<mft><record>…</record>…</mft>` with one element per row column.
pub fn write_xml(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(io_invalid)?;
    writer
        .write_event(Event::Start(BytesStart::new("mft")))
        .map_err(io_invalid)?;

    for row in rows {
        // Reuse the serde field names rather than spelling the schema out
        // a second time.
        let value = serde_json::to_value(row).map_err(io_invalid)?;
        let object = value.as_object().ok_or_else(|| io_invalid("row is not an object"))?;
        writer
            .write_event(Event::Start(BytesStart::new("record")))
            .map_err(io_invalid)?;
        for (key, field) in object {
            let text = match field {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            writer
                .write_event(Event::Start(BytesStart::new(key.as_str())))
                .map_err(io_invalid)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(io_invalid)?;
            writer
                .write_event(Event::End(BytesEnd::new(key.as_str())))
                .map_err(io_invalid)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("record")))
            .map_err(io_invalid)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("mft")))
        .map_err(io_invalid)?;
    Ok(())
}

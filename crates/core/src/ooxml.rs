//! Helpers shared by the Office Open XML readers.

use crate::{Error, Result};
use quick_xml::events::BytesStart;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Read a part from the package as text.
pub fn read_file_from_archive<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Attribute value by local name, unescaped.
pub fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == name)
        .map(|attr| {
            attr.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn archive() -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("xl/workbook.xml", FileOptions::default()).unwrap();
        zip.write_all(b"<workbook/>").unwrap();
        ZipArchive::new(Cursor::new(zip.finish().unwrap().into_inner())).unwrap()
    }

    #[test]
    fn test_read_file_from_archive() {
        let mut archive = archive();
        assert_eq!(
            read_file_from_archive(&mut archive, "xl/workbook.xml").unwrap(),
            "<workbook/>"
        );
        assert!(matches!(
            read_file_from_archive(&mut archive, "xl/styles.xml"),
            Err(Error::ZipError(_))
        ));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:pic"), b"pic");
        assert_eq!(local_name(b"x:row"), b"row");
        assert_eq!(local_name(b"row"), b"row");
    }

    #[test]
    fn test_attribute_by_local_name() {
        let mut reader = Reader::from_str(r#"<sheet name="A &amp; B" r:id="rId2"/>"#);
        let Ok(Event::Empty(e)) = reader.read_event() else {
            panic!("expected an empty element");
        };
        assert_eq!(attribute(&e, b"name").as_deref(), Some("A & B"));
        assert_eq!(attribute(&e, b"id").as_deref(), Some("rId2"));
        assert_eq!(attribute(&e, b"state"), None);
    }
}

//! Reads a written deck back: slide order and the pictures on each slide.

use present_core::ooxml::{attribute, local_name, read_file_from_archive};
use present_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// A picture found on a slide, with its frame in EMU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidePicture {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// One slide, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedSlide {
    /// 1-based position in the deck.
    pub number: usize,
    /// Part path inside the package.
    pub path: String,
    pub pictures: Vec<SlidePicture>,
}

/// What a deck contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckLayout {
    pub slides: Vec<InspectedSlide>,
}

impl DeckLayout {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn picture_counts(&self) -> Vec<usize> {
        self.slides.iter().map(|s| s.pictures.len()).collect()
    }
}

/// Reader for `.pptx` packages.
pub struct DeckInspector;

impl DeckInspector {
    pub fn new() -> Self {
        Self
    }

    pub fn open(&self, path: &Path) -> Result<DeckLayout> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        self.inspect(std::io::BufReader::new(file))
    }

    /// Inspect a deck from a reader.
    pub fn inspect<R: Read + Seek>(&self, reader: R) -> Result<DeckLayout> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut layout = DeckLayout::default();
        for (idx, slide_path) in self.get_slide_order(&mut archive)?.into_iter().enumerate() {
            let content = read_file_from_archive(&mut archive, &slide_path)?;
            layout.slides.push(InspectedSlide {
                number: idx + 1,
                pictures: extract_pictures(&content)?,
                path: slide_path,
            });
        }

        Ok(layout)
    }

    /// Get the ordered list of slide paths from the presentation relationships.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = read_file_from_archive(archive, "ppt/_rels/presentation.xml.rels")?;
        let mut slides: Vec<(String, Option<usize>)> = Vec::new();

        let mut reader = Reader::from_str(&rels_content);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let rel_type = attribute(e, b"Type").unwrap_or_default();
                    let target = attribute(e, b"Target").unwrap_or_default();

                    if rel_type.ends_with("/slide") {
                        // Slide parts are numbered in deck order.
                        let order_num = extract_slide_number(&target);
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("ppt/{}", target),
                        };
                        slides.push((full_path, order_num));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
                }
                _ => {}
            }
        }

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }
}

impl Default for DeckInspector {
    fn default() -> Self {
        Self::new()
    }
}

/// Pictures on a slide, in drawing order.
fn extract_pictures(xml_content: &str) -> Result<Vec<SlidePicture>> {
    let mut pictures = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    let mut current: Option<SlidePicture> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"pic" => {
                current = Some(SlidePicture::default());
            }
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if let Some(ref mut picture) = current {
                    match local_name(e.name().as_ref()) {
                        b"off" => {
                            picture.x = numeric(e, b"x");
                            picture.y = numeric(e, b"y");
                        }
                        b"ext" => {
                            picture.cx = numeric(e, b"cx");
                            picture.cy = numeric(e, b"cy");
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"pic" => {
                if let Some(picture) = current.take() {
                    pictures.push(picture);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing slide: {}", e)));
            }
            _ => {}
        }
    }

    Ok(pictures)
}

fn numeric(e: &BytesStart, name: &[u8]) -> i64 {
    attribute(e, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

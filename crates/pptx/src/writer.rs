//! PPTX deck writer.

use crate::parts::{self, Relationship};
use present_core::{AssetPaths, DeckAssembler, DeckSummary, Error, Result};
use quick_xml::escape::escape;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// 10 inches.
pub const SLIDE_WIDTH: i64 = 9_144_000;

/// 7.5 inches.
pub const SLIDE_HEIGHT: i64 = 6_858_000;

/// Image formats a deck can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl MediaFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Png => "png",
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Gif => "gif",
            MediaFormat::WebP => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            MediaFormat::Png => "image/png",
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Gif => "image/gif",
            MediaFormat::WebP => "image/webp",
        }
    }

    fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(MediaFormat::Png),
            image::ImageFormat::Jpeg => Some(MediaFormat::Jpeg),
            image::ImageFormat::Gif => Some(MediaFormat::Gif),
            image::ImageFormat::WebP => Some(MediaFormat::WebP),
            _ => None,
        }
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            MediaFormat::Png => image::ImageFormat::Png,
            MediaFormat::Jpeg => image::ImageFormat::Jpeg,
            MediaFormat::Gif => image::ImageFormat::Gif,
            MediaFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

/// An image ready to be embedded, with its sniffed format and pixel size.
#[derive(Debug, Clone)]
pub struct MediaImage {
    bytes: Vec<u8>,
    format: MediaFormat,
    width: u32,
    height: u32,
    name: String,
}

impl MediaImage {
    /// Sniff format and dimensions from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let format = image::guess_format(&bytes)
            .ok()
            .and_then(MediaFormat::from_image_format)
            .ok_or_else(|| Error::AssemblyError(format!("'{}' is not a supported image", name)))?;

        let (width, height) =
            image::ImageReader::with_format(Cursor::new(&bytes), format.to_image_format())
                .into_dimensions()
                .map_err(|e| Error::AssemblyError(format!("Cannot read size of '{}': {}", name, e)))?;

        if width == 0 || height == 0 {
            return Err(Error::AssemblyError(format!("'{}' has no pixels", name)));
        }

        Ok(Self {
            bytes,
            format,
            width,
            height,
            name,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(std::fs::read(path)?, name)
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Width in EMU when scaled to `height` EMU, keeping the aspect ratio.
    pub fn width_for_height(&self, height: i64) -> i64 {
        height * self.width as i64 / self.height as i64
    }

    /// Height in EMU when scaled to `width` EMU, keeping the aspect ratio.
    pub fn height_for_width(&self, width: i64) -> i64 {
        width * self.height as i64 / self.width as i64
    }
}

/// Position and size of a picture, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Placement {
    /// The whole slide canvas.
    pub fn full_canvas() -> Self {
        Self {
            x: 0,
            y: 0,
            cx: SLIDE_WIDTH,
            cy: SLIDE_HEIGHT,
        }
    }
}

/// Index of a media part inside a [`DeckWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaId(usize);

/// In-memory deck of picture-only slides.
///
/// A media part may appear on any number of slides; it is stored once.
#[derive(Debug, Default)]
pub struct DeckWriter {
    media: Vec<MediaImage>,
    slides: Vec<Vec<(MediaId, Placement)>>,
}

impl DeckWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_media(&mut self, image: MediaImage) -> MediaId {
        self.media.push(image);
        MediaId(self.media.len() - 1)
    }

    /// Append a slide showing `pictures`, drawn in order.
    pub fn add_slide(&mut self, pictures: &[(MediaId, Placement)]) {
        self.slides.push(pictures.to_vec());
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn media_part_name(&self, id: MediaId) -> String {
        format!("image{}.{}", id.0 + 1, self.media[id.0].format.extension())
    }

    /// Serialize the whole package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let xml_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let media_options = FileOptions::default().compression_method(CompressionMethod::Stored);

        let mut media_types: Vec<(&str, &str)> = Vec::new();
        for image in &self.media {
            let entry = (image.format.extension(), image.format.content_type());
            if !media_types.contains(&entry) {
                media_types.push(entry);
            }
        }

        let mut part = |name: &str, body: &[u8], options: FileOptions| -> Result<()> {
            zip.start_file(name, options)
                .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
            zip.write_all(body)
                .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", name, e)))
        };

        let count = self.slides.len();
        part(
            "[Content_Types].xml",
            parts::content_types_xml(count, &media_types).as_bytes(),
            xml_options,
        )?;
        part(
            "_rels/.rels",
            parts::relationships_xml(&parts::package_rels()).as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/presentation.xml",
            parts::presentation_xml(count, SLIDE_WIDTH, SLIDE_HEIGHT).as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/_rels/presentation.xml.rels",
            parts::relationships_xml(&parts::presentation_rels(count)).as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/slideMasters/slideMaster1.xml",
            parts::slide_master_xml().as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            parts::relationships_xml(&parts::slide_master_rels()).as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/slideLayouts/slideLayout1.xml",
            parts::slide_layout_xml().as_bytes(),
            xml_options,
        )?;
        part(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            parts::relationships_xml(&parts::slide_layout_rels()).as_bytes(),
            xml_options,
        )?;
        part("ppt/theme/theme1.xml", parts::THEME_XML.as_bytes(), xml_options)?;

        for (index, pictures) in self.slides.iter().enumerate() {
            let (xml, rels) = self.slide_xml(pictures)?;
            part(
                &format!("ppt/slides/slide{}.xml", index + 1),
                xml.as_bytes(),
                xml_options,
            )?;
            part(
                &format!("ppt/slides/_rels/slide{}.xml.rels", index + 1),
                parts::relationships_xml(&rels).as_bytes(),
                xml_options,
            )?;
        }

        for (index, image) in self.media.iter().enumerate() {
            part(
                &format!("ppt/media/{}", self.media_part_name(MediaId(index))),
                &image.bytes,
                media_options,
            )?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish package: {}", e)))?;
        Ok(cursor.into_inner())
    }

    /// Write the package to `path` in one go.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Slide XML plus its relationships. Each distinct media part gets one relationship.
    fn slide_xml(&self, pictures: &[(MediaId, Placement)]) -> Result<(String, Vec<Relationship>)> {
        let mut rels = vec![Relationship::new(
            "rId1",
            parts::REL_SLIDE_LAYOUT,
            "../slideLayouts/slideLayout1.xml",
        )];
        let mut embedded: Vec<(MediaId, String)> = Vec::new();

        let mut xml = parts::slide_open();
        for (n, (id, at)) in pictures.iter().enumerate() {
            let rel_id = match embedded.iter().find(|(m, _)| m == id) {
                Some((_, rel_id)) => rel_id.clone(),
                None => {
                    let rel_id = format!("rId{}", rels.len() + 1);
                    rels.push(Relationship::new(
                        rel_id.clone(),
                        parts::REL_IMAGE,
                        format!("../media/{}", self.media_part_name(*id)),
                    ));
                    embedded.push((*id, rel_id.clone()));
                    rel_id
                }
            };

            let shape_id = n + 2;
            xml.push_str("<p:pic>");
            xml.push_str("<p:nvPicPr>");
            write!(
                xml,
                r#"<p:cNvPr id="{}" name="Picture {}" descr="{}"/>"#,
                shape_id,
                shape_id,
                escape(self.media[id.0].name.as_str())
            )
            .map_err(|e| Error::XmlError(e.to_string()))?;
            xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
            xml.push_str("<p:nvPr/>");
            xml.push_str("</p:nvPicPr>");

            xml.push_str("<p:blipFill>");
            write!(xml, r#"<a:blip r:embed="{}"/>"#, rel_id)
                .map_err(|e| Error::XmlError(e.to_string()))?;
            xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
            xml.push_str("</p:blipFill>");

            xml.push_str("<p:spPr>");
            xml.push_str("<a:xfrm>");
            write!(xml, r#"<a:off x="{}" y="{}"/>"#, at.x, at.y)
                .map_err(|e| Error::XmlError(e.to_string()))?;
            write!(xml, r#"<a:ext cx="{}" cy="{}"/>"#, at.cx, at.cy)
                .map_err(|e| Error::XmlError(e.to_string()))?;
            xml.push_str("</a:xfrm>");
            xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
            xml.push_str("</p:spPr>");
            xml.push_str("</p:pic>");
        }
        parts::slide_close(&mut xml);

        Ok((xml, rels))
    }
}

/// Writes one `.pptx` per sheet: header slide, content slides, footer slide.
#[derive(Debug, Clone)]
pub struct PptxAssembler {
    assets: AssetPaths,
}

impl PptxAssembler {
    /// `assets` should already be absolute paths.
    pub fn new(assets: AssetPaths) -> Self {
        Self { assets }
    }

    /// Decorative pictures for the header and footer slides.
    ///
    /// Assets that are missing are left out silently; ones that exist but
    /// cannot be decoded are left out with a warning.
    fn decorations(&self, deck: &mut DeckWriter) -> Vec<(MediaId, Placement)> {
        let margin = EMU_PER_INCH / 5;
        let logo_height = EMU_PER_INCH;

        let mut pictures = Vec::new();
        let slots: [(&PathBuf, Decoration); 3] = [
            (&self.assets.logo_left, Decoration::LogoLeft),
            (&self.assets.logo_right, Decoration::LogoRight),
            (&self.assets.bottom_strip, Decoration::BottomStrip),
        ];

        for (path, kind) in slots {
            if !path.exists() {
                log::debug!("Decorative asset {} not present", path.display());
                continue;
            }
            let image = match MediaImage::open(path) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("Decorative asset {} unusable: {}", path.display(), e);
                    continue;
                }
            };

            let placement = match kind {
                Decoration::LogoLeft => Placement {
                    x: margin,
                    y: margin,
                    cx: image.width_for_height(logo_height),
                    cy: logo_height,
                },
                Decoration::LogoRight => Placement {
                    x: 8 * EMU_PER_INCH,
                    y: margin,
                    cx: image.width_for_height(logo_height),
                    cy: logo_height,
                },
                Decoration::BottomStrip => {
                    let cy = image.height_for_width(SLIDE_WIDTH);
                    Placement {
                        x: 0,
                        y: SLIDE_HEIGHT - EMU_PER_INCH,
                        cx: SLIDE_WIDTH,
                        cy,
                    }
                }
            };
            pictures.push((deck.add_media(image), placement));
        }

        pictures
    }
}

#[derive(Debug, Clone, Copy)]
enum Decoration {
    LogoLeft,
    LogoRight,
    BottomStrip,
}

impl DeckAssembler for PptxAssembler {
    fn check_artifact(&self, artifact: &Path) -> Result<()> {
        MediaImage::open(artifact).map(|_| ())
    }

    fn assemble(&self, artifacts: &[PathBuf], output: &Path) -> Result<DeckSummary> {
        let mut deck = DeckWriter::new();

        let decorations = self.decorations(&mut deck);
        deck.add_slide(&decorations);

        for artifact in artifacts {
            let image = MediaImage::open(artifact)?;
            let id = deck.add_media(image);
            deck.add_slide(&[(id, Placement::full_canvas())]);
        }

        deck.add_slide(&decorations);
        deck.save(output)?;

        log::info!(
            "Wrote {} ({} slides, {} decorative pictures)",
            output.display(),
            deck.slide_count(),
            decorations.len()
        );

        Ok(DeckSummary {
            path: output.to_path_buf(),
            slide_count: deck.slide_count(),
            content_slides: artifacts.len(),
            header_pictures: decorations.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::DeckInspector;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn assets(dir: &Path) -> AssetPaths {
        AssetPaths {
            logo_left: dir.join("logo_left.png"),
            logo_right: dir.join("logo_right.png"),
            bottom_strip: dir.join("bottom_strip.png"),
        }
    }

    fn artifacts(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("S_page_{}.png", i + 1));
                std::fs::write(&path, png(25, 20)).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_media_image_sniffs_format_and_size() {
        let image = MediaImage::from_bytes(png(40, 10), "wide.png").unwrap();
        assert_eq!(image.format(), MediaFormat::Png);
        assert_eq!(image.dimensions(), (40, 10));
        assert_eq!(image.width_for_height(EMU_PER_INCH), 4 * EMU_PER_INCH);
        assert_eq!(image.height_for_width(SLIDE_WIDTH), SLIDE_WIDTH / 4);
    }

    #[test]
    fn test_media_image_rejects_non_images() {
        let err = MediaImage::from_bytes(b"<html></html>".to_vec(), "page.html").unwrap_err();
        assert!(matches!(err, Error::AssemblyError(_)));
    }

    #[test]
    fn test_deck_without_assets() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Team.pptx");
        let assembler = PptxAssembler::new(assets(dir.path()));

        let summary = assembler
            .assemble(&artifacts(dir.path(), 2), &output)
            .unwrap();
        assert_eq!(summary.slide_count, 4);
        assert_eq!(summary.content_slides, 2);
        assert_eq!(summary.header_pictures, 0);
        assert_eq!(summary.path, output);

        let layout = DeckInspector::new().open(&output).unwrap();
        assert_eq!(layout.slide_count(), 4);
        assert_eq!(layout.picture_counts(), vec![0, 1, 1, 0]);

        let content = &layout.slides[1].pictures[0];
        assert_eq!((content.x, content.y), (0, 0));
        assert_eq!((content.cx, content.cy), (SLIDE_WIDTH, SLIDE_HEIGHT));
    }

    #[test]
    fn test_deck_with_assets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = assets(dir.path());
        std::fs::write(&paths.logo_left, png(20, 10)).unwrap();
        std::fs::write(&paths.logo_right, png(10, 10)).unwrap();
        std::fs::write(&paths.bottom_strip, png(400, 20)).unwrap();

        let output = dir.path().join("Team.pptx");
        let summary = PptxAssembler::new(paths)
            .assemble(&artifacts(dir.path(), 1), &output)
            .unwrap();
        assert_eq!(summary.slide_count, 3);
        assert_eq!(summary.header_pictures, 3);

        let layout = DeckInspector::new().open(&output).unwrap();
        assert_eq!(layout.picture_counts(), vec![3, 1, 3]);

        let header = &layout.slides[0].pictures;
        assert_eq!((header[0].x, header[0].y), (182880, 182880));
        assert_eq!((header[0].cx, header[0].cy), (2 * EMU_PER_INCH, EMU_PER_INCH));
        assert_eq!((header[1].x, header[1].cx), (8 * EMU_PER_INCH, EMU_PER_INCH));
        assert_eq!(header[2].cx, SLIDE_WIDTH);
        assert_eq!(header[2].cy, 457200);
        assert_eq!(header[2].y, SLIDE_HEIGHT - EMU_PER_INCH);
        assert_eq!(layout.slides[2].pictures, layout.slides[0].pictures);
    }

    #[test]
    fn test_partial_and_broken_assets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = assets(dir.path());
        std::fs::write(&paths.logo_right, png(10, 10)).unwrap();
        std::fs::write(&paths.bottom_strip, b"not an image").unwrap();

        let output = dir.path().join("Team.pptx");
        let summary = PptxAssembler::new(paths).assemble(&[], &output).unwrap();
        assert_eq!(summary.slide_count, 2);
        assert_eq!(summary.header_pictures, 1);
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Team.pptx");
        let err = PptxAssembler::new(assets(dir.path()))
            .assemble(&[dir.path().join("gone.png")], &output)
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_shared_media_is_stored_once() {
        let mut deck = DeckWriter::new();
        let logo = deck.add_media(MediaImage::from_bytes(png(4, 4), "logo.png").unwrap());
        deck.add_slide(&[(logo, Placement::full_canvas())]);
        deck.add_slide(&[(logo, Placement::full_canvas())]);

        let bytes = deck.to_bytes().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let media: Vec<&str> = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/media/"))
            .collect();
        assert_eq!(media, vec!["ppt/media/image1.png"]);
    }

    #[test]
    fn test_package_parts_present() {
        let mut deck = DeckWriter::new();
        deck.add_slide(&[]);
        let bytes = deck.to_bytes().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();

        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/_rels/presentation.xml.rels",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/_rels/slide1.xml.rels",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }
}

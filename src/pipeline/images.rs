//! Embedded image extraction and the diagnostic-image width filter.
//!
//! Reports mix small decorative images (clinic logos, signatures, icons) with
//! full-resolution ultrasound/radiograph captures. The captures are
//! consistently wide, so a single width threshold separates them well.
//!
//! Pages are visited in order; on each page the `/XObject` resources are
//! walked in dictionary order, descending into Form XObjects. For every Image
//! XObject the width comes from its `/Width` entry, or, when that is missing
//! or unusable, from decoding the stream bytes. An image whose width cannot
//! be determined is skipped and recorded as an [`ImageSkip`]; it never aborts
//! the walk. Retained images keep their stream bytes exactly as stored.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::error::{ExtractError, ImageSkip};
use crate::output::ImageCandidate;
use crate::pipeline::shard::load_document;

/// Default minimum width (px) for a retained image.
pub const DEFAULT_MIN_IMAGE_WIDTH: u32 = 1300;

/// Images that passed the filter plus the ones that had to be skipped.
#[derive(Debug, Default)]
pub struct ImageScan {
    pub images: Vec<ImageCandidate>,
    pub skipped: Vec<ImageSkip>,
}

/// Parse `bytes` and collect every embedded image at least `min_width` wide.
pub fn extract_images(bytes: &[u8], min_width: u32) -> Result<ImageScan, ExtractError> {
    let doc = load_document(bytes)?;
    Ok(scan_document(&doc, min_width))
}

/// Walk an already-parsed document.
pub fn scan_document(doc: &Document, min_width: u32) -> ImageScan {
    let mut scan = ImageScan::default();

    for (page_num, page_id) in doc.get_pages() {
        let Some(resources) = page_resources(doc, page_id) else {
            continue;
        };
        let mut visited = HashSet::new();
        walk_xobjects(doc, resources, page_num, min_width, &mut visited, &mut scan);
    }

    info!(
        "Found {} images ≥ {}px ({} skipped)",
        scan.images.len(),
        min_width,
        scan.skipped.len()
    );
    scan
}

fn walk_xobjects(
    doc: &Document,
    resources: &Dictionary,
    page: u32,
    min_width: u32,
    visited: &mut HashSet<ObjectId>,
    scan: &mut ImageScan,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
    else {
        return;
    };

    for (name, entry) in xobjects.iter() {
        let name = String::from_utf8_lossy(name).into_owned();
        if let Object::Reference(id) = entry {
            // Forms may reference each other; each object is visited once per page.
            if !visited.insert(*id) {
                continue;
            }
        }
        let Some(stream) = resolve(doc, entry).and_then(|o| o.as_stream().ok()) else {
            continue;
        };

        match name_of(&stream.dict, b"Subtype").as_deref() {
            Some("Image") => {
                if let Some(candidate) = inspect_image(stream, page, &name, min_width, scan) {
                    scan.images.push(candidate);
                }
            }
            Some("Form") => {
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok())
                {
                    walk_xobjects(doc, inner, page, min_width, visited, scan);
                }
            }
            _ => {}
        }
    }
}

/// Width-check one Image XObject. Returns it if it passes the filter.
fn inspect_image(
    stream: &Stream,
    page: u32,
    name: &str,
    min_width: u32,
    scan: &mut ImageScan,
) -> Option<ImageCandidate> {
    let declared_height = dimension(&stream.dict, b"Height");
    let (width, height) = match dimension(&stream.dict, b"Width") {
        Some(w) => (w, declared_height),
        None => match decode_dimensions(&stream.content) {
            Ok((w, h)) => (w, Some(h)),
            Err(detail) => {
                let skip = ImageSkip {
                    page,
                    name: name.to_string(),
                    detail,
                };
                warn!("{}", skip);
                scan.skipped.push(skip);
                return None;
            }
        },
    };

    if width < min_width {
        debug!("Page {}: /{} is {}px wide, below {}px", page, name, width, min_width);
        return None;
    }

    debug!("Page {}: keeping /{} ({}px, {} bytes)", page, name, width, stream.content.len());
    Some(ImageCandidate {
        page,
        name: name.to_string(),
        width,
        height,
        filter: last_filter(&stream.dict),
        bytes: stream.content.clone(),
    })
}

/// Decode encoded image bytes far enough to learn their dimensions.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    Ok((img.width(), img.height()))
}

// ── lopdf helpers ────────────────────────────────────────────────────────────

/// Follow an indirect reference, if any.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// `/Resources` of a page, following `/Parent` inheritance.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(b"Resources") {
            return resolve(doc, obj)?.as_dict().ok();
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let value = dict.get(key).ok()?.as_i64().ok()?;
    u32::try_from(value).ok().filter(|v| *v > 0)
}

fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()?
        .as_name()
        .ok()
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

/// The outermost encoding of the stream: the last entry of `/Filter`.
fn last_filter(dict: &Dictionary) -> Option<String> {
    match dict.get(b"Filter").ok()? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        Object::Array(items) => items
            .last()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use lopdf::dictionary;
    use std::io::Cursor;

    /// How a test image describes its width.
    pub(crate) enum TestImage {
        /// `/Width` present; content is opaque.
        Declared(i64),
        /// No `/Width`; content is a real PNG of this width.
        Png(u32),
        /// No `/Width`; content is garbage.
        Corrupt,
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    /// One page per inner vec; images keyed `Im0`, `Im1`, … in order.
    pub(crate) fn pdf_with_images(pages: Vec<Vec<TestImage>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for (p, images) in pages.into_iter().enumerate() {
            let mut xobjects = Dictionary::new();
            for (i, kind) in images.into_iter().enumerate() {
                let (dict, content) = match kind {
                    TestImage::Declared(w) => (
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => w,
                            "Height" => 10i64,
                            "ColorSpace" => "DeviceRGB",
                            "BitsPerComponent" => 8i64,
                            "Filter" => "DCTDecode",
                        },
                        format!("p{p}i{i}").into_bytes(),
                    ),
                    TestImage::Png(w) => (
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                        },
                        png_bytes(w, 2),
                    ),
                    TestImage::Corrupt => (
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                        },
                        b"not an image".to_vec(),
                    ),
                };
                let id = doc.add_object(Object::Stream(Stream::new(dict, content)));
                xobjects.set(format!("Im{i}"), id);
            }

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => Object::Dictionary(dictionary! {
                    "XObject" => Object::Dictionary(xobjects),
                }),
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }

    #[test]
    fn width_threshold_is_inclusive() {
        let pdf = pdf_with_images(vec![vec![
            TestImage::Declared(1299),
            TestImage::Declared(1300),
            TestImage::Declared(2048),
        ]]);
        let scan = extract_images(&pdf, DEFAULT_MIN_IMAGE_WIDTH).unwrap();
        let widths: Vec<u32> = scan.images.iter().map(|c| c.width).collect();
        assert_eq!(widths, vec![1300, 2048]);
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn bytes_are_returned_unchanged() {
        let pdf = pdf_with_images(vec![vec![TestImage::Declared(1500)]]);
        let scan = extract_images(&pdf, DEFAULT_MIN_IMAGE_WIDTH).unwrap();
        assert_eq!(scan.images[0].bytes, b"p0i0".to_vec());
        assert_eq!(scan.images[0].filter.as_deref(), Some("DCTDecode"));
        assert_eq!(scan.images[0].mime_type(), "image/jpeg");
    }

    #[test]
    fn width_falls_back_to_decoding() {
        let pdf = pdf_with_images(vec![vec![TestImage::Png(1299), TestImage::Png(1300)]]);
        let scan = extract_images(&pdf, DEFAULT_MIN_IMAGE_WIDTH).unwrap();
        assert_eq!(scan.images.len(), 1);
        assert_eq!(scan.images[0].width, 1300);
        assert_eq!(scan.images[0].height, Some(2));
        assert_eq!(scan.images[0].bytes, png_bytes(1300, 2));
    }

    #[test]
    fn corrupt_image_is_skipped_not_fatal() {
        let pdf = pdf_with_images(vec![
            vec![TestImage::Corrupt, TestImage::Declared(1400)],
            vec![TestImage::Png(1600)],
        ]);
        let scan = extract_images(&pdf, DEFAULT_MIN_IMAGE_WIDTH).unwrap();
        assert_eq!(scan.images.len(), 2);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].page, 1);
        assert_eq!(scan.skipped[0].name, "Im0");
    }

    #[test]
    fn output_follows_page_order() {
        let pdf = pdf_with_images(vec![
            vec![TestImage::Declared(1301)],
            vec![TestImage::Declared(100)],
            vec![TestImage::Declared(1302), TestImage::Declared(1303)],
        ]);
        let scan = extract_images(&pdf, DEFAULT_MIN_IMAGE_WIDTH).unwrap();
        let seen: Vec<(u32, u32)> = scan.images.iter().map(|c| (c.page, c.width)).collect();
        assert_eq!(seen, vec![(1, 1301), (3, 1302), (3, 1303)]);
    }

    #[test]
    fn custom_threshold() {
        let pdf = pdf_with_images(vec![vec![TestImage::Declared(400)]]);
        assert_eq!(extract_images(&pdf, 300).unwrap().images.len(), 1);
        assert!(extract_images(&pdf, 500).unwrap().images.is_empty());
    }

    #[test]
    fn images_inside_form_xobjects_are_found() {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let image_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1920i64,
                "Height" => 1080i64,
            },
            b"scan".to_vec(),
        )));
        let form_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Resources" => Object::Dictionary(dictionary! {
                    "XObject" => Object::Dictionary(dictionary! { "Im9" => image_id }),
                }),
            },
            b"/Im9 Do".to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                // Inherited by the page.
                "Resources" => Object::Dictionary(dictionary! {
                    "XObject" => Object::Dictionary(dictionary! { "Fm0" => form_id }),
                }),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let scan = scan_document(&doc, DEFAULT_MIN_IMAGE_WIDTH);
        assert_eq!(scan.images.len(), 1);
        assert_eq!(scan.images[0].name, "Im9");
        assert_eq!(scan.images[0].height, Some(1080));
    }

    #[test]
    fn malformed_pdf_is_fatal() {
        assert!(matches!(
            extract_images(b"GIF89a", DEFAULT_MIN_IMAGE_WIDTH),
            Err(ExtractError::MalformedDocument { .. })
        ));
    }
}

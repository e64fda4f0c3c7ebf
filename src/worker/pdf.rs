// Built-in document processor
//
// PDF pages are read and copied with lopdf; JPEG and PNG images are decoded
// with the image crate and embedded as one page each. There is no PDF
// rasterizer in the stack, so a PDF page preview is a single-page PDF.

use crate::intake::{FileBlob, MimeType};
use crate::models::{Rotation, Settings};
use crate::worker::processor::{AssemblyJob, DocumentProcessor, ProcessingError, Thumbnail};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITED_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page has no MediaBox anywhere in its tree
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Processor backed by lopdf and image
#[derive(Clone, Debug)]
pub struct PdfProcessor {
    thumbnail_scale: f32,
    thumbnail_quality: u8,
}

impl PdfProcessor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            thumbnail_scale: settings.effective_thumbnail_scale(),
            thumbnail_quality: settings.effective_thumbnail_quality(),
        }
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl DocumentProcessor for PdfProcessor {
    fn page_count(&self, file: &FileBlob) -> Result<usize, ProcessingError> {
        match file.mime {
            MimeType::Pdf => Ok(Document::load_mem(&file.bytes[..])?.get_pages().len()),
            MimeType::Jpeg | MimeType::Png => {
                ImageReader::new(Cursor::new(&file.bytes[..]))
                    .with_guessed_format()
                    .map_err(image::ImageError::IoError)?
                    .into_dimensions()?;
                Ok(1)
            }
        }
    }

    fn render_thumbnail(
        &self,
        file: &FileBlob,
        page_index: usize,
    ) -> Result<Thumbnail, ProcessingError> {
        match file.mime {
            MimeType::Pdf => single_page_pdf(&file.bytes, page_index),
            MimeType::Jpeg | MimeType::Png => {
                if page_index != 0 {
                    return Err(ProcessingError::PageOutOfRange {
                        page_index,
                        page_count: 1,
                    });
                }
                scaled_jpeg(&file.bytes, self.thumbnail_scale, self.thumbnail_quality)
            }
        }
    }

    fn assemble(&self, job: &AssemblyJob) -> Result<Vec<u8>, ProcessingError> {
        assemble_document(job)
    }
}

/// Cut one page out of a PDF, keeping everything it references
fn single_page_pdf(bytes: &[u8], page_index: usize) -> Result<Thumbnail, ProcessingError> {
    let mut doc = Document::load_mem(bytes)?;
    let page_count = doc.get_pages().len();
    if page_index >= page_count {
        return Err(ProcessingError::PageOutOfRange {
            page_index,
            page_count,
        });
    }

    // lopdf page numbers are 1-based
    let keep = page_index as u32 + 1;
    let others: Vec<u32> = (1..=page_count as u32).filter(|&n| n != keep).collect();
    doc.delete_pages(&others);
    doc.prune_objects();
    doc.renumber_objects();

    Ok(Thumbnail {
        mime: MimeType::Pdf,
        bytes: save_document(&mut doc)?,
    })
}

/// Downscale an image and re-encode it as JPEG
fn scaled_jpeg(bytes: &[u8], scale: f32, quality: u8) -> Result<Thumbnail, ProcessingError> {
    let img = image::load_from_memory(bytes)?;
    let width = ((img.width() as f32 * scale).round() as u32).max(1);
    let height = ((img.height() as f32 * scale).round() as u32).max(1);
    let thumb = img.thumbnail(width, height);

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(thumb.to_rgb8()).write_with_encoder(encoder)?;

    Ok(Thumbnail {
        mime: MimeType::Jpeg,
        bytes: out,
    })
}

#[derive(Clone, Copy, Debug)]
struct EmbeddedImage {
    xobject: ObjectId,
    width: u32,
    height: u32,
}

/// Build a new PDF from the pages of a job, in job order
fn assemble_document(job: &AssemblyJob) -> Result<Vec<u8>, ProcessingError> {
    if job.is_empty() {
        return Err(ProcessingError::NothingToAssemble);
    }

    let mut output = Document::with_version("1.5");
    let pages_id = output.new_object_id();

    // Each input is imported at most once, however many of its pages are used
    let mut pdf_pages: HashMap<usize, Vec<Dictionary>> = HashMap::new();
    let mut images: HashMap<usize, EmbeddedImage> = HashMap::new();
    let mut kids = Vec::with_capacity(job.pages.len());

    for page in &job.pages {
        let input = job.inputs.get(page.input).ok_or_else(|| {
            ProcessingError::Malformed(format!("page refers to missing input {}", page.input))
        })?;

        let mut dict = match input.mime {
            MimeType::Pdf => {
                let templates = match pdf_pages.entry(page.input) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(import_pdf(&mut output, &input.bytes)?),
                };
                let template = templates.get(page.page_index).ok_or(
                    ProcessingError::PageOutOfRange {
                        page_index: page.page_index,
                        page_count: templates.len(),
                    },
                )?;

                let mut dict = template.clone();
                let existing = page_rotation(&output, &dict);
                dict.set(
                    "Rotate",
                    Object::Integer(i64::from(existing.add(page.rotation).degrees())),
                );
                dict
            }
            MimeType::Jpeg | MimeType::Png => {
                if page.page_index != 0 {
                    return Err(ProcessingError::PageOutOfRange {
                        page_index: page.page_index,
                        page_count: 1,
                    });
                }
                let image = match images.entry(page.input) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => *entry.insert(embed_image(&mut output, &input.bytes)?),
                };
                image_page(&mut output, image, page.rotation)?
            }
        };

        dict.set("Parent", Object::Reference(pages_id));
        kids.push(Object::Reference(output.add_object(dict)));
    }

    let count = kids.len() as i64;
    let pages = Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(count)),
    ]);
    output.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = output.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    output.trailer.set("Root", Object::Reference(catalog_id));

    save_document(&mut output)
}

/// Move a PDF's objects into `output` and return one self-contained page
/// dictionary per source page, in page order.
///
/// The returned dictionaries are templates: they carry every inherited
/// attribute but no Parent and are not yet part of `output`.
fn import_pdf(output: &mut Document, bytes: &[u8]) -> Result<Vec<Dictionary>, ProcessingError> {
    let mut doc = Document::load_mem(bytes)?;
    doc.renumber_objects_with(output.max_id + 1);

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let mut templates = Vec::with_capacity(page_ids.len());
    for &page_id in &page_ids {
        let mut dict = doc.get_dictionary(page_id)?.clone();
        for key in INHERITED_KEYS {
            if dict.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(&doc, page_id, key) {
                dict.set(key, value);
            }
        }
        if !dict.has(b"MediaBox") {
            let media_box = DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect();
            dict.set("MediaBox", Object::Array(media_box));
        }
        dict.remove(b"Parent");
        templates.push(dict);
    }

    let max_id = doc.max_id;
    let page_set: HashSet<ObjectId> = page_ids.into_iter().collect();
    for (id, object) in doc.objects {
        if page_set.contains(&id) {
            continue;
        }
        match object.type_name().unwrap_or("") {
            "Catalog" | "Pages" | "Outlines" | "Outline" => {}
            _ => {
                output.objects.insert(id, object);
            }
        }
    }
    output.max_id = output.max_id.max(max_id);

    Ok(templates)
}

/// Look `key` up on a page and then on each ancestor
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's own /Rotate, normalized; anything unreadable counts as 0
fn page_rotation(doc: &Document, page: &Dictionary) -> Rotation {
    let value = match page.get(b"Rotate") {
        Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
        Ok(value) => Some(value),
        Err(_) => None,
    };
    value
        .and_then(|v| v.as_i64().ok())
        .and_then(Rotation::from_degrees)
        .unwrap_or_default()
}

fn embed_image(output: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, ProcessingError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();

    let dict = Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(i64::from(width))),
        ("Height", Object::Integer(i64::from(height))),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ]);
    let xobject = output.add_object(Stream::new(dict, rgb.into_raw()));

    Ok(EmbeddedImage {
        xobject,
        width,
        height,
    })
}

/// A page exactly the size of the image, drawing it edge to edge
fn image_page(
    output: &mut Document,
    image: EmbeddedImage,
    rotation: Rotation,
) -> Result<Dictionary, ProcessingError> {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = output.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let xobjects = Dictionary::from_iter([("Im0", Object::Reference(image.xobject))]);
    let resources = Dictionary::from_iter([("XObject", Object::Dictionary(xobjects))]);

    Ok(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
        ("Rotate", Object::Integer(i64::from(rotation.degrees()))),
    ]))
}

fn save_document(doc: &mut Document) -> Result<Vec<u8>, ProcessingError> {
    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ProcessingError::Malformed(format!("Failed to write PDF: {}", e)))?;
    Ok(bytes)
}

//! Format classification over a static registry.
//!
//! `classify` is the single validation gate for incoming files: a `None`
//! here means the file is neither a recognized format nor a generic image
//! and must be rejected by the caller. Everything downstream (normalizer,
//! orchestrator) trusts the returned descriptor.

/// Broad format family, mirroring how the gallery treats the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCategory {
    Web,
    Raw,
    Print,
    Animation,
    Vector,
}

/// Immutable registry entry for one known image format.
#[derive(Debug)]
pub struct FormatDescriptor {
    pub extension: &'static str,
    pub mime: &'static str,
    pub category: FormatCategory,
    /// Natively acceptable for web display without conversion.
    pub web_safe: bool,
    /// Must be converted before storage (target in `convert_to`).
    pub requires_conversion: bool,
    pub convert_to: Option<&'static str>,
}

impl FormatDescriptor {
    pub fn is_heic(&self) -> bool {
        matches!(self.extension, "heic" | "heif")
    }
}

const fn web(extension: &'static str, mime: &'static str) -> FormatDescriptor {
    FormatDescriptor {
        extension,
        mime,
        category: FormatCategory::Web,
        web_safe: true,
        requires_conversion: false,
        convert_to: None,
    }
}

const fn converted(
    extension: &'static str,
    mime: &'static str,
    category: FormatCategory,
) -> FormatDescriptor {
    FormatDescriptor {
        extension,
        mime,
        category,
        web_safe: false,
        requires_conversion: true,
        convert_to: Some("image/jpeg"),
    }
}

static REGISTRY: &[FormatDescriptor] = &[
    web("jpg", "image/jpeg"),
    web("jpeg", "image/jpeg"),
    web("png", "image/png"),
    web("webp", "image/webp"),
    FormatDescriptor {
        extension: "gif",
        mime: "image/gif",
        category: FormatCategory::Animation,
        web_safe: true,
        requires_conversion: false,
        convert_to: None,
    },
    // Mobile capture formats
    converted("heic", "image/heic", FormatCategory::Raw),
    converted("heif", "image/heif", FormatCategory::Raw),
    // Camera raw formats; conversion is attempted and degrades to
    // passthrough when the runtime cannot decode them.
    converted("cr2", "image/x-canon-cr2", FormatCategory::Raw),
    converted("nef", "image/x-nikon-nef", FormatCategory::Raw),
    converted("arw", "image/x-sony-arw", FormatCategory::Raw),
    converted("dng", "image/x-adobe-dng", FormatCategory::Raw),
    converted("orf", "image/x-olympus-orf", FormatCategory::Raw),
    converted("rw2", "image/x-panasonic-rw2", FormatCategory::Raw),
    converted("raf", "image/x-fuji-raf", FormatCategory::Raw),
    // Print-oriented formats the runtime can decode directly
    converted("tiff", "image/tiff", FormatCategory::Print),
    converted("tif", "image/tiff", FormatCategory::Print),
    converted("bmp", "image/bmp", FormatCategory::Print),
    FormatDescriptor {
        extension: "svg",
        mime: "image/svg+xml",
        category: FormatCategory::Vector,
        web_safe: false,
        requires_conversion: true,
        convert_to: Some("image/png"),
    },
];

/// Catch-all for declared `image/*` types the registry does not know.
/// Accepted as-is; normalization is still attempted.
static GENERIC_IMAGE: FormatDescriptor = FormatDescriptor {
    extension: "",
    mime: "image/*",
    category: FormatCategory::Web,
    web_safe: true,
    requires_conversion: false,
    convert_to: None,
};

/// Map a file to its format descriptor.
///
/// Lookup order: extension, declared MIME type, then a generic-image
/// fallback for any other `image/*` declaration. Returns `None` for
/// everything else; callers must reject the file.
pub fn classify(name: &str, declared_type: &str) -> Option<&'static FormatDescriptor> {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());

    if let Some(ext) = extension {
        if let Some(desc) = REGISTRY.iter().find(|d| d.extension == ext) {
            return Some(desc);
        }
    }

    let declared = declared_type.trim().to_lowercase();
    if let Some(desc) = REGISTRY.iter().find(|d| d.mime == declared) {
        return Some(desc);
    }

    if declared.starts_with("image/") {
        return Some(&GENERIC_IMAGE);
    }

    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Png,
    Jpeg,
    Gif,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Jpeg => "jpg",
            Format::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    Header,
    Body,
    Trailer,
}

impl InjectionPoint {
    pub const ALL: [InjectionPoint; 3] = [
        InjectionPoint::Header,
        InjectionPoint::Body,
        InjectionPoint::Trailer,
    ];

    /// Tag used in output artifact names.
    pub fn tag(self) -> &'static str {
        match self {
            InjectionPoint::Header => "header",
            InjectionPoint::Body => "body",
            InjectionPoint::Trailer => "trailer",
        }
    }
}

/// An input image: its raw bytes plus the format detected from them.
/// Read-only once constructed; every output is a new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

pub const EXTENSION_LIST: &[&str] = &["png", "jpg", "jpeg", "gif"];

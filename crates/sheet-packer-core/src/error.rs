use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetPackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{}: file does not exist or is size 0", path.display())]
    MissingSource { path: PathBuf },
    #[error("{}: image size could not be read ({reason})", path.display())]
    UnreadableHeader { path: PathBuf, reason: String },
    #[error("{}: `{extension}` is not an accepted image type", path.display())]
    RejectedType { path: PathBuf, extension: String },
    #[error("{}: image format cannot be written to a sheet", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("sheet `{group}` already repeats along {existing}, cannot also repeat along {requested}")]
    ConflictingRepeat {
        group: String,
        existing: String,
        requested: String,
    },
    #[error("`{key}` ({width}x{height}) does not fit the {}x{} bounding box of sheet `{group}`", bounds.0, bounds.1)]
    OutOfSpace {
        group: String,
        key: String,
        width: u32,
        height: u32,
        bounds: (u32, u32),
    },
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sheet `{group}`: cannot write {}: {source}", path.display())]
    SheetWrite {
        group: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: cannot decode source pixels: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("sheet `{group}`: encoding failed: {source}")]
    Encode {
        group: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown {kind} `{name}`")]
    UnknownStrategy { kind: &'static str, name: String },
    #[error("deadline exceeded with {remaining} sheet(s) left unprocessed")]
    DeadlineExceeded { remaining: usize },
}

impl SheetPackerError {
    /// Validation and packing-capacity errors only exclude the offending image;
    /// everything else aborts the enclosing group or run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingSource { .. }
                | Self::UnreadableHeader { .. }
                | Self::RejectedType { .. }
                | Self::UnsupportedFormat { .. }
                | Self::InvalidInput(_)
                | Self::ConflictingRepeat { .. }
                | Self::OutOfSpace { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SheetPackerError>;

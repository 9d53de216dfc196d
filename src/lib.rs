pub mod audio;
pub mod capture;
pub mod driver;
pub mod error;
pub mod fm9;
pub mod gzip;
pub mod hmp;
pub mod router;
pub mod vgm;

pub use capture::{ActiveCapture, CaptureChip, ChipKind};
pub use error::Error;

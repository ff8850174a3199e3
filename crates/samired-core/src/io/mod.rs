pub mod fits;
pub mod fits_writer;
pub mod header;

pub use fits::{read_fits, read_image, FitsReader, Hdu};
pub use fits_writer::{write_image, FitsWriter};
pub use header::{Card, Header, Value};

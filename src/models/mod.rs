pub mod analysis;
pub mod consultation;
pub mod enums;
pub mod image;
pub mod profile;

pub use analysis::*;
pub use consultation::*;
pub use enums::*;
pub use image::*;
pub use profile::*;

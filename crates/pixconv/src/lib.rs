#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use pixconv_image as image;

#[doc(inline)]
pub use pixconv_imgproc as imgproc;

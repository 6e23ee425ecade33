//! Binary masks as 0/255 `GrayImage`s and their morphological cleanup
//!
//! Closing follows imageproc's distance-transform semantics: pixels beyond
//! the border are never background, so shapes touching the image edge keep
//! their extent.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Value of a set pixel
pub const SET: u8 = 255;

/// Binary image from a per-pixel predicate
pub fn binary_from_fn<F>(width: u32, height: u32, mut f: F) -> GrayImage
where
    F: FnMut(u32, u32) -> bool,
{
    GrayImage::from_fn(width, height, |x, y| Luma([if f(x, y) { SET } else { 0 }]))
}

/// Close with a `kernel` x `kernel` square; kernels below 3 are a no-op
pub fn close(image: &GrayImage, kernel: u32) -> GrayImage {
    match radius(kernel) {
        Some(k) if !is_empty(image) => morphology::close(image, Norm::LInf, k),
        _ => image.clone(),
    }
}

/// Dilate with a `kernel` x `kernel` square; kernels below 3 are a no-op
pub fn dilate(image: &GrayImage, kernel: u32) -> GrayImage {
    match radius(kernel) {
        Some(k) if !is_empty(image) => morphology::dilate(image, Norm::LInf, k),
        _ => image.clone(),
    }
}

fn radius(kernel: u32) -> Option<u8> {
    let r = (kernel / 2).min(u8::MAX as u32) as u8;
    (r > 0).then_some(r)
}

fn is_empty(image: &GrayImage) -> bool {
    image.width() == 0 || image.height() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p[0] == SET).count()
    }

    #[test]
    fn test_close_fills_single_pixel_hole() {
        let mut grid = binary_from_fn(9, 9, |x, y| (2..7).contains(&x) && (2..7).contains(&y));
        grid.put_pixel(4, 4, Luma([0]));
        let closed = close(&grid, 3);
        assert_eq!(closed.get_pixel(4, 4)[0], SET);
        assert_eq!(count(&closed), 25);
    }

    #[test]
    fn test_close_keeps_edge_touching_shapes() {
        let grid = binary_from_fn(6, 6, |x, _| x < 2);
        let closed = close(&grid, 3);
        assert_eq!(count(&closed), 12);
        assert_eq!(closed.get_pixel(0, 0)[0], SET);
    }

    #[test]
    fn test_small_kernel_is_identity() {
        let grid = binary_from_fn(5, 5, |x, y| x == y);
        assert_eq!(close(&grid, 1), grid);
        assert_eq!(dilate(&grid, 0), grid);
    }

    #[test]
    fn test_dilate_grows_point_to_square() {
        let grid = binary_from_fn(7, 7, |x, y| (x, y) == (3, 3));
        let grown = dilate(&grid, 3);
        assert_eq!(count(&grown), 9);
        assert_eq!(grown.get_pixel(2, 4)[0], SET);
        assert_eq!(grown.get_pixel(1, 3)[0], 0);
    }
}

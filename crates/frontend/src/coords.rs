use chronicle_shared::coords::{Rect, Size, ViewportLayout};
use wasm_bindgen::JsCast;

/// Bounding client rect of the element with the given id.
pub fn element_rect(id: &str) -> Option<Rect> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(id)?;
    let rect = element.get_bounding_client_rect();
    Some(Rect::new(rect.left(), rect.top(), rect.width(), rect.height()))
}

/// Natural pixel size of a loaded `<img>`.
pub fn image_natural_size(id: &str) -> Option<Size> {
    let document = web_sys::window()?.document()?;
    let image = document
        .get_element_by_id(id)?
        .dyn_into::<web_sys::HtmlImageElement>()
        .ok()?;
    natural_size(image.natural_width(), image.natural_height())
}

/// An image that has not decoded yet reports 0x0.
pub fn natural_size(width: u32, height: u32) -> Option<Size> {
    if width == 0 || height == 0 {
        return None;
    }
    Some(Size::new(width as f64, height as f64))
}

/// Measure the container and image and lay the image out at the
/// container's width.
pub fn measure_layout(container_id: &str, image_id: &str) -> Option<ViewportLayout> {
    let viewport = element_rect(container_id)?;
    let natural = image_natural_size(image_id)?;
    ViewportLayout::fit_width(viewport, natural)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undecoded_image_has_no_size() {
        assert!(natural_size(0, 0).is_none());
        assert!(natural_size(4000, 0).is_none());
    }

    #[test]
    fn test_natural_size_converts() {
        assert_eq!(natural_size(4000, 2000), Some(Size::new(4000.0, 2000.0)));
    }
}

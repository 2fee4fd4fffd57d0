//! Which asset the render collaborator draws at every anchor.
//!
//! The classifier's final label picks a [`RenderVariant`]; the renderer
//! reloads its model only when the variant actually changes.

use anchorsight_types::ModelLabel;

/// Model, texture and asset scale for one classifier label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderVariant {
    pub label: ModelLabel,
    /// OBJ asset path.
    pub model_path: &'static str,
    pub texture_path: &'static str,
    /// Uniform scale applied when drawing.  Never used for visibility.
    pub scale: f32,
}

impl RenderVariant {
    pub fn for_label(label: ModelLabel) -> Self {
        let (model_path, texture_path, scale) = match label {
            ModelLabel::Tv => ("models/1337 iMac.obj", "models/1337 iMac.png", 0.007),
            ModelLabel::Keyboard => ("models/Keyboard.obj", "models/Computer Texture.png", 0.003),
            ModelLabel::CellPhone => ("models/mobile-phone.obj", "models/phone.png", 0.007),
            ModelLabel::Cup => (
                "models/CHAHIN_COFFEE_CUP.obj",
                "models/CHAHIN_COFFEE_CUP_TEXTURE.jpg",
                0.1,
            ),
            ModelLabel::Person => ("models/Alien.obj", "models/Alien_BaseColor.png", 0.02),
            ModelLabel::Pens => ("models/Pencil_01.obj", "models/phone.png", 0.03),
            ModelLabel::Shoes => ("models/zapatillas.obj", "models/zapatillas_uv.jpg", 0.1),
            ModelLabel::Default => ("models/andy.obj", "models/Andy_Diffuse.png", 1.0),
        };
        Self {
            label,
            model_path,
            texture_path,
            scale,
        }
    }
}

impl Default for RenderVariant {
    fn default() -> Self {
        Self::for_label(ModelLabel::Default)
    }
}

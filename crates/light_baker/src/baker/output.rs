//! Output files of a bake

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::config::IncrementalBakingSettings;
use crate::foundation::logging::debug;
use crate::foundation::math::{utils, Vec3};

use super::{BakeError, BakeResult};

/// Lightmaps are stored at half brightness so that bright texels do not clip
pub const LIGHTMAP_OUTPUT_SCALE: f32 = 0.5;

/// Directory bake results are written to, created if needed.
///
/// Falls back to the scene file path with its extension removed.
pub fn resolve_output_directory(
    settings: &IncrementalBakingSettings,
    scene_file_name: Option<&str>,
) -> BakeResult<PathBuf> {
    let directory = match (&settings.output_directory, scene_file_name) {
        (Some(directory), _) if !directory.is_empty() => PathBuf::from(directory),
        (_, None) => {
            return Err(BakeError::OutputDirectory("scene file name is undefined".to_string()));
        }
        (_, Some(scene_file_name)) => {
            let path = Path::new(scene_file_name);
            if path.extension().is_none() {
                return Err(BakeError::OutputDirectory(format!(
                    "scene file name '{scene_file_name}' has no extension"
                )));
            }
            path.with_extension("")
        }
    };

    fs::create_dir_all(&directory)
        .map_err(|error| BakeError::OutputDirectory(format!("cannot create '{}': {error}", directory.display())))?;
    debug!("Bake output directory: {}", directory.display());
    Ok(directory)
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Gamma-encoded, half brightness texel
pub fn encode_lightmap_texel(light: &Vec3) -> [u8; 3] {
    let color = utils::linear_to_gamma(&utils::max_zero(light)) * LIGHTMAP_OUTPUT_SCALE;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z)]
}

/// Write linear lightmap texels as an RGB PNG
pub fn save_lightmap_png(path: &Path, lightmap_size: u32, lighting: &[Vec3]) -> BakeResult<()> {
    let image = RgbImage::from_fn(lightmap_size, lightmap_size, |x, y| {
        let index = (y * lightmap_size + x) as usize;
        Rgb(lighting.get(index).map_or([0, 0, 0], encode_lightmap_texel))
    });
    image.save(path)?;
    Ok(())
}

/// Write a 1x1 black image unless the file already exists
pub fn write_placeholder_lightmap(path: &Path) -> BakeResult<()> {
    if path.exists() {
        return Ok(());
    }
    RgbImage::from_pixel(1, 1, Rgb([0, 0, 0])).save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_directory(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("light_baker_output_{name}_{}", std::process::id()))
    }

    #[test]
    fn test_output_directory_from_scene_name() {
        let base = temp_directory("scene");
        let scene = base.join("level.scene");
        let settings = IncrementalBakingSettings::default();

        let directory = resolve_output_directory(&settings, scene.to_str()).unwrap();
        assert_eq!(directory, base.join("level"));
        assert!(directory.is_dir());

        let explicit = IncrementalBakingSettings {
            output_directory: Some(base.join("explicit").to_string_lossy().into_owned()),
            ..IncrementalBakingSettings::default()
        };
        assert_eq!(resolve_output_directory(&explicit, None).unwrap(), base.join("explicit"));

        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn test_output_directory_errors() {
        let settings = IncrementalBakingSettings::default();
        assert!(matches!(resolve_output_directory(&settings, None), Err(BakeError::OutputDirectory(_))));
        assert!(matches!(
            resolve_output_directory(&settings, Some("no_extension")),
            Err(BakeError::OutputDirectory(_))
        ));
    }

    #[test]
    fn test_texel_encoding() {
        assert_eq!(encode_lightmap_texel(&Vec3::zeros()), [0, 0, 0]);
        assert_eq!(encode_lightmap_texel(&Vec3::new(0.0, -1.0, 8.0)), [0, 0, 255]);
        let [gray, _, _] = encode_lightmap_texel(&Vec3::new(1.0, 1.0, 1.0));
        assert!((127..=128).contains(&gray));
    }

    #[test]
    fn test_png_and_placeholder() {
        let directory = temp_directory("png");
        fs::create_dir_all(&directory).unwrap();

        let placeholder = directory.join("placeholder.png");
        write_placeholder_lightmap(&placeholder).unwrap();
        assert_eq!(image::open(&placeholder).unwrap().width(), 1);

        let lightmap = directory.join("lightmap.png");
        save_lightmap_png(&lightmap, 2, &[Vec3::new(8.0, 0.0, 0.0); 4]).unwrap();
        let image = image::open(&lightmap).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1), &Rgb([255, 0, 0]));

        // Existing files are kept
        write_placeholder_lightmap(&lightmap).unwrap();
        assert_eq!(image::open(&lightmap).unwrap().width(), 2);

        let _ = fs::remove_dir_all(&directory);
    }
}

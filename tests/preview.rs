use terrain_streamer::preview::render_preview;
use terrain_streamer::prelude::*;

#[test]
fn falloff_preview_is_dark_in_the_middle() {
    let settings = TerrainSettings::default();
    let image = render_preview(PreviewMode::Falloff, &settings);
    let n = settings.mesh.verts_per_line() as u32;
    assert_eq!(image.dimensions(), (n, n));
    assert_eq!(image.get_pixel(0, 0).0[0], 255);
    assert!(image.get_pixel(n / 2, n / 2).0[0] < 5);
}

#[test]
fn noise_preview_spans_full_range() {
    let image = render_preview(PreviewMode::NoiseMap, &TerrainSettings::default());
    let min = image.pixels().map(|p| p.0[0]).min().unwrap();
    let max = image.pixels().map(|p| p.0[0]).max().unwrap();
    assert_eq!(min, 0);
    assert_eq!(max, 255);
}

#[test]
fn mode_parsing() {
    assert_eq!("noise".parse::<PreviewMode>().unwrap(), PreviewMode::NoiseMap);
    assert_eq!("falloff".parse::<PreviewMode>().unwrap(), PreviewMode::Falloff);
    assert!(matches!("mesh".parse::<PreviewMode>(), Err(PreviewError::UnknownMode(_))));
}

#[test]
fn writes_png_to_disk() {
    let dir = std::env::temp_dir().join(format!("terrain_preview_{}", std::process::id()));
    let path = dir.join("falloff.png");
    write_preview(PreviewMode::Falloff, &TerrainSettings::default(), &path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
    let _ = std::fs::remove_dir_all(dir);
}

// Overlay mapping and texture-coordinate binding tests: projection
// deduplication, the region-tile limitation, and the per-frame attach loop.

mod common;

use std::sync::Arc;

use common::*;
use tilestream::geodetic::Projection;
use tilestream::{
    AttachmentState, BoundingSphere, BoundingVolume, RasterTileState, TileLoadState,
};

fn loaded_tileset_with_overlays(
    projections: &[Projection],
) -> (Arc<ManualTaskProcessor>, Arc<MockTileset>) {
    let processor = Arc::new(ManualTaskProcessor::default());
    let tileset = MockTileset::new(processor.clone(), None, model_factory());
    for projection in projections {
        tileset.add_overlay(SingleTileProvider::new(*projection));
    }
    (processor, tileset)
}

#[test]
fn shared_projections_share_texture_coordinates() {
    // Overlay order: geographic, web mercator, geographic again.
    let (processor, tileset) = loaded_tileset_with_overlays(&[
        Projection::Geographic,
        Projection::WebMercator,
        Projection::Geographic,
    ]);
    let tile = region_tile(&tileset);

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();
    assert_eq!(tile.with_raster_tiles(|m| m.len()), 3);

    request.deliver(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00");
    processor.drain();
    assert_eq!(tile.state(), TileLoadState::ContentLoaded);

    // Channels are dense from 0 in order of first occurrence; the repeat
    // projection reuses channel 0.
    let ids = tile.with_raster_tiles(|mappings| {
        mappings
            .iter()
            .map(|m| m.texture_coordinate_id())
            .collect::<Vec<_>>()
    });
    assert_eq!(ids, vec![0, 1, 0]);

    // Exactly two attribute sets were generated, not three.
    let set_count = tile.with_content(|content| {
        content
            .unwrap()
            .model
            .as_ref()
            .unwrap()
            .overlay_texture_coordinate_set_count()
    });
    assert_eq!(set_count, 2);
}

#[test]
fn generated_coordinates_cover_the_unit_square() {
    let (processor, tileset) = loaded_tileset_with_overlays(&[Projection::WebMercator]);
    let tile = region_tile(&tileset);

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();
    request.deliver(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00");
    processor.drain();

    tile.with_content(|content| {
        let model = content.unwrap().model.as_ref().unwrap();
        let set = &model.meshes[0].overlay_texture_coordinates[0];
        assert_eq!(set.id, 0);
        assert_eq!(set.uv.len(), 4);
        for uv in &set.uv {
            assert!((0.0..=1.0).contains(&uv[0]));
            assert!((0.0..=1.0).contains(&uv[1]));
        }
        // The mesh spans the tile rectangle, so corners hit the extremes.
        assert!(set.uv.iter().any(|uv| uv[0] < 1e-4));
        assert!(set.uv.iter().any(|uv| uv[0] > 1.0 - 1e-4));
    });
}

#[test]
fn non_region_tiles_skip_overlay_mapping() {
    let (_processor, tileset) = loaded_tileset_with_overlays(&[Projection::Geographic]);
    let tile = region_tile(&tileset);
    tile.set_bounding_volume(BoundingVolume::Sphere(BoundingSphere {
        sphere: [0.0, 0.0, 0.0, 100.0],
    }));

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();

    // Overlay mapping is only supported for region-based tiles.
    assert_eq!(tile.with_raster_tiles(|m| m.len()), 0);
}

#[test]
fn update_attaches_unattached_mappings() {
    let (processor, tileset) = loaded_tileset_with_overlays(&[Projection::Geographic]);
    let tile = region_tile(&tileset);

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();
    request.deliver(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00");
    processor.drain();

    tile.with_raster_tiles(|mappings| {
        assert_eq!(mappings[0].attachment_state(), AttachmentState::Unattached);
    });

    tile.update(0, 1);
    tile.with_raster_tiles(|mappings| {
        assert_eq!(mappings[0].attachment_state(), AttachmentState::Attached);
        // The raster tile finished its main-thread half.
        assert_eq!(mappings[0].raster_tile().state(), RasterTileState::Done);
    });

    // Attaching is idempotent across frames.
    tile.update(1, 2);
    tile.with_raster_tiles(|mappings| {
        assert_eq!(mappings[0].attachment_state(), AttachmentState::Attached);
    });
}

#[test]
fn loading_raster_tiles_hold_back_renderability() {
    let processor = Arc::new(ManualTaskProcessor::default());
    let tileset = MockTileset::new(processor.clone(), None, model_factory());
    tileset.add_overlay(SingleTileProvider::with_loading(Projection::Geographic, true));
    let tile = region_tile(&tileset);

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();
    request.deliver(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00");
    processor.drain();
    assert_eq!(tile.state(), TileLoadState::ContentLoaded);

    // Content is in, but the overlay imagery is still loading.
    assert!(!tile.is_renderable());

    tile.with_raster_tiles(|mappings| {
        mappings[0].raster_tile().complete_loading(tilestream::RasterImage {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 255],
        });
    });
    assert!(tile.is_renderable());
}

#[test]
fn unload_drops_the_raster_mappings() {
    let (processor, tileset) = loaded_tileset_with_overlays(&[Projection::Geographic]);
    let tile = region_tile(&tileset);

    let request = ScriptedRequest::new("https://tiles.test/0.glb");
    tileset.expect_request(request.clone());
    tile.load_content();
    request.deliver(200, "model/gltf-binary", b"glTF\x02\x00\x00\x00");
    processor.drain();
    tile.update(0, 1);
    assert_eq!(tile.with_raster_tiles(|m| m.len()), 1);

    assert!(tile.unload_content());
    assert_eq!(tile.with_raster_tiles(|m| m.len()), 0);
}

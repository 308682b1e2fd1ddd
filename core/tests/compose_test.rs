use kinescope_core::video::{
    BLACK_PEN, Bitmap, Blit, DrawFlags, DrawPlan, DrawStep, GfxSet, LayerDesc, PriorityTable, Rect, Rgb, SpriteGeometry,
    SpriteRam, SpriteRecord, TileInfo, TilemapDesc, VideoDesc, VideoSource, VideoState, draw_sprite,
};

const SPRITE_PEN: u16 = 0x50;

static LAYERS: [LayerDesc; 1] = [LayerDesc {
    tilemap: TilemapDesc::rows(8, 8, 2, 1),
    gfx: 0,
}];

const DESC: VideoDesc = VideoDesc {
    width: 16,
    height: 8,
    visible: Rect::new(0, 15, 0, 7),
    palette_len: 0x100,
    layers: &LAYERS,
};

const SPLIT_PLAN: DrawPlan = DrawPlan(&[
    DrawStep::layer(0, DrawFlags::LAYER1),
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(0, DrawFlags::LAYER0),
]);

const SPRITES_ONLY: DrawPlan = DrawPlan(&[DrawStep::Sprites { list: 0 }]);

/// Tile 0: left half pen 1, right half pen 2. Tile 1: all pen 3.
fn test_gfx() -> GfxSet {
    let mut pens = Vec::with_capacity(128);
    for _ in 0..8 {
        pens.extend_from_slice(&[1, 1, 1, 1, 2, 2, 2, 2]);
    }
    pens.extend_from_slice(&[3; 64]);
    GfxSet::from_pens(8, 8, pens, 0, 16)
}

/// Sprite pass fills its clip with one pen, or draws nothing.
struct FillSource {
    tile: u32,
    sprite_pen: Option<u16>,
}

impl VideoSource for FillSource {
    fn tile_info(&self, _layer: usize, _index: usize) -> TileInfo {
        TileInfo::new(self.tile, 0)
    }

    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, _gfx: &[GfxSet], _flip: bool) {
        if let Some(pen) = self.sprite_pen {
            target.fill(clip, pen);
        }
    }
}

fn video() -> VideoState {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut video = VideoState::new(&DESC);
    video.set_gfx(0, test_gfx());
    video
}

// =================================================================
// Priority groups
// =================================================================

#[test]
fn test_front_group_pixels_stay_above_sprites() {
    let mut video = video();
    // Pen 1 goes behind sprites, pen 2 in front.
    video.layer_mut(0).set_transmask(0, 0x0002, 0x0004);
    let source = FillSource { tile: 0, sprite_pen: Some(SPRITE_PEN) };

    video.render(&source, SPLIT_PLAN, &Rect::new(0, 15, 0, 7));
    let bitmap = video.bitmap();
    assert_eq!(bitmap.pixel(0, 0), SPRITE_PEN);
    assert_eq!(bitmap.pixel(3, 5), SPRITE_PEN);
    assert_eq!(bitmap.pixel(4, 0), 2);
    assert_eq!(bitmap.pixel(7, 7), 2);
}

#[test]
fn test_back_pass_alone_shows_back_pixels() {
    let mut video = video();
    video.layer_mut(0).set_transmask(0, 0x0002, 0x0004);
    let source = FillSource { tile: 0, sprite_pen: None };
    video.render(&source, SPLIT_PLAN, &Rect::new(0, 15, 0, 7));
    assert_eq!(video.bitmap().pixel(0, 0), 1);
    assert_eq!(video.bitmap().pixel(5, 0), 2);
}

#[test]
fn test_tile_priority_is_written_to_plane() {
    let mut video = video();
    let plan = DrawPlan(&[
        DrawStep::ClearPriority,
        DrawStep::Tilemap { layer: 0, flags: DrawFlags::OPAQUE, priority: 1 },
    ]);
    let source = FillSource { tile: 1, sprite_pen: None };
    video.render(&source, plan, &Rect::new(0, 15, 0, 7));
    assert_eq!(video.bitmap().priority(9, 3), 1);
    assert_eq!(video.bitmap().pixel(9, 3), 3);
}

// =================================================================
// Draw plans
// =================================================================

#[test]
fn test_priority_table_falls_back_to_default() {
    let table = PriorityTable {
        entries: &[(0x78, SPLIT_PLAN)],
        default: SPRITES_ONLY,
    };
    assert_eq!(table.plan(0x78), SPLIT_PLAN);
    assert_eq!(table.plan(0x00), SPRITES_ONLY);
}

#[test]
fn test_partial_update_renders_each_row_once() {
    let mut video = video();
    let mut source = FillSource { tile: 0, sprite_pen: Some(0x10) };
    video.update_partial(&source, SPRITES_ONLY, 3);
    assert_eq!(video.next_line(), 4);

    // Already drawn: no-op.
    source.sprite_pen = Some(0x20);
    video.update_partial(&source, SPRITES_ONLY, 2);
    video.finish_frame(&source, SPRITES_ONLY);

    assert_eq!(video.bitmap().pixel(0, 3), 0x10);
    assert_eq!(video.bitmap().pixel(0, 4), 0x20);
    assert_eq!(video.next_line(), 0);
}

#[test]
fn test_video_off_blanks_with_black_pen() {
    let mut video = video();
    video.set_video_off(true);
    let source = FillSource { tile: 0, sprite_pen: Some(SPRITE_PEN) };
    video.finish_frame(&source, SPRITES_ONLY);
    assert_eq!(video.bitmap().pixel(8, 4), BLACK_PEN);

    let mut rgb = vec![0xAAu8; 16 * 8 * 3];
    video.to_rgb24(&mut rgb);
    assert!(rgb.iter().all(|&b| b == 0));
}

#[test]
fn test_rgb_output_crops_to_visible_area() {
    static WIDE: [LayerDesc; 1] = [LayerDesc {
        tilemap: TilemapDesc::rows(8, 8, 4, 2),
        gfx: 0,
    }];
    let desc = VideoDesc {
        width: 32,
        height: 16,
        visible: Rect::new(8, 15, 8, 15),
        palette_len: 0x100,
        layers: &WIDE,
    };
    let mut video = VideoState::new(&desc);
    video.palette_mut().set(SPRITE_PEN as usize, Rgb::new(1, 2, 3));
    let source = FillSource { tile: 0, sprite_pen: Some(SPRITE_PEN) };
    video.finish_frame(&source, SPRITES_ONLY);

    // Outside the visible area nothing was drawn.
    assert_eq!(video.bitmap().pixel(0, 0), 0);

    let mut rgb = vec![0u8; 8 * 8 * 3];
    video.to_rgb24(&mut rgb);
    assert_eq!(&rgb[..3], &[1, 2, 3]);
    assert_eq!(&rgb[rgb.len() - 3..], &[1, 2, 3]);
}

// =================================================================
// Sprites
// =================================================================

/// Draws the buffered copy of a one-record sprite list.
struct BufferedSprites {
    ram: SpriteRam<u16>,
}

impl VideoSource for BufferedSprites {
    fn tile_info(&self, _layer: usize, _index: usize) -> TileInfo {
        TileInfo::default()
    }

    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], _flip: bool) {
        let s = self.ram.buffered();
        let blit = Blit {
            code: s[0] as u32,
            color: 0,
            flip_x: false,
            flip_y: false,
            x: s[1] as i32,
            y: 0,
        };
        gfx[0].draw(target, clip, &blit, Some(0));
    }
}

#[test]
fn test_draw_pass_uses_committed_sprite_list() {
    let mut video = video();
    let mut source = BufferedSprites { ram: SpriteRam::new(2) };
    source.ram.write(0, 1);
    source.ram.write(1, 8);
    source.ram.commit();

    // Written after the commit: not visible until the next one.
    source.ram.write(1, 0);

    video.finish_frame(&source, SPRITES_ONLY);
    assert_eq!(video.bitmap().pixel(8, 0), 3);
    assert_eq!(video.bitmap().pixel(0, 0), 0);

    source.ram.commit();
    video.finish_frame(&source, SPRITES_ONLY);
    assert_eq!(video.bitmap().pixel(0, 0), 3);
}

#[test]
fn test_multi_tile_sprite_mirrors_arrangement() {
    // Elements 0..4 are solid pens 1..4.
    let pens: Vec<u8> = (1..=4u8).flat_map(|p| [p; 4]).collect();
    let gfx = GfxSet::from_pens(2, 2, pens, 0, 16);
    let geometry = SpriteGeometry { col_step: 2, row_step: 1, mirror: true };
    let mut target = Bitmap::new(4, 4);
    let clip = target.bounds();

    let mut sprite = SpriteRecord { width: 2, height: 2, ..SpriteRecord::default() };
    draw_sprite(&mut target, &clip, &gfx, &sprite, geometry, None);
    // Columns step by 2 codes, rows by 1.
    assert_eq!([target.pixel(0, 0), target.pixel(2, 0), target.pixel(0, 2), target.pixel(2, 2)], [1, 3, 2, 4]);

    sprite.flip_x = true;
    draw_sprite(&mut target, &clip, &gfx, &sprite, geometry, None);
    assert_eq!([target.pixel(0, 0), target.pixel(2, 0)], [3, 1]);
}

#[test]
fn test_masked_sprite_hides_behind_marked_pixels() {
    let gfx = GfxSet::from_pens(2, 1, vec![5, 5], 0, 16);
    let mut target = Bitmap::new(2, 1);
    target.set_priority(0, 0, 1);
    let clip = target.bounds();
    let blit = Blit { code: 0, color: 0, flip_x: false, flip_y: false, x: 0, y: 0 };

    gfx.draw_masked(&mut target, &clip, &blit, Some(0), 1 << 1);
    assert_eq!(target.pixel(0, 0), 0);
    assert_eq!(target.pixel(1, 0), 5);
    assert_eq!(target.priority(0, 0), 0x1F);
}

pub mod bitmap;
pub mod compose;
pub mod gfx;
pub mod palette;
pub mod raster;
pub mod sprite;
pub mod tilemap;

pub use bitmap::{Bitmap, Rect};
pub use compose::{DrawPlan, DrawStep, LayerDesc, PriorityTable, VideoDesc, VideoSource, VideoState};
pub use gfx::{Blit, ElementCount, GfxLayout, GfxSet, PlaneOffset};
pub use palette::{BLACK_PEN, Palette, PlanarPaletteRam, Rgb, SplitPaletteRam, WordFormat, WordPaletteRam};
pub use raster::{RasterCompare, RasterIrq, ScanlineEvents, ScanlineTiming, TimerRule, VcountMap};
pub use sprite::{SpriteGeometry, SpriteRam, SpriteRecord, draw_sprite};
pub use tilemap::{Axis, DrawFlags, TileInfo, TileScan, Tilemap, TilemapDesc};

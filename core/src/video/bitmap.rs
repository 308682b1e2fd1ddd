/// Inclusive pixel rectangle (`min..=max` on both axes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rect {
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Same columns, rows limited to `first..=last`.
    pub fn rows(&self, first: i32, last: i32) -> Rect {
        Rect {
            min_y: self.min_y.max(first),
            max_y: self.max_y.min(last),
            ..*self
        }
    }

    pub fn width(&self) -> u32 {
        if self.is_empty() { 0 } else { (self.max_x - self.min_x + 1) as u32 }
    }

    pub fn height(&self) -> u32 {
        if self.is_empty() { 0 } else { (self.max_y - self.min_y + 1) as u32 }
    }
}

/// Indexed-color frame buffer with a parallel priority plane.
///
/// Pixels are palette indices. The priority plane records, per pixel, which
/// layer category last drew there; priority-aware sprite drawing reads it to
/// decide whether a sprite pixel goes behind the tilemap.
#[derive(Clone, Debug)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<u16>,
    priority: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            priority: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, self.width as i32 - 1, 0, self.height as i32 - 1)
    }

    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, pen: u16) {
        self.pixels[y * self.width + x] = pen;
    }

    pub fn priority(&self, x: usize, y: usize) -> u8 {
        self.priority[y * self.width + x]
    }

    pub fn set_priority(&mut self, x: usize, y: usize, value: u8) {
        self.priority[y * self.width + x] = value;
    }

    pub fn or_priority(&mut self, x: usize, y: usize, value: u8) {
        self.priority[y * self.width + x] |= value;
    }

    pub fn fill(&mut self, clip: &Rect, pen: u16) {
        let clip = clip.intersect(&self.bounds());
        if clip.is_empty() {
            return;
        }
        for y in clip.min_y..=clip.max_y {
            let row = y as usize * self.width;
            self.pixels[row + clip.min_x as usize..=row + clip.max_x as usize].fill(pen);
        }
    }

    pub fn fill_priority(&mut self, clip: &Rect, value: u8) {
        let clip = clip.intersect(&self.bounds());
        if clip.is_empty() {
            return;
        }
        for y in clip.min_y..=clip.max_y {
            let row = y as usize * self.width;
            self.priority[row + clip.min_x as usize..=row + clip.max_x as usize].fill(value);
        }
    }
}

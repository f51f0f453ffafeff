//! Layout coefficient table and the pixel geometry derived from it
//!
//! Every position and size on the card is a ratio of the working canvas
//! width or height. Geometry is recomputed for each canvas size; ratios are
//! truncated toward zero when converted to pixels.

/// Horizontal anchor of a text element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAnchor {
    /// `x` is where the pen starts
    Left,
    /// `x` is the middle of the advance width
    Middle,
}

/// Vertical anchor of a text element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAnchor {
    /// `y` is the ascender line
    Top,
    /// `y` is the baseline
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub h: HAnchor,
    pub v: VAnchor,
}

impl Anchor {
    pub const LEFT_TOP: Self = Self { h: HAnchor::Left, v: VAnchor::Top };
    pub const MIDDLE_TOP: Self = Self { h: HAnchor::Middle, v: VAnchor::Top };
    pub const LEFT_BASELINE: Self = Self { h: HAnchor::Left, v: VAnchor::Baseline };
    pub const MIDDLE_BASELINE: Self = Self { h: HAnchor::Middle, v: VAnchor::Baseline };
}

/// Dimensionless layout ratios. Widths, x positions and font sizes are
/// fractions of the canvas width; heights and y positions of its height,
/// unless noted otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutCoefficients {
    pub brand_font: f32,
    pub brand_y: f32,
    pub model_font: f32,
    pub model_y: f32,
    pub specs_main_font: f32,
    pub specs_rim_font: f32,
    pub specs_x: f32,
    pub specs_y: f32,
    pub specs_main_w: f32,
    pub specs_main_h: f32,
    /// Fraction of the spec box width
    pub main_text_x: f32,
    pub main_text_y: f32,
    /// Fraction of the spec box height
    pub rim_space: f32,
    /// Fraction of the spec box width
    pub rim_x: f32,
    pub specs_radius: f32,
    pub index_box_x: f32,
    pub index_box_w: f32,
    pub index_box_h: f32,
    pub load_box_y: f32,
    pub speed_box_y: f32,
    pub index_radius: f32,
    pub index_value_font: f32,
    pub index_caption_font: f32,
    /// Fractions of the index box size
    pub index_value_dx: f32,
    pub index_value_dy: f32,
    pub index_caption_y1: f32,
    pub index_caption_y2: f32,
    pub season_font: f32,
    pub season_x: f32,
    pub season_y: f32,
    pub season_y2: f32,
    pub icon_w: f32,
    pub icon_h: f32,
    pub icon_x: f32,
    pub icon_y: f32,
    pub tire_w: f32,
    pub tire_h: f32,
    pub tire_x: f32,
    pub tire_y: f32,
}

impl LayoutCoefficients {
    /// The vertical product card
    pub const DEFAULT: Self = Self {
        brand_font: 0.103,
        brand_y: 0.058,
        model_font: 0.052,
        model_y: 0.156,
        specs_main_font: 0.083,
        specs_rim_font: 0.083,
        specs_x: 0.5,
        specs_y: 0.213,
        specs_main_w: 0.5596,
        specs_main_h: 0.0859,
        main_text_x: 0.0505,
        main_text_y: 0.279,
        rim_space: 0.0698,
        rim_x: 0.6379,
        specs_radius: 0.03,
        index_box_x: 0.0639,
        index_box_w: 0.1951,
        index_box_h: 0.1295,
        load_box_y: 0.4521,
        speed_box_y: 0.628,
        index_radius: 0.027,
        index_value_font: 0.0629,
        index_caption_font: 0.037,
        index_value_dx: 0.0682,
        index_value_dy: 0.0526,
        index_caption_y1: 0.4834,
        index_caption_y2: 0.7255,
        season_font: 0.0419,
        season_x: 0.0639,
        season_y: 0.7966,
        season_y2: 0.8329,
        icon_w: 0.087,
        icon_h: 0.0726,
        icon_x: 0.267,
        icon_y: 0.79,
        tire_w: 0.5677,
        tire_h: 0.6392,
        tire_x: 0.3725,
        tire_y: 0.3087,
    };

    /// Pixel geometry for a `width x height` working canvas
    #[must_use]
    pub fn geometry(&self, width: u32, height: u32) -> CardGeometry {
        let w = width as f32;
        let h = height as f32;
        let px = |ratio: f32, side: f32| (ratio * side) as i32;

        let specs_x = px(self.specs_x, w);
        let specs_y = px(self.specs_y, h);
        let main_w = px(self.specs_main_w, w);
        let main_h = px(self.specs_main_h, h);
        let left = specs_x - main_w / 2;
        let right = specs_x + main_w / 2;
        let main_text_y = px(self.main_text_y, h);

        let rim_space = px(self.rim_space, main_h as f32);
        let rim_x = left + px(self.rim_x, main_w as f32);
        let rim_x2 = right - rim_space;
        let rim = PixelRect {
            x0: rim_x,
            y0: specs_y + rim_space,
            x1: rim_x2,
            y1: specs_y + main_h - rim_space,
        };

        let box_w = px(self.index_box_w, w);
        let box_h = px(self.index_box_h, h);
        let index_box = |y: i32| {
            let x = px(self.index_box_x, w);
            IndexBoxGeometry {
                rect: PixelRect {
                    x0: x,
                    y0: y,
                    x1: x + box_w,
                    y1: y + box_h,
                },
                value: TextSlot {
                    x: x + px(self.index_value_dx, box_w as f32),
                    y: y + px(self.index_value_dy, box_h as f32),
                    size: px(self.index_value_font, w).max(1) as u32,
                    anchor: Anchor::LEFT_TOP,
                },
                caption1: TextSlot {
                    x: x + px(self.index_value_dx, box_w as f32),
                    y: y + px(self.index_caption_y1, box_h as f32),
                    size: px(self.index_caption_font, w).max(1) as u32,
                    anchor: Anchor::LEFT_TOP,
                },
                caption2: TextSlot {
                    x: x + px(self.index_value_dx, box_w as f32),
                    y: y + px(self.index_caption_y2, box_h as f32),
                    size: px(self.index_caption_font, w).max(1) as u32,
                    anchor: Anchor::LEFT_TOP,
                },
                radius: px(self.index_radius, h).max(0) as u32,
            }
        };

        let season_x = px(self.season_x, w);
        let season_size = px(self.season_font, w).max(1) as u32;

        CardGeometry {
            brand: TextSlot {
                x: (width / 2) as i32,
                y: px(self.brand_y, h),
                size: px(self.brand_font, w).max(1) as u32,
                anchor: Anchor::MIDDLE_TOP,
            },
            model: TextSlot {
                x: (width / 2) as i32,
                y: px(self.model_y, h),
                size: px(self.model_font, w).max(1) as u32,
                anchor: Anchor::MIDDLE_TOP,
            },
            spec_box: PixelRect {
                x0: left,
                y0: specs_y,
                x1: right,
                y1: specs_y + main_h,
            },
            spec_radius: px(self.specs_radius, h).max(0) as u32,
            spec_text: TextSlot {
                x: left + px(self.main_text_x, main_w as f32),
                y: main_text_y,
                size: px(self.specs_main_font, w).max(1) as u32,
                anchor: Anchor::LEFT_BASELINE,
            },
            rim_box: rim,
            rim_text: TextSlot {
                x: rim.x0 + rim.width() / 2,
                y: main_text_y,
                size: px(self.specs_rim_font, w).max(1) as u32,
                anchor: Anchor::MIDDLE_BASELINE,
            },
            load_index: index_box(px(self.load_box_y, h)),
            speed_index: index_box(px(self.speed_box_y, h)),
            season_line1: TextSlot {
                x: season_x,
                y: px(self.season_y, h),
                size: season_size,
                anchor: Anchor::LEFT_TOP,
            },
            season_line2: TextSlot {
                x: season_x,
                y: px(self.season_y2, h),
                size: season_size,
                anchor: Anchor::LEFT_TOP,
            },
            icon: PlacedBox {
                x: px(self.icon_x, w),
                y: px(self.icon_y, h),
                width: px(self.icon_w, w).max(1) as u32,
                height: px(self.icon_h, h).max(1) as u32,
            },
            tire: PlacedBox {
                x: px(self.tire_x, w),
                y: px(self.tire_y, h),
                width: px(self.tire_w, w).max(1) as u32,
                height: px(self.tire_h, h).max(1) as u32,
            },
        }
    }
}

impl Default for LayoutCoefficients {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A text element: anchor point, font size in pixels per em, anchor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSlot {
    pub x: i32,
    pub y: i32,
    pub size: u32,
    pub anchor: Anchor,
}

/// Corner-inclusive rectangle `[x0, x1] x [y0, y1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    #[must_use]
    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Top-left position and target size of a pasted image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBoxGeometry {
    pub rect: PixelRect,
    pub value: TextSlot,
    pub caption1: TextSlot,
    pub caption2: TextSlot,
    pub radius: u32,
}

/// All element positions for one canvas size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardGeometry {
    pub brand: TextSlot,
    pub model: TextSlot,
    pub spec_box: PixelRect,
    pub spec_radius: u32,
    pub spec_text: TextSlot,
    pub rim_box: PixelRect,
    pub rim_text: TextSlot,
    pub load_index: IndexBoxGeometry,
    pub speed_index: IndexBoxGeometry,
    pub season_line1: TextSlot,
    pub season_line2: TextSlot,
    pub icon: PlacedBox,
    pub tire: PlacedBox,
}

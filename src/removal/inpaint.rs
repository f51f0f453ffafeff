//! Fast-marching inpainting (Telea 2004)
//!
//! Masked pixels are filled in order of their distance from the mask
//! boundary. Each new value is a weighted average of already known pixels
//! within `radius`, weighted by distance, level-set proximity and alignment
//! with the propagation direction.

use crate::masks::MASK_THRESHOLD;
use image::{GrayImage, RgbaImage};
use log::debug;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const INF: f32 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Min-heap entry on arrival time
#[derive(Debug, Clone, Copy)]
struct Front {
    t: f32,
    idx: usize,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

struct Field {
    width: i64,
    height: i64,
    flags: Vec<Flag>,
    times: Vec<f32>,
    pixels: Vec<[f32; 3]>,
}

impl Field {
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        (x >= 0 && y >= 0 && x < self.width && y < self.height)
            .then(|| (y * self.width + x) as usize)
    }

    /// Out-of-image cells behave as unreached interior
    fn flag(&self, x: i64, y: i64) -> Flag {
        self.index(x, y).map_or(Flag::Inside, |i| self.flags[i])
    }

    fn time(&self, x: i64, y: i64) -> f32 {
        self.index(x, y).map_or(INF, |i| self.times[i])
    }

    fn solve(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> f32 {
        let a11 = self.time(x1, y1);
        let a22 = self.time(x2, y2);
        let m12 = a11.min(a22);
        let known1 = self.flag(x1, y1) != Flag::Inside;
        let known2 = self.flag(x2, y2) != Flag::Inside;
        match (known1, known2) {
            (true, true) => {
                let diff = a11 - a22;
                if diff.abs() >= 1.0 {
                    1.0 + m12
                } else {
                    (a11 + a22 + (2.0 - diff * diff).sqrt()) * 0.5
                }
            },
            (true, false) => 1.0 + a11,
            (false, true) => 1.0 + a22,
            (false, false) => 1.0 + m12,
        }
    }

    fn arrival_time(&self, x: i64, y: i64) -> f32 {
        [
            self.solve(x - 1, y, x, y - 1),
            self.solve(x + 1, y, x, y - 1),
            self.solve(x - 1, y, x, y + 1),
            self.solve(x + 1, y, x, y + 1),
        ]
        .into_iter()
        .fold(INF, f32::min)
    }

    /// One-dimensional gradient of the arrival time along an axis
    fn axis_gradient(&self, centre: f32, prev: (i64, i64), next: (i64, i64)) -> f32 {
        let prev_known = self.flag(prev.0, prev.1) != Flag::Inside;
        let next_known = self.flag(next.0, next.1) != Flag::Inside;
        match (prev_known, next_known) {
            (true, true) => (self.time(next.0, next.1) - self.time(prev.0, prev.1)) * 0.5,
            (false, true) => self.time(next.0, next.1) - centre,
            (true, false) => centre - self.time(prev.0, prev.1),
            (false, false) => 0.0,
        }
    }

    fn fill(&mut self, x: i64, y: i64, radius: i64) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        let t = self.times[idx];
        let grad_x = self.axis_gradient(t, (x - 1, y), (x + 1, y));
        let grad_y = self.axis_gradient(t, (x, y - 1), (x, y + 1));

        let mut acc = [0.0f64; 3];
        let mut total = 0.0f64;
        for qy in (y - radius)..=(y + radius) {
            for qx in (x - radius)..=(x + radius) {
                let Some(q) = self.index(qx, qy) else {
                    continue;
                };
                if self.flags[q] == Flag::Inside {
                    continue;
                }
                let rx = (x - qx) as f32;
                let ry = (y - qy) as f32;
                let len_sq = rx * rx + ry * ry;
                if len_sq == 0.0 || len_sq > (radius * radius) as f32 {
                    continue;
                }
                let dst = 1.0 / (len_sq * len_sq.sqrt());
                let lev = 1.0 / (1.0 + (self.times[q] - t).abs());
                let mut dir = rx * grad_x + ry * grad_y;
                if dir.abs() <= 0.01 {
                    dir = 1.0e-6;
                }
                let w = f64::from((dst * lev * dir).abs());
                for (a, v) in acc.iter_mut().zip(self.pixels[q]) {
                    *a += w * f64::from(v);
                }
                total += w;
            }
        }

        if total > 0.0 {
            self.pixels[idx] = acc.map(|a| (a / total) as f32);
        }
    }
}

/// Fill every pixel with mask value above the threshold.
///
/// The alpha channel is carried through unchanged; pixels outside the mask
/// are never modified.
#[must_use]
pub fn inpaint_telea(image: &RgbaImage, mask: &GrayImage, radius: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut field = Field {
        width: i64::from(width),
        height: i64::from(height),
        flags: vec![Flag::Known; (width as usize) * (height as usize)],
        times: vec![0.0; (width as usize) * (height as usize)],
        pixels: image
            .pixels()
            .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
            .collect(),
    };

    let mut inside = 0usize;
    for (x, y, m) in mask.enumerate_pixels() {
        if x < width && y < height && m[0] > MASK_THRESHOLD {
            let i = (y * width + x) as usize;
            field.flags[i] = Flag::Inside;
            field.times[i] = INF;
            inside += 1;
        }
    }
    if inside == 0 {
        return image.clone();
    }

    let mut heap = BinaryHeap::new();
    for y in 0..field.height {
        for x in 0..field.width {
            let Some(i) = field.index(x, y) else {
                continue;
            };
            if field.flags[i] != Flag::Known {
                continue;
            }
            let touches_inside = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                .into_iter()
                .any(|(nx, ny)| field.index(nx, ny).is_some_and(|n| field.flags[n] == Flag::Inside));
            if touches_inside {
                field.flags[i] = Flag::Band;
                heap.push(Front { t: 0.0, idx: i });
            }
        }
    }

    let radius = i64::from(radius.max(1));
    while let Some(Front { idx, .. }) = heap.pop() {
        if field.flags[idx] == Flag::Known {
            continue;
        }
        field.flags[idx] = Flag::Known;
        let x = idx as i64 % field.width;
        let y = idx as i64 / field.width;
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            let Some(n) = field.index(nx, ny) else {
                continue;
            };
            if field.flags[n] != Flag::Inside {
                continue;
            }
            let t = field.arrival_time(nx, ny);
            field.times[n] = t;
            field.fill(nx, ny, radius);
            field.flags[n] = Flag::Band;
            heap.push(Front { t, idx: n });
        }
    }

    debug!("Inpainted {} px with radius {}", inside, radius);

    let mut out = image.clone();
    for (i, pixel) in out.pixels_mut().enumerate() {
        let [r, g, b] = field.pixels[i];
        pixel[0] = r.round().clamp(0.0, 255.0) as u8;
        pixel[1] = g.round().clamp(0.0, 255.0) as u8;
        pixel[2] = b.round().clamp(0.0, 255.0) as u8;
    }
    out
}
